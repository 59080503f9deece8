//! Analysis driver for Kestrel
//!
//! This crate ties the analysis passes together: it loads configuration,
//! lowers a JSON unit, runs region, variance, elision, borrow and drop
//! checking in order, and collects the findings into a [`Report`].

mod config;
mod diagnostic;
mod pipeline;

use anyhow::{Context, Result};
use std::path::Path;

pub use config::{AnalysisConfig, CONFIG_FILE_NAME, Config, OutputConfig, OutputFormat};
pub use diagnostic::{Diagnostic, Report, Severity};
pub use ks_span::{ErrorKind, FileSpan, Location};
pub use pipeline::Analyzer;

/// Check a unit stored in a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read. Problems with the unit
/// itself are reported as diagnostics.
pub fn check_file(path: impl AsRef<Path>, config: &Config) -> Result<Report> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read unit file: {}", path.display()))?;
    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(check_source(&name, &source, config))
}

/// Check a unit given as JSON text.
pub fn check_source(name: &str, source: &str, config: &Config) -> Report {
    Analyzer::new(config.analysis.clone()).check_source(name, source)
}
