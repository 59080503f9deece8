//! `kestrel.toml` configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up next to an input unit.
pub const CONFIG_FILE_NAME: &str = "kestrel.toml";

/// Analyzer configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Analysis settings
    pub analysis: AnalysisConfig,

    /// Report settings
    pub output: OutputConfig,
}

/// `[analysis]` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Bound on variance fixed-point passes
    pub variance_iteration_cap: usize,

    /// Warn about type constructor parameters no field uses
    pub warn_unused_params: bool,

    /// Maximum number of diagnostics to report; 0 means unlimited
    pub max_diagnostics: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            variance_iteration_cap: default_variance_iteration_cap(),
            warn_unused_params: true,
            max_diagnostics: 0,
        }
    }
}

fn default_variance_iteration_cap() -> usize {
    ks_variance::DEFAULT_ITERATION_CAP
}

/// `[output]` table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct OutputConfig {
    /// Report format
    pub format: OutputFormat,

    /// Print the annotated IR when the unit checks cleanly
    pub emit_annotated: bool,
}

/// How reports are rendered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Colored text for terminals
    #[default]
    Human,
    /// The serialized report
    Json,
}

impl Config {
    /// Parse a configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML or has unknown keys
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse kestrel configuration")
    }

    /// Load configuration from a file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Path of the configuration file that applies to `unit_path`, if one
    /// exists next to it.
    pub fn find_for(unit_path: impl AsRef<Path>) -> Option<PathBuf> {
        let dir = unit_path.as_ref().parent()?;
        let dir = if dir.as_os_str().is_empty() {
            Path::new(".")
        } else {
            dir
        };
        let candidate = dir.join(CONFIG_FILE_NAME);
        candidate.is_file().then_some(candidate)
    }

    /// Configuration for checking `unit_path`: the file next to it, or the
    /// defaults when there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file exists but cannot be loaded
    pub fn discover(unit_path: impl AsRef<Path>) -> Result<Self> {
        match Self::find_for(unit_path) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "using configuration file");
                Self::from_file(path)
            }
            None => Ok(Self::default()),
        }
    }
}
