//! Integration test utilities for Kestrel

use anyhow::{Context, Result, anyhow};
use ks_driver::{Config, Report};
use ks_intern::Interner;
use ks_ir::{CompilationUnit, lower_json};
use ks_region::RegionGraph;
use ks_variance::{VarianceEngine, VarianceTable};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Checks a unit with the default configuration.
pub fn check(name: &str, json: &str) -> Report {
    ks_driver::check_source(name, json, &Config::default())
}

/// One line per diagnostic, for snapshot comparisons.
pub fn summary(report: &Report) -> String {
    let mut lines: Vec<String> = report.diagnostics.iter().map(ToString::to_string).collect();
    lines.push(format!(
        "{} error(s), {} warning(s), annotated: {}",
        report.error_count(),
        report.warning_count(),
        report.annotated.is_some()
    ));
    lines.join("\n")
}

/// A unit lowered and elaborated up to, but not including, borrow checking.
pub struct Elaborated {
    /// Unit with elided regions filled in
    pub unit: CompilationUnit,
    /// Sealed region graph
    pub graph: RegionGraph,
    /// Solved variances
    pub variances: VarianceTable,
}

/// Runs the passes that precede borrow checking.
///
/// # Errors
///
/// Returns an error if any pass reports a problem
pub fn elaborate(json: &str) -> Result<Elaborated> {
    let interner = Interner::new();
    let mut unit = lower_json(json, &interner).map_err(|errors| {
        let messages: Vec<_> = errors.iter().map(ToString::to_string).collect();
        anyhow!("malformed unit: {}", messages.join("; "))
    })?;

    let (mut graph, errors) = RegionGraph::from_unit(&unit);
    if let Some(err) = errors.first() {
        return Err(anyhow!("{err}"));
    }
    if let Some(err) = ks_lifetime::elide_type_defs(&mut unit).first() {
        return Err(anyhow!("{err}"));
    }
    let solution = VarianceEngine::new(&unit).solve();
    if let Some(err) = solution.errors.first() {
        return Err(anyhow!("{err}"));
    }
    if let Some(err) = ks_lifetime::elide_signatures(&mut unit, &mut graph, &|_| false).first() {
        return Err(anyhow!("{err}"));
    }
    graph.seal();

    Ok(Elaborated {
        unit,
        graph,
        variances: solution.table,
    })
}

/// Scratch directory holding units and configuration files.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Creates an empty workspace
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created
    pub fn new() -> Result<Self> {
        Ok(Self {
            dir: TempDir::new().context("Failed to create workspace directory")?,
        })
    }

    /// Writes a file into the workspace
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written
    pub fn write(&self, name: &str, contents: &str) -> Result<PathBuf> {
        let path = self.dir.path().join(name);
        fs::write(&path, contents).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Checks a unit file the way the CLI does: with the configuration
    /// found next to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the unit or its configuration cannot be loaded
    pub fn check(&self, unit: &str) -> Result<Report> {
        let path = self.dir.path().join(unit);
        let config = Config::discover(&path)?;
        ks_driver::check_file(&path, &config)
    }
}
