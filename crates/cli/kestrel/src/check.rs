//! Check command implementation

use anyhow::{Context, Result};
use colored::Colorize;
use ks_driver::{Config, Diagnostic, FileSpan, OutputFormat, Report, Severity};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Command-line overrides for the loaded configuration.
pub struct CheckOptions {
    pub config: Option<PathBuf>,
    pub format: Option<OutputFormat>,
    pub emit_annotated: bool,
}

pub fn check(unit: &Path, options: &CheckOptions) -> Result<()> {
    let config = load_config(unit, options)?;
    debug!(unit = %unit.display(), format = ?config.output.format, "checking unit");
    let mut report = ks_driver::check_file(unit, &config)?;
    let passed = report.passed();
    let errors = report.error_count();
    info!(
        unit = %report.unit,
        errors,
        warnings = report.warning_count(),
        "check finished"
    );

    match config.output.format {
        OutputFormat::Human => {
            let mut text = String::new();
            render_human(&mut text, unit, &report)?;
            print!("{text}");
            if config.output.emit_annotated
                && let Some(annotated) = &report.annotated
            {
                println!("{}", serde_json::to_string_pretty(annotated)?);
            }
        }
        OutputFormat::Json => {
            if !config.output.emit_annotated {
                report.annotated = None;
            }
            println!("{}", report.to_json()?);
        }
    }

    if !passed {
        anyhow::bail!("Check failed with {} errors", errors.max(1));
    }

    Ok(())
}

fn load_config(unit: &Path, options: &CheckOptions) -> Result<Config> {
    let mut config = match &options.config {
        Some(path) => Config::from_file(path)?,
        None => Config::discover(unit)
            .with_context(|| format!("Failed to load configuration for {}", unit.display()))?,
    };
    if let Some(format) = options.format {
        debug!(?format, "output format overridden on the command line");
        config.output.format = format;
    }
    if options.emit_annotated {
        config.output.emit_annotated = true;
    }
    Ok(config)
}

fn render_human(out: &mut impl fmt::Write, unit: &Path, report: &Report) -> fmt::Result {
    writeln!(
        out,
        "{} `{}` ({})",
        "Checking".green().bold(),
        report.unit,
        unit.display()
    )?;

    for diagnostic in &report.diagnostics {
        render_diagnostic(out, diagnostic)?;
    }

    writeln!(out)?;
    let errors = report.error_count();
    let warnings = report.warning_count();
    if report.passed() && warnings == 0 {
        writeln!(out, "{} No errors found", "Success:".green().bold())?;
    } else {
        if !report.passed() {
            writeln!(out, "{} {} errors found", "Failed:".red().bold(), errors)?;
        }
        if warnings > 0 {
            writeln!(out, "{} {} warnings found", "Warning:".yellow().bold(), warnings)?;
        }
    }
    Ok(())
}

fn render_diagnostic(out: &mut impl fmt::Write, diagnostic: &Diagnostic) -> fmt::Result {
    let label = match diagnostic.severity {
        Severity::Error => format!("error[{}]", diagnostic.kind).red().bold(),
        Severity::Warning => format!("warning[{}]", diagnostic.kind).yellow().bold(),
    };
    writeln!(out, "  {label} {}", diagnostic.message)?;

    let location = &diagnostic.location;
    if location.span == FileSpan::synthetic() {
        writeln!(out, "    {} {location}", "-->".blue())?;
    } else {
        writeln!(out, "    {} {location} ({})", "-->".blue(), location.span)?;
    }
    if let Some(help) = &diagnostic.help {
        writeln!(out, "    {} {help}", "help:".cyan())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn report(json: &str) -> Report {
        ks_driver::check_source("unit", json, &Config::default())
    }

    fn human(report: &Report) -> String {
        let mut text = String::new();
        render_human(&mut text, Path::new("unit.json"), report).unwrap();
        text
    }

    #[test]
    fn test_render_errors() {
        colored::control::set_override(false);
        let report = report(
            r#"{"functions": [{"name": "pair",
                "params": [{"name": "s", "ty": "&str"}, {"name": "t", "ty": "&str"}],
                "ret": "&str"}]}"#,
        );
        let text = human(&report);
        assert!(text.starts_with("Checking `unit` (unit.json)\n"));
        assert!(text.contains(
            "  error[AmbiguousElisionError] missing region specifier in `pair`: 2 input regions and no receiver\n"
        ));
        assert!(text.contains("    --> pair\n"));
        assert!(text.contains("    help: name the region"));
        assert!(text.ends_with("Failed: 1 errors found\n"));
    }

    #[test]
    fn test_render_clean() {
        colored::control::set_override(false);
        let report = report(r#"{"types": [{"name": "Unit"}]}"#);
        let text = human(&report);
        assert!(text.ends_with("\nSuccess: No errors found\n"));
    }

    #[test]
    fn test_flags_override_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let unit = temp_dir.path().join("unit.json");
        fs::write(&unit, "{}").unwrap();
        fs::write(
            temp_dir.path().join("kestrel.toml"),
            "[output]\nformat = \"json\"\n",
        )
        .unwrap();

        let options = CheckOptions {
            config: None,
            format: None,
            emit_annotated: true,
        };
        let config = load_config(&unit, &options).unwrap();
        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(config.output.emit_annotated);

        let options = CheckOptions {
            config: None,
            format: Some(OutputFormat::Human),
            emit_annotated: false,
        };
        assert_eq!(load_config(&unit, &options).unwrap().output.format, OutputFormat::Human);
    }

    #[test]
    fn test_explicit_config_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("custom.toml");
        fs::write(&path, "[analysis]\nmax-diagnostics = 5\n").unwrap();

        let options = CheckOptions {
            config: Some(path),
            format: None,
            emit_annotated: false,
        };
        let config = load_config(Path::new("elsewhere/unit.json"), &options).unwrap();
        assert_eq!(config.analysis.max_diagnostics, 5);
    }
}
