//! Kestrel CLI
//!
//! Command-line front-end for the Kestrel borrow and lifetime analyzer

#![allow(
    clippy::print_stdout,
    clippy::print_stderr,
    reason = "the CLI reports to the terminal"
)]

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use ks_driver::OutputFormat;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod check;

/// Environment variable holding the log filter.
const LOG_ENV: &str = "KESTREL_LOG";

#[derive(Parser)]
#[command(name = "kestrel")]
#[command(about = "Borrow, lifetime and variance analyzer", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a compilation unit for borrow and lifetime errors
    Check {
        /// Path to the unit in JSON form
        unit: PathBuf,

        /// Configuration file (defaults to kestrel.toml next to the unit)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Report format
        #[arg(long, value_enum)]
        format: Option<Format>,

        /// Print the annotated IR when the unit checks cleanly
        #[arg(long)]
        emit_annotated: bool,

        /// Enable debug logging
        #[arg(long)]
        verbose: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Human,
    Json,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Human => Self::Human,
            Format::Json => Self::Json,
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            unit,
            config,
            format,
            emit_annotated,
            verbose,
        } => {
            init_logging(verbose);
            let options = check::CheckOptions {
                config,
                format: format.map(Into::into),
                emit_annotated,
            };
            check::check(&unit, &options)?;
        }
    }

    Ok(())
}
