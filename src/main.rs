//! iceloss - icing loss batch driver
//!
//! Runs the analysis for one or more site config files and writes each
//! dataset's reports to its configured result directory.
//!
//! # Usage
//!
//! ```bash
//! # Single dataset
//! iceloss sites/t1.toml
//!
//! # Every config in a directory, four datasets at a time, then combine
//! iceloss --config-dir sites --jobs 4 --combine results
//!
//! # Structured logs for log shippers
//! RUST_LOG=iceloss=debug iceloss --log-json sites/t1.toml
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Logging level (default: info)
//! - `ICELOSS_JOBS`: Default worker count

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use iceloss::pipeline::{discover_configs, run_batch};
use iceloss::report::combined_summary;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "iceloss")]
#[command(about = "Icing energy-loss estimation from wind turbine SCADA data")]
#[command(version)]
struct CliArgs {
    /// Site config files (TOML)
    configs: Vec<PathBuf>,

    /// Also process every *.toml in this directory (names containing "blank" are skipped)
    #[arg(long, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    /// Datasets processed in parallel (0 = one per CPU core)
    #[arg(short, long, env = "ICELOSS_JOBS", default_value = "0")]
    jobs: usize,

    /// Write a combined summary of every *summary.txt in DIR after the run
    #[arg(long, value_name = "DIR")]
    combine: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

fn run(args: CliArgs) -> Result<bool> {
    let mut configs = args.configs;
    if let Some(dir) = &args.config_dir {
        configs.extend(discover_configs(dir)?);
    }
    if configs.is_empty() {
        anyhow::bail!("No config files given; pass paths or --config-dir");
    }

    let outcome = run_batch(&configs, args.jobs)?;

    if let Some(dir) = &args.combine {
        match combined_summary(dir)
            .with_context(|| format!("Failed to combine summaries in {}", dir.display()))?
        {
            Some(path) => info!(path = %path.display(), "Combined summary written"),
            None => info!(dir = %dir.display(), "No summaries found to combine"),
        }
    }

    for failed in &outcome.failed {
        error!(config = %failed.display(), "Failed");
    }
    Ok(outcome.all_succeeded())
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_logging(args.log_json);

    match run(args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %format!("{e:#}"), "iceloss failed");
            ExitCode::FAILURE
        }
    }
}
