//! Combined Summary Builder
//!
//! Merges every `*summary.txt` in a result directory into
//! `_combined_summary.csv`, one column per dataset.
//!
//! Usage:
//!   combine-summaries --dir results

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use iceloss::report::combined_summary;

#[derive(Parser, Debug)]
#[command(name = "combine-summaries")]
#[command(about = "Merge per-dataset icing loss summaries into one table")]
#[command(version)]
struct CliArgs {
    /// Result directory holding the summary files
    #[arg(long, value_name = "DIR", default_value = ".")]
    dir: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    let written = combined_summary(&args.dir)
        .with_context(|| format!("Failed to combine summaries in {}", args.dir.display()))?;

    match written {
        Some(path) => info!(path = %path.display(), "Combined summary written"),
        None => anyhow::bail!("No *summary.txt files in {}", args.dir.display()),
    }
    Ok(())
}
