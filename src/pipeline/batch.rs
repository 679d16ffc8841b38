//! Batch driver - config files in, report files out
//!
//! Each config file is one independent job: load, ingest, analyse, write.
//! Jobs share nothing, so a rayon pool runs them side by side and a failure
//! in one dataset is logged without touching the others.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;
use tracing::{error, info, warn};

use super::coordinator::{run_dataset, DatasetReport};
use crate::aggregation::reference_series;
use crate::config::SiteConfig;
use crate::ingest::{CsvImporter, FaultCodeRegistry};
use crate::report::{
    render_alarms, render_events, render_filtered, render_monthly, render_power_curve,
    render_summary, ReportError, ReportWriter, SummaryLayout, ALARMS_SUFFIX, FILTERED_SUFFIX,
    POWER_CURVE_SUFFIX, PRODUCTION_STATS_SUFFIX, SUMMARY_SUFFIX,
};

/// Resolve `path` against the directory of the config file when relative.
fn resolve_path(config_path: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        return p.to_path_buf();
    }
    config_path
        .parent()
        .map_or_else(|| p.to_path_buf(), |dir| dir.join(p))
}

/// Load, ingest, analyse and write one dataset.
///
/// Returns the summary path when the summary report is enabled.
pub fn process_config_file(path: &Path) -> Result<Option<PathBuf>> {
    let config = SiteConfig::load_from_file(path)
        .with_context(|| format!("Failed to load config {}", path.display()))?;

    let source = resolve_path(path, &config.source.filename);
    let mut data = CsvImporter::from_config(&config)
        .read(&source)
        .with_context(|| format!("Failed to ingest dataset '{}'", config.source.id))?;

    let codes = config.resolve_codes(&mut data.registry);
    let report = run_dataset(&config, &data.matrix, &codes)
        .with_context(|| format!("Invalid analysis settings for '{}'", config.source.id))?;

    let result_dir = resolve_path(path, &config.output.result_directory);
    let summary = write_outputs(&config, &report, &data.registry, &result_dir)
        .with_context(|| format!("Failed to write reports for '{}'", config.source.id))?;
    Ok(summary)
}

/// Write every report enabled in `config.output`.
pub fn write_outputs(
    config: &SiteConfig,
    report: &DatasetReport,
    registry: &FaultCodeRegistry,
    result_dir: &Path,
) -> Result<Option<PathBuf>, ReportError> {
    let out = &config.output;
    let writer = ReportWriter::create(&report.id, result_dir)?;

    let summary = if out.summary {
        let text = render_summary(&report.id, &report.summary, SummaryLayout::from_config(config));
        Some(writer.write(SUMMARY_SUFFIX, &text)?)
    } else {
        None
    };

    if out.power_curve {
        writer.write(POWER_CURVE_SUFFIX, &render_power_curve(&report.id, &report.curve))?;
    }

    if out.icing_events {
        let ev = &report.events;
        writer.write("_losses.csv", &render_events(&ev.power_loss, false))?;
        writer.write("_stops.csv", &render_events(&ev.stop, false))?;
        writer.write("_overproduction.csv", &render_events(&ev.overproduction, false))?;
        if !config.columns.status.is_empty() {
            writer.write("_status.csv", &render_events(&ev.status_stop, false))?;
        }
        if config.heated_site() {
            writer.write("_ips.csv", &render_events(&ev.ips, true))?;
        }
        if config.ice_detection() {
            writer.write("_ice_det.csv", &render_events(&ev.ice_detection, false))?;
        }
        writer.write(PRODUCTION_STATS_SUFFIX, &render_monthly(&report.monthly))?;
    }

    if out.alarm_time_series {
        writer.write(ALARMS_SUFFIX, &render_alarms(&report.combined_alarms()))?;
    }

    if out.filtered_raw_data {
        let reference = reference_series(&report.time_limited.rows, &report.curve);
        let fault_columns: &[usize] = if config.source.replace_fault_codes {
            &config.source.fault_columns
        } else {
            &[]
        };
        let text = render_filtered(
            &report.time_limited,
            &reference,
            registry,
            fault_columns,
            config.columns.timestamp,
        );
        writer.write(FILTERED_SUFFIX, &text)?;
    }

    if config.source.replace_fault_codes {
        writer.write_faults(registry)?;
    }

    Ok(summary)
}

// ============================================================================
// Batch
// ============================================================================

/// Outcome of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub succeeded: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
    /// Summary files written by the successful datasets
    pub summaries: Vec<PathBuf>,
}

impl BatchOutcome {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Every `*.toml` file in `dir` whose name does not contain `blank`, sorted.
pub fn discover_configs(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read config directory {}", dir.display()))?;
    let mut configs: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .map(|e| e.path())
        .filter(|p| {
            p.extension().is_some_and(|ext| ext == "toml")
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| !n.contains("blank"))
        })
        .collect();
    configs.sort();
    Ok(configs)
}

/// Process every config on a pool of `jobs` threads (0 = one per core).
pub fn run_batch(configs: &[PathBuf], jobs: usize) -> Result<BatchOutcome> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .context("Failed to build worker pool")?;
    info!(datasets = configs.len(), threads = pool.current_num_threads(), "Starting batch");

    let results: Vec<(PathBuf, Result<Option<PathBuf>>)> = pool.install(|| {
        configs
            .par_iter()
            .map(|path| (path.clone(), process_config_file(path)))
            .collect()
    });

    let mut outcome = BatchOutcome::default();
    for (path, result) in results {
        match result {
            Ok(summary) => {
                info!(config = %path.display(), "Dataset complete");
                outcome.summaries.extend(summary);
                outcome.succeeded.push(path);
            }
            Err(e) => {
                error!(config = %path.display(), error = %format!("{e:#}"), "Dataset failed");
                outcome.failed.push(path);
            }
        }
    }

    if outcome.all_succeeded() {
        info!(succeeded = outcome.succeeded.len(), "Batch complete");
    } else {
        warn!(
            succeeded = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            "Batch complete with failures"
        );
    }
    Ok(outcome)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_path_relative_to_config() {
        let config = Path::new("/sites/north/t1.toml");
        assert_eq!(resolve_path(config, "data/t1.csv"), PathBuf::from("/sites/north/data/t1.csv"));
        assert_eq!(resolve_path(config, "/abs/t1.csv"), PathBuf::from("/abs/t1.csv"));
    }

    #[test]
    fn test_discover_configs_skips_blank_templates() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.toml", "a.toml", "blank_site.toml", "notes.txt"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        let found = discover_configs(dir.path()).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.toml", "b.toml"]);
    }

    #[test]
    fn test_batch_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        let outcome = run_batch(&[missing.clone()], 1).unwrap();
        assert_eq!(outcome.failed, vec![missing]);
        assert!(!outcome.all_succeeded());
        assert!(outcome.summaries.is_empty());
    }
}
