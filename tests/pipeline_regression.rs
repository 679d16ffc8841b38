//! Pipeline Regression Tests
//!
//! End-to-end runs over a synthetic two-month SCADA export with one known
//! icing spell (reduced output in January) and one known icing stop (zero
//! output in February). Checks the analysed figures and every report file.

use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDate, NaiveDateTime};
use iceloss::config::SiteConfig;
use iceloss::ingest::CsvImporter;
use iceloss::pipeline::{process_config_file, run_batch, run_dataset};
use iceloss::report::combined_summary;

const ROWS: usize = 60 * 144;
const ICING_START: usize = 9 * 144;
const ICING_LEN: usize = 36;
const STOP_START: usize = 35 * 144 + 72;
const STOP_LEN: usize = 18;

fn t0() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2020, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn clean_power(ws: f64) -> f64 {
    (((ws - 3.0) / 9.0).max(0.0)).powi(3).min(1.0)
}

/// 10-minute rows for January and February 2020, relative power.
fn synthetic_csv() -> String {
    let mut out = String::from("timestamp,wind speed,direction,temperature,power,state\n");
    for i in 0..ROWS {
        let t = t0() + Duration::minutes(10 * i as i64);
        let mut ws = 4.0 + ((i * 7) % 100) as f64 / 10.0;
        let mut temp = 5.0;
        let mut power = clean_power(ws);
        if (ICING_START..ICING_START + ICING_LEN).contains(&i) {
            ws = 8.0;
            temp = -4.0;
            power = 0.3 * clean_power(ws);
        } else if (STOP_START..STOP_START + STOP_LEN).contains(&i) {
            ws = 8.0;
            temp = -6.0;
            power = 0.0;
        }
        let dir = (i * 37) % 360;
        out.push_str(&format!(
            "{},{ws:.1},{dir},{temp:.1},{power:.5},0\n",
            t.format("%Y-%m-%d %H:%M:%S")
        ));
    }
    out
}

/// Write the CSV and a site config next to it; return the config path.
fn write_site(dir: &Path, id: &str) -> PathBuf {
    let csv = dir.join(format!("{id}.csv"));
    if !csv.exists() {
        std::fs::write(&csv, synthetic_csv()).unwrap();
    }
    let config = format!(
        r#"
[source]
id = "{id}"
filename = "{id}.csv"

[output]
result_directory = "results"
icing_events = true
alarm_time_series = true
filtered_raw_data = true
"#
    );
    let path = dir.join(format!("{id}.toml"));
    std::fs::write(&path, config).unwrap();
    path
}

fn line_count(path: &Path) -> usize {
    std::fs::read_to_string(path).unwrap().lines().count()
}

#[test]
fn synthetic_dataset_losses_and_events() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_site(dir.path(), "synthetic");
    let config = SiteConfig::load_from_file(&config_path).unwrap();

    let mut data = CsvImporter::from_config(&config)
        .read(&dir.path().join("synthetic.csv"))
        .unwrap();
    assert_eq!(data.matrix.len(), ROWS);
    let codes = config.resolve_codes(&mut data.registry);
    let report = run_dataset(&config, &data.matrix, &codes).unwrap();

    // One icing spell, one stop
    assert_eq!(report.events.power_loss.len(), 1);
    let spell = &report.events.power_loss[0];
    assert_eq!(spell.start, t0() + Duration::minutes(10 * ICING_START as i64));
    assert!(spell.loss > 0.0);
    assert_eq!(report.events.stop.len(), 1);
    let stop = &report.events.stop[0];
    assert_eq!(stop.start, t0() + Duration::minutes(10 * STOP_START as i64));
    assert!(stop.mean_power.abs() < 1e-12);
    assert!(report.events.overproduction.is_empty());

    // Reference set is the warm, producing rows only
    assert_eq!(report.sizes.raw, ROWS);
    assert_eq!(report.sizes.filtered, ROWS);
    assert!(report.sizes.reference < ROWS - ICING_LEN - STOP_LEN + 1);

    // Monthly split puts each loss in its own month
    assert_eq!(report.monthly.len(), 2);
    let (jan, feb) = (&report.monthly[0], &report.monthly[1]);
    assert_eq!((jan.year, jan.month), (2020, 1));
    assert!(jan.power_loss.loss > 0.0);
    assert!(jan.stop.loss.abs() < 1e-12);
    assert!(feb.stop.loss > 0.0);
    assert!(feb.power_loss.loss.abs() < 1e-12);

    let s = &report.summary;
    assert!(s.theoretical > s.actual);
    assert!(s.eba > 80.0 && s.eba < 100.0, "eba = {}", s.eba);
    assert!((s.tba - 100.0).abs() < 1e-9, "No status stops configured");
    assert!(s.availability > 99.0);
    assert!(s.power_loss > 0.0 && s.stop_loss > 0.0);
}

#[test]
fn process_config_file_writes_enabled_reports() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_site(dir.path(), "synthetic");

    let summary = process_config_file(&config_path).unwrap().unwrap();
    let results = dir.path().join("results");
    assert_eq!(summary, results.join("synthetic_summary.txt"));

    let summary_text = std::fs::read_to_string(&summary).unwrap();
    assert!(summary_text.contains("synthetic"));
    assert!(!summary_text.contains("IPS on hours"), "Unheated site");

    for suffix in [
        "_powercurve.txt",
        "_losses.csv",
        "_stops.csv",
        "_overproduction.csv",
        "_production_stats.txt",
        "_alarms.csv",
        "_filtered.csv",
    ] {
        assert!(results.join(format!("synthetic{suffix}")).exists(), "missing {suffix}");
    }
    for absent in ["_status.csv", "_ips.csv", "_ice_det.csv", "_faults.json"] {
        assert!(!results.join(format!("synthetic{absent}")).exists(), "unexpected {absent}");
    }

    assert_eq!(line_count(&results.join("synthetic_losses.csv")), 2);
    assert_eq!(line_count(&results.join("synthetic_stops.csv")), 2);
    assert_eq!(line_count(&results.join("synthetic_production_stats.txt")), 3);
    assert_eq!(line_count(&results.join("synthetic_alarms.csv")), ROWS + 1);
    assert_eq!(line_count(&results.join("synthetic_filtered.csv")), ROWS + 1);
}

#[test]
fn batch_run_and_combined_summary() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_site(dir.path(), "site_a");
    let b = write_site(dir.path(), "site_b");
    let broken = dir.path().join("site_c.toml");
    std::fs::write(&broken, "[source]\nid = \"site_c\"\nfilename = \"missing.csv\"\n").unwrap();

    let outcome = run_batch(&[a.clone(), b.clone(), broken.clone()], 2).unwrap();
    assert_eq!(outcome.succeeded, vec![a, b]);
    assert_eq!(outcome.failed, vec![broken]);
    assert_eq!(outcome.summaries.len(), 2);

    let results = dir.path().join("results");
    let combined = combined_summary(&results).unwrap().unwrap();
    let text = std::fs::read_to_string(combined).unwrap();
    assert_eq!(text.lines().next(), Some("Dataset name\tsite_a\tsite_b"));
}

#[test]
fn repeated_runs_are_identical() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_site(dir.path(), "synthetic");
    let summary = process_config_file(&config_path).unwrap().unwrap();
    let first = std::fs::read_to_string(&summary).unwrap();
    process_config_file(&config_path).unwrap();
    assert_eq!(std::fs::read_to_string(&summary).unwrap(), first);
}
