//! Report writers
//!
//! Every report is rendered to a `String` first and written in one call, so
//! the renderers can be tested without touching the filesystem. Files land
//! in the dataset's result directory as `<id><suffix>`.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::defaults::{
    EXPORT_DATETIME_FORMAT, POWER_CURVE_FIELD_WIDTH, SUMMARY_HEADING_WIDTH, SUMMARY_VALUE_WIDTH,
};
use crate::config::SiteConfig;
use crate::ingest::FaultCodeRegistry;
use crate::power_curve::{CurveCell, PowerCurveTable};
use crate::types::{AlarmRecord, EventInterval, MonthlyStatistic, ReferencePoint, SampleMatrix, SummaryStatistics};

pub const SUMMARY_SUFFIX: &str = "_summary.txt";
pub const POWER_CURVE_SUFFIX: &str = "_powercurve.txt";
pub const PRODUCTION_STATS_SUFFIX: &str = "_production_stats.txt";
pub const ALARMS_SUFFIX: &str = "_alarms.csv";
pub const FILTERED_SUFFIX: &str = "_filtered.csv";
pub const FAULTS_SUFFIX: &str = "_faults.json";
pub const COMBINED_SUMMARY_FILE: &str = "_combined_summary.csv";

const EVENT_HEADER: &str = "start;stop;loss;duration;mean power drop;mean_power;mean_reference_power;mean wind speed;mean temperature";

const MONTHLY_HEADER: [&str; 18] = [
    "month",
    "Theoretical production",
    "Actual production",
    "Total losses",
    "Total losses (%)",
    "Production losses due to icing",
    "Relative icing production loss",
    "Losses due to icing induced stops",
    "Relative losses due to iced stops",
    "Losses during SCADA stops",
    "Relative losses during SCADA stops",
    "Losses during IPS operation",
    "Relative losses during IPS operation",
    "Losses during ice detection",
    "Relative losses during ice detection",
    "Total icing losses",
    "Relative icing losses",
    "IPS consumption",
];

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

fn timestamp(t: NaiveDateTime) -> String {
    t.format(EXPORT_DATETIME_FORMAT).to_string()
}

// ============================================================================
// Summary
// ============================================================================

/// Optional line groups of the summary report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SummaryLayout {
    pub heating: bool,
    pub ice_detection: bool,
    pub self_consumption: bool,
}

impl SummaryLayout {
    pub fn from_config(config: &SiteConfig) -> Self {
        Self {
            heating: config.heated_site(),
            ice_detection: config.ice_detection(),
            self_consumption: config.heated_site() && config.ips_power_column().is_some(),
        }
    }
}

fn summary_line(out: &mut String, heading: &str, value: &str, unit: &str) {
    out.push_str(&format!(
        "{heading:<hw$}\t {value:>vw$} \t{unit}\n",
        hw = SUMMARY_HEADING_WIDTH,
        vw = SUMMARY_VALUE_WIDTH
    ));
}

fn summary_number(out: &mut String, heading: &str, value: f64, unit: &str) {
    summary_line(out, heading, &format!("{value:.1}"), unit);
}

fn summary_time(out: &mut String, heading: &str, value: Option<NaiveDateTime>) {
    let text = value.map_or_else(|| "-".to_string(), timestamp);
    summary_line(out, heading, &text, " ");
}

/// Render the `_summary.txt` report.
pub fn render_summary(id: &str, s: &SummaryStatistics, layout: SummaryLayout) -> String {
    let mut out = String::new();
    summary_line(&mut out, "Field", "Value", "unit");
    summary_line(&mut out, "Dataset name", id, " ");

    summary_number(&mut out, "Production losses due to icing", s.power_loss, "kWh");
    summary_number(&mut out, "Relative production losses due to icing", s.power_loss_pct, "%");
    summary_number(&mut out, "Losses due to icing related stops", s.stop_loss, "kWh");
    summary_number(&mut out, "Relative losses due to icing related stops", s.stop_loss_pct, "%");
    summary_number(&mut out, "Icing during production", s.power_loss_hours, "h");
    summary_number(&mut out, "Icing during production (% of total data)", s.power_loss_hours_pct, "%");
    summary_number(&mut out, "Turbine stopped during production", s.stop_hours, "h");
    summary_number(&mut out, "Turbine stopped production (% of total data)", s.stop_hours_pct, "%");
    summary_number(&mut out, "Over production hours", s.overproduction_hours, "h");
    summary_number(&mut out, "Over production hours (% of total)", s.overproduction_hours_pct, "%");

    if layout.heating {
        summary_number(&mut out, "IPS on hours", s.ips_hours, "h");
        summary_number(&mut out, "IPS on hours (% of total)", s.ips_hours_pct, "%");
        summary_number(&mut out, "Losses during IPS operation", s.ips_loss, "kWh");
        summary_number(&mut out, "Relative losses during IPS operation", s.ips_loss_pct, "%");
    }
    if layout.ice_detection {
        summary_number(&mut out, "Ice detector icing hours", s.ice_detection_hours, "h");
        summary_number(&mut out, "Ice detector icing hours (% of total data)", s.ice_detection_hours_pct, "%");
        summary_number(&mut out, "Losses during ice detector alarms", s.ice_detection_loss, "kWh");
        summary_number(&mut out, "Relative losses during ice detector alarms", s.ice_detection_loss_pct, "%");
    }
    if layout.self_consumption {
        summary_number(&mut out, "IPS self consumption", s.ips_self_consumption, "kWh");
        summary_number(&mut out, "IPS self consumption (% of total)", s.ips_self_consumption_pct, "%");
    }

    summary_number(&mut out, "SCADA forced stops", s.status_stop_hours, "h");
    summary_number(&mut out, "Time Based Availability (TBA)", s.tba, "%");
    summary_number(&mut out, "Loss during SCADA stops", s.status_stop_loss, "kWh");
    summary_number(&mut out, "Relative losses during SCADA stops (% of total)", s.status_stop_loss_pct, "%");
    summary_number(&mut out, "Power curve uncertainty", s.power_curve_uncertainty, "%");
    summary_number(&mut out, "Production upper limit (std.dev)", s.production_upper_pct, "%");
    summary_number(&mut out, "Production lower limit (std.dev)", s.production_lower_pct, "%");
    summary_number(&mut out, "Production P90", s.production_p90_pct, "%");
    summary_number(&mut out, "Production P10", s.production_p10_pct, "%");
    summary_number(&mut out, "Theoretical mean production", s.theoretical, "kWh");
    summary_number(&mut out, "Observed power production", s.actual, "kWh");
    summary_number(&mut out, "Total Losses", s.total_losses, "kWh");
    summary_number(&mut out, "Energy Based Availability (EBA)", s.eba, "%");

    summary_time(&mut out, "Data start time", s.data_start);
    summary_time(&mut out, "Data stop time", s.data_stop);
    summary_number(&mut out, "Total amount of data", s.period_hours, "h");
    summary_time(&mut out, "Reference data start time", s.reference_start);
    summary_time(&mut out, "Reference data stop time", s.reference_stop);
    summary_number(&mut out, "Total amount of data in reference dataset", s.reference_period_hours, "h");
    summary_number(&mut out, "Data availability", s.availability, "%");
    summary_line(&mut out, "Sample count in original data", &s.sizes.raw.to_string(), " ");
    summary_line(&mut out, "Sample count after filtering", &s.sizes.filtered.to_string(), " ");
    summary_number(&mut out, "Data size after filtering", s.filtered_pct, "%");
    summary_line(&mut out, "Sample count in reference data", &s.sizes.reference.to_string(), " ");
    summary_number(&mut out, "Reference dataset as % of original data", s.reference_pct, "%");
    out
}

// ============================================================================
// Power Curve
// ============================================================================

fn grid_token(value: f64) -> String {
    if value.is_nan() {
        " ".repeat(POWER_CURVE_FIELD_WIDTH)
    } else {
        format!("{value:>w$.1}", w = POWER_CURVE_FIELD_WIDTH)
    }
}

fn grid_block<F>(out: &mut String, curve: &PowerCurveTable, value: F)
where
    F: Fn(&CurveCell) -> f64,
{
    let header: Vec<String> = std::iter::once(f64::NAN)
        .chain(curve.bins.direction_centers.iter().copied())
        .map(grid_token)
        .collect();
    out.push_str(&header.join("\t"));
    out.push('\n');

    for (i, speed) in curve.bins.speed_centers.iter().enumerate() {
        let row: Vec<String> = std::iter::once(*speed)
            .chain(curve.speed_row(i).iter().map(&value))
            .map(grid_token)
            .collect();
        out.push_str(&row.join("\t"));
        out.push('\n');
    }
    out.push('\n');
}

/// Render the `_powercurve.txt` report: one titled grid per field.
pub fn render_power_curve(id: &str, curve: &PowerCurveTable) -> String {
    let blocks: [(&str, fn(&CurveCell) -> f64); 8] = [
        ("Power Curve", |c| c.power),
        ("P10", |c| c.p_low),
        ("P90", |c| c.p_high),
        ("Std.dev.", |c| c.std_dev),
        ("Uncertainty [%]", |c| c.uncertainty),
        ("Lower limit", |c| c.lower_bound),
        ("Upper limit", |c| c.upper_bound),
        ("Bin Size [n]", |c| c.count as f64),
    ];

    let mut out = String::new();
    for (title, value) in blocks {
        out.push_str(&format!("{id} {title}\n"));
        grid_block(&mut out, curve, value);
    }
    out
}

// ============================================================================
// Events, Monthly Statistics, Alarms
// ============================================================================

/// Render an event CSV. `secondary` adds the heating energy column.
pub fn render_events(events: &[EventInterval], secondary: bool) -> String {
    let mut out = String::from(EVENT_HEADER);
    if secondary {
        out.push_str(";heating energy");
    }
    out.push('\n');

    for e in events {
        out.push_str(&format!(
            "{};{};{};{};{};{};{};{};{}",
            timestamp(e.start),
            timestamp(e.stop),
            e.loss,
            e.duration_hours,
            e.mean_power_drop,
            e.mean_power,
            e.mean_reference_power,
            e.mean_wind_speed,
            e.mean_temperature
        ));
        if secondary {
            out.push_str(&format!(";{}", e.secondary.unwrap_or(0.0)));
        }
        out.push('\n');
    }
    out
}

/// Render the tab-separated monthly production statistics.
pub fn render_monthly(stats: &[MonthlyStatistic]) -> String {
    let mut out = MONTHLY_HEADER.join("\t");
    out.push('\n');

    for m in stats {
        let values = [
            m.theoretical,
            m.actual,
            m.total_loss,
            m.total_loss_relative,
            m.power_loss.loss,
            m.power_loss.relative,
            m.stop.loss,
            m.stop.relative,
            m.status_stop.loss,
            m.status_stop.relative,
            m.ips.loss,
            m.ips.relative,
            m.ice_detection.loss,
            m.ice_detection.relative,
            m.total_ice_loss,
            m.total_ice_relative,
            m.ips_consumption,
        ];
        out.push_str(&format!("{:04}-{:02}", m.year, m.month));
        for v in values {
            out.push('\t');
            out.push_str(&v.to_string());
        }
        out.push('\n');
    }
    out
}

/// Render the combined alarm time series.
pub fn render_alarms(records: &[AlarmRecord]) -> String {
    let mut out = String::from(
        "timestamp;alarm status;wind speed [m/s];reference power [kW];temperature [C];power [kW];P10 limit [kW]\n",
    );
    for r in records {
        out.push_str(&format!(
            "{};{};{};{};{};{};{}\n",
            timestamp(r.timestamp),
            r.code.code(),
            r.wind_speed,
            r.reference_power,
            r.temperature,
            r.power,
            r.limit
        ));
    }
    out
}

/// Render the filtered time series in source column order, followed by the
/// curve reference, P10 and P90 at each sample.
///
/// Values of `fault_columns` are written back as their text codes.
pub fn render_filtered(
    matrix: &SampleMatrix,
    reference: &[ReferencePoint],
    registry: &FaultCodeRegistry,
    fault_columns: &[usize],
    timestamp_column: usize,
) -> String {
    let mut headers = matrix.headers.clone();
    headers.extend(["Reference Power", "P10 Limit", "P90 Limit"].map(String::from));
    let mut out = headers.join(";");
    out.push('\n');

    for (sample, point) in matrix.rows.iter().zip(reference) {
        let mut fields: Vec<String> = sample
            .raw
            .iter()
            .enumerate()
            .map(|(col, &v)| {
                if col == timestamp_column {
                    timestamp(sample.timestamp)
                } else if fault_columns.contains(&col) {
                    registry
                        .text_of(v)
                        .map_or_else(|| v.to_string(), str::to_string)
                } else {
                    v.to_string()
                }
            })
            .collect();
        if fields.is_empty() {
            fields.push(timestamp(sample.timestamp));
        }
        fields.extend([point.reference, point.p_low, point.p_high].map(|v| v.to_string()));
        out.push_str(&fields.join(";"));
        out.push('\n');
    }
    out
}

// ============================================================================
// Writer
// ============================================================================

/// Writes one dataset's reports into its result directory.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    id: String,
    dir: PathBuf,
}

impl ReportWriter {
    /// Create the writer, creating the result directory if needed.
    pub fn create(id: &str, dir: &Path) -> Result<Self, ReportError> {
        std::fs::create_dir_all(dir).map_err(|e| ReportError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;
        Ok(Self {
            id: id.to_string(),
            dir: dir.to_path_buf(),
        })
    }

    pub fn path(&self, suffix: &str) -> PathBuf {
        self.dir.join(format!("{}{}", self.id, suffix))
    }

    /// Write `contents` to `<id><suffix>` and return the path.
    pub fn write(&self, suffix: &str, contents: &str) -> Result<PathBuf, ReportError> {
        let path = self.path(suffix);
        std::fs::write(&path, contents).map_err(|e| ReportError::Io {
            path: path.clone(),
            source: e,
        })?;
        info!(dataset = %self.id, path = %path.display(), "Wrote report");
        Ok(path)
    }

    pub fn write_faults(&self, registry: &FaultCodeRegistry) -> Result<PathBuf, ReportError> {
        let json = registry.to_json()?;
        self.write(FAULTS_SUFFIX, &json)
    }
}

// ============================================================================
// Combined Summary
// ============================================================================

/// `(heading, value)` pairs of a summary report, header line excluded.
pub fn parse_summary(contents: &str) -> Vec<(String, String)> {
    contents
        .lines()
        .filter_map(|line| {
            let mut parts = line.split('\t');
            let heading = parts.next()?.trim();
            let value = parts.next()?.trim();
            (!heading.is_empty() && heading != "Field").then(|| (heading.to_string(), value.to_string()))
        })
        .collect()
}

/// Merge every `*summary.txt` in `dir` into `_combined_summary.csv`.
///
/// One line per heading, in first-seen order, followed by each dataset's
/// value. Returns `None` when the directory holds no summaries.
pub fn combined_summary(dir: &Path) -> Result<Option<PathBuf>, ReportError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |e: std::io::Error| ReportError::Io { path, source: e }
    };

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(io_err(dir))?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|p| {
            p.is_file()
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with("summary.txt"))
        })
        .collect();
    files.sort();

    if files.is_empty() {
        debug!(dir = %dir.display(), "No summaries to combine");
        return Ok(None);
    }

    let mut headings: Vec<String> = Vec::new();
    let mut datasets = Vec::with_capacity(files.len());
    for file in &files {
        let contents = std::fs::read_to_string(file).map_err(io_err(file))?;
        let pairs = parse_summary(&contents);
        for (heading, _) in &pairs {
            if !headings.contains(heading) {
                headings.push(heading.clone());
            }
        }
        datasets.push(pairs);
    }

    let mut out = String::new();
    for heading in &headings {
        out.push_str(heading);
        for pairs in &datasets {
            let value = pairs
                .iter()
                .find(|(h, _)| h == heading)
                .map_or("", |(_, v)| v.as_str());
            out.push('\t');
            out.push_str(value);
        }
        out.push('\n');
    }

    let path = dir.join(COMBINED_SUMMARY_FILE);
    std::fs::write(&path, out).map_err(io_err(&path))?;
    info!(path = %path.display(), datasets = files.len(), "Wrote combined summary");
    Ok(Some(path))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binning::BinDefinition;
    use crate::types::{AlarmCode, CategoryLoss, DataSizes, Sample};
    use chrono::{Duration, NaiveDate};

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn summary() -> SummaryStatistics {
        SummaryStatistics {
            power_loss: 120.0,
            power_loss_pct: 2.5,
            stop_loss: 0.0,
            stop_loss_pct: 0.0,
            power_loss_hours: 10.0,
            power_loss_hours_pct: 1.0,
            stop_hours: 0.0,
            stop_hours_pct: 0.0,
            overproduction_hours: 0.0,
            overproduction_hours_pct: 0.0,
            ips_hours: 3.0,
            ips_hours_pct: 0.3,
            ips_loss: 4.0,
            ips_loss_pct: 0.1,
            ips_self_consumption: 5.0,
            ips_self_consumption_pct: 0.1,
            ice_detection_hours: 0.0,
            ice_detection_hours_pct: 0.0,
            ice_detection_loss: 0.0,
            ice_detection_loss_pct: 0.0,
            status_stop_hours: 0.0,
            tba: 100.0,
            status_stop_loss: 0.0,
            status_stop_loss_pct: 0.0,
            power_curve_uncertainty: 12.0,
            production_upper_pct: 110.0,
            production_lower_pct: 90.0,
            production_p90_pct: 120.0,
            production_p10_pct: 80.0,
            theoretical: 5000.0,
            actual: 4800.0,
            total_losses: 200.0,
            eba: 96.0,
            data_start: Some(t0()),
            data_stop: Some(t0() + Duration::days(1)),
            period_hours: 24.0,
            reference_start: None,
            reference_stop: None,
            reference_period_hours: 0.0,
            availability: 100.0,
            sizes: DataSizes {
                raw: 144,
                filtered: 140,
                reference: 100,
            },
            filtered_pct: 97.2,
            reference_pct: 69.4,
        }
    }

    #[test]
    fn test_summary_line_layout() {
        let text = render_summary("T1", &summary(), SummaryLayout::default());
        let first = text.lines().next().unwrap();
        assert!(first.starts_with("Field"));
        let loss_line = text
            .lines()
            .find(|l| l.starts_with("Production losses due to icing"))
            .unwrap();
        let parts: Vec<&str> = loss_line.split('\t').collect();
        assert_eq!(parts[0].len(), SUMMARY_HEADING_WIDTH);
        assert_eq!(parts[1].trim(), "120.0");
        assert_eq!(parts[2], "kWh");
        assert!(!text.contains("IPS on hours"));
        assert!(!text.contains("Ice detector"));
    }

    #[test]
    fn test_summary_optional_groups() {
        let layout = SummaryLayout {
            heating: true,
            ice_detection: true,
            self_consumption: true,
        };
        let text = render_summary("T1", &summary(), layout);
        assert!(text.contains("IPS on hours"));
        assert!(text.contains("Ice detector icing hours"));
        assert!(text.contains("IPS self consumption"));
        assert!(text.contains("2020-01-02 00:00:00"));
    }

    #[test]
    fn test_parse_summary_roundtrip() {
        let text = render_summary("T1", &summary(), SummaryLayout::default());
        let pairs = parse_summary(&text);
        assert_eq!(pairs[0], ("Dataset name".to_string(), "T1".to_string()));
        let eba = pairs.iter().find(|(h, _)| h.starts_with("Energy Based")).unwrap();
        assert_eq!(eba.1, "96.0");
        assert!(pairs.iter().all(|(h, _)| h != "Field"));
    }

    #[test]
    fn test_power_curve_grid() {
        let bins = BinDefinition::new(vec![0.0, 5.0], vec![0.0]);
        let cells = vec![
            vec![CurveCell::empty(0.0, 0.0, 0.0)],
            vec![CurveCell::empty(5.0, 0.0, f64::NAN)],
        ];
        let curve = PowerCurveTable::from_cells(bins, 1.0, cells);
        let text = render_power_curve("T1", &curve);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "T1 Power Curve");
        assert_eq!(lines[1], format!("{}\t{:>10}", " ".repeat(10), "0.0"));
        assert_eq!(lines[2], format!("{:>10}\t{:>10}", "0.0", "0.0"));
        // NaN power prints as blanks
        assert_eq!(lines[3], format!("{:>10}\t{}", "5.0", " ".repeat(10)));
        assert!(text.contains("T1 Bin Size [n]"));
        assert_eq!(text.matches("T1 ").count(), 8);
    }

    #[test]
    fn test_event_csv_columns() {
        let event = EventInterval {
            start: t0(),
            stop: t0() + Duration::hours(1),
            loss: 40.0,
            duration_hours: 1.0,
            mean_power_drop: 40.0,
            mean_power: 60.0,
            mean_reference_power: 100.0,
            mean_wind_speed: 7.0,
            mean_temperature: -2.0,
            secondary: Some(12.5),
        };
        let plain = render_events(std::slice::from_ref(&event), false);
        let lines: Vec<&str> = plain.lines().collect();
        assert_eq!(lines[0], EVENT_HEADER);
        assert_eq!(lines[1], "2020-01-01 00:00:00;2020-01-01 01:00:00;40;1;40;60;100;7;-2");

        let ips = render_events(&[event], true);
        assert!(ips.lines().next().unwrap().ends_with(";heating energy"));
        assert!(ips.lines().nth(1).unwrap().ends_with(";12.5"));
    }

    #[test]
    fn test_monthly_rows() {
        let stat = MonthlyStatistic {
            year: 2020,
            month: 3,
            theoretical: 100.0,
            actual: 90.0,
            total_loss: 10.0,
            total_loss_relative: 0.9,
            power_loss: CategoryLoss { loss: 5.0, relative: 0.95 },
            stop: CategoryLoss::default(),
            status_stop: CategoryLoss::default(),
            ips: CategoryLoss::default(),
            ice_detection: CategoryLoss::default(),
            total_ice_loss: 5.0,
            total_ice_relative: 0.95,
            ips_consumption: 0.0,
        };
        let text = render_monthly(&[stat]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0].split('\t').count(), MONTHLY_HEADER.len());
        assert!(lines[1].starts_with("2020-03\t100\t90\t10\t0.9\t5\t0.95"));
        assert_eq!(lines[1].split('\t').count(), MONTHLY_HEADER.len());
    }

    #[test]
    fn test_alarm_rows_use_numeric_codes() {
        let record = AlarmRecord {
            timestamp: t0(),
            code: AlarmCode::Stop,
            wind_speed: 8.0,
            reference_power: 500.0,
            temperature: -3.0,
            power: 0.0,
            limit: 400.0,
            secondary: None,
        };
        let text = render_alarms(&[record]);
        assert_eq!(text.lines().nth(1), Some("2020-01-01 00:00:00;2;8;500;-3;0;400"));
    }

    #[test]
    fn test_filtered_restores_fault_text() {
        let mut registry = FaultCodeRegistry::default();
        registry.resolve("RUN");
        registry.resolve("ICE");
        let mut sample = Sample::new(t0(), 8.0, 180.0, -1.0, 0.5);
        sample.raw = vec![f64::NAN, 8.0, 1.0];
        let matrix = SampleMatrix::new(vec!["time".into(), "ws".into(), "fault".into()], vec![sample]);
        let point = ReferencePoint {
            timestamp: t0(),
            reference: 0.6,
            measured: 0.5,
            p_low: 0.4,
            p_high: 0.8,
            lower_bound: 0.5,
            upper_bound: 0.7,
        };
        let text = render_filtered(&matrix, &[point], &registry, &[2], 0);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "time;ws;fault;Reference Power;P10 Limit;P90 Limit");
        assert_eq!(lines[1], "2020-01-01 00:00:00;8;ICE;0.6;0.4;0.8");
    }

    #[test]
    fn test_combined_summary_merges_sorted_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut second = summary();
        second.eba = 50.0;
        std::fs::write(
            dir.path().join("B_summary.txt"),
            render_summary("B", &second, SummaryLayout::default()),
        )
        .unwrap();
        std::fs::write(
            dir.path().join("A_summary.txt"),
            render_summary("A", &summary(), SummaryLayout::default()),
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let path = combined_summary(dir.path()).unwrap().unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Dataset name\tA\tB");
        let eba = lines.iter().find(|l| l.starts_with("Energy Based")).unwrap();
        assert!(eba.ends_with("\t96.0\t50.0"));
    }

    #[test]
    fn test_combined_summary_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(combined_summary(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_writer_names_files_by_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("results");
        let writer = ReportWriter::create("T7", &out).unwrap();
        let path = writer.write(ALARMS_SUFFIX, "x\n").unwrap();
        assert_eq!(path, out.join("T7_alarms.csv"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "x\n");

        let mut registry = FaultCodeRegistry::default();
        registry.resolve("RUN");
        let faults = writer.write_faults(&registry).unwrap();
        assert!(std::fs::read_to_string(faults).unwrap().contains("\"RUN\": 0"));
    }
}
