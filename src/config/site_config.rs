//! Site Configuration - per-turbine dataset, binning and filtering settings
//!
//! One TOML file describes one turbine dataset: where the CSV lives, which
//! columns carry which channel, how the power curve is binned, and which
//! thresholds drive the alarm classifier. Every field has a default matching
//! the established analysis settings, so a minimal file only needs the
//! `[source]` section.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::ingest::FaultCodeRegistry;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one turbine dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Source file location and CSV dialect
    #[serde(default)]
    pub source: SourceConfig,

    /// Column indices of each channel
    #[serde(default)]
    pub columns: ColumnConfig,

    /// Turbine characteristics and status codes
    #[serde(default)]
    pub turbine: TurbineConfig,

    /// Power curve bin layout
    #[serde(default)]
    pub binning: BinningConfig,

    /// Filtering and classification thresholds
    #[serde(default)]
    pub filtering: FilteringConfig,

    /// Anti-icing system and ice detector (absent on unheated sites)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icing: Option<IcingConfig>,

    /// Which reports to write
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            columns: ColumnConfig::default(),
            turbine: TurbineConfig::default(),
            binning: BinningConfig::default(),
            filtering: FilteringConfig::default(),
            icing: None,
            output: OutputConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config = Self::load_from_str(&contents, path)?;
        info!(path = %path.display(), dataset = %config.source.id, "Loaded site config");
        Ok(config)
    }

    /// Parse and validate TOML text. `origin` is only used in error messages.
    pub fn load_from_str(contents: &str, origin: &Path) -> Result<Self, ConfigError> {
        // Two-pass: check for unknown keys first (warnings only)
        for w in super::validation::validate_unknown_keys(contents) {
            warn!(origin = %origin.display(), "{}", w);
        }

        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(origin.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Directory all reports for this dataset are written to.
    pub fn result_dir(&self) -> PathBuf {
        PathBuf::from(&self.output.result_directory)
    }

    pub fn heated_site(&self) -> bool {
        self.icing.as_ref().is_some_and(|i| i.heating)
    }

    pub fn ice_detection(&self) -> bool {
        self.icing.as_ref().is_some_and(|i| i.ice_detection)
    }

    /// Heating power column, if the site reports IPS consumption.
    pub fn ips_power_column(&self) -> Option<usize> {
        self.icing.as_ref().and_then(|i| i.ips_power_column)
    }

    /// Parse the optional `[start_time, stop_time)` analysis window.
    pub fn time_window(&self) -> Result<TimeWindow, ConfigError> {
        let fmt = &self.source.datetime_format;
        let parse = |label: &str, raw: &Option<String>| -> Result<Option<NaiveDateTime>, ConfigError> {
            match raw.as_deref() {
                None => Ok(None),
                Some(s) if s.trim().eq_ignore_ascii_case("none") || s.trim().is_empty() => Ok(None),
                Some(s) => NaiveDateTime::parse_from_str(s.trim(), fmt)
                    .map(Some)
                    .map_err(|e| {
                        ConfigError::Validation(vec![format!(
                            "filtering.{label} = '{s}' does not match datetime_format '{fmt}': {e}"
                        )])
                    }),
            }
        };
        Ok(TimeWindow {
            start: parse("start_time", &self.filtering.start_time)?,
            stop: parse("stop_time", &self.filtering.stop_time)?,
        })
    }

    /// Resolve configured status codes to the numeric values seen in the data.
    ///
    /// Text codes go through the fault-code registry; codes missing from the
    /// registry are appended so comparisons stay well defined.
    pub fn resolve_codes(&self, registry: &mut FaultCodeRegistry) -> ResolvedCodes {
        let mut resolve_all =
            |codes: &[StatusCode]| codes.iter().map(|c| c.resolve(registry)).collect::<Vec<_>>();

        let normal_state = resolve_all(&self.turbine.normal_state);
        let status_stop = resolve_all(&self.turbine.status_stop_codes);
        let (ips_status, ice_alarm) = match &self.icing {
            Some(icing) => (
                resolve_all(&icing.ips_status_codes),
                icing.ice_alarm_code.resolve(registry),
            ),
            None => (Vec::new(), f64::NAN),
        };

        ResolvedCodes {
            normal_state,
            status_stop,
            ips_status,
            ice_alarm,
        }
    }

    /// Validate all settings for internal consistency.
    ///
    /// Rules:
    /// - Rated power, bin sizes and windows must be positive
    /// - Percentile bands must be ordered within 0-100
    /// - Every state column needs a normal value
    /// - Text status codes need fault-code replacement enabled
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if self.source.id.trim().is_empty() {
            errors.push("source.id must not be empty".to_string());
        }

        // Turbine
        if self.turbine.rated_power <= 0.0 {
            errors.push(format!(
                "turbine.rated_power ({}) must be > 0",
                self.turbine.rated_power
            ));
        }
        if self.turbine.normal_state.len() != self.columns.state.len() {
            errors.push(format!(
                "turbine.normal_state has {} values but columns.state lists {} columns",
                self.turbine.normal_state.len(),
                self.columns.state.len()
            ));
        }

        // Binning
        let b = &self.binning;
        if b.wind_speed_bin_size <= 0.0 {
            errors.push("binning.wind_speed_bin_size must be > 0".to_string());
        }
        if b.max_wind_speed <= b.min_wind_speed {
            errors.push(format!(
                "binning.max_wind_speed ({:.1}) must be > min_wind_speed ({:.1})",
                b.max_wind_speed, b.min_wind_speed
            ));
        }
        if b.wind_direction_bin_size <= 0.0 || b.wind_direction_bin_size > 360.0 {
            errors.push(format!(
                "binning.wind_direction_bin_size ({:.1}) must be within (0, 360]",
                b.wind_direction_bin_size
            ));
        }

        // Filtering
        let f = &self.filtering;
        Self::check_band(
            f.power_drop_percentile,
            f.overproduction_percentile,
            "filtering.power_drop_percentile / overproduction_percentile",
            &mut errors,
        );
        if f.icing_window == 0 {
            errors.push("filtering.icing_window must be > 0".to_string());
        }
        if f.stop_window == 0 {
            errors.push("filtering.stop_window must be > 0".to_string());
        }
        if f.stop_limit_multiplier <= 0.0 || f.stop_limit_multiplier >= 1.0 {
            errors.push(format!(
                "filtering.stop_limit_multiplier ({}) must be within (0, 1)",
                f.stop_limit_multiplier
            ));
        }
        if !(1..=4).contains(&f.state_filter_type) {
            errors.push(format!(
                "filtering.state_filter_type ({}) must be 1 (inclusive), 2 (exclusive), 3 (at least) or 4 (at most)",
                f.state_filter_type
            ));
        }
        if let Err(ConfigError::Validation(window_errors)) = self.time_window() {
            errors.extend(window_errors);
        }

        // Core channels must not share a column
        let c = &self.columns;
        let core = [
            ("timestamp", c.timestamp),
            ("wind_speed", c.wind_speed),
            ("wind_direction", c.wind_direction),
            ("temperature", c.temperature),
            ("power", c.power),
        ];
        let mut seen = HashSet::new();
        for (name, idx) in core {
            if !seen.insert(idx) {
                errors.push(format!("columns.{name} = {idx} is already used by another core channel"));
            }
        }

        // Icing
        if let Some(icing) = &self.icing {
            if icing.ice_detection && icing.ice_alarm_column.is_none() {
                errors.push("icing.ice_alarm_column is required when ice_detection = true".to_string());
            }
            if icing.heating && (icing.ips_status_columns.is_empty() || icing.ips_status_codes.is_empty()) {
                errors.push(
                    "icing.ips_status_columns and ips_status_codes are required when heating = true"
                        .to_string(),
                );
            }
            if icing.ips_status_type > 2 {
                errors.push(format!(
                    "icing.ips_status_type ({}) must be 0 (disabled), 1 (inclusive) or 2 (exclusive)",
                    icing.ips_status_type
                ));
            }
        }

        // Text codes only make sense when the importer replaces them
        if !self.source.replace_fault_codes && self.has_text_codes() {
            errors.push(
                "text status codes require source.replace_fault_codes = true".to_string(),
            );
        }

        // Physical range validation
        let (range_errors, range_warnings) = super::validation::validate_physical_ranges(self);
        errors.extend(range_errors);
        for w in &range_warnings {
            warn!("{}", w);
        }

        // Reject NaN/Inf in any numeric setting
        if let Ok(value) = toml::Value::try_from(self) {
            for key in super::validation::non_finite_keys(&value, "") {
                errors.push(format!("{key} must be a finite number"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn check_band(low: f64, high: f64, name: &str, errors: &mut Vec<String>) {
        // NaN/Inf comparisons silently pass; catch them explicitly
        if !low.is_finite() || !high.is_finite() {
            errors.push(format!("{name}: values must be finite (got low={low}, high={high})"));
            return;
        }
        if !(0.0..=100.0).contains(&low) || !(0.0..=100.0).contains(&high) {
            errors.push(format!("{name}: percentiles must be within 0-100 (got {low}, {high})"));
        }
        if low >= high {
            errors.push(format!("{name}: low ({low:.1}) must be < high ({high:.1})"));
        }
    }

    fn has_text_codes(&self) -> bool {
        let is_text = |c: &StatusCode| matches!(c, StatusCode::Text(_));
        self.turbine.normal_state.iter().any(is_text)
            || self.turbine.status_stop_codes.iter().any(is_text)
            || self.icing.as_ref().is_some_and(|i| {
                i.ips_status_codes.iter().any(is_text) || is_text(&i.ice_alarm_code)
            })
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Status Codes
// ============================================================================

/// A status or fault code as written in the config: numeric, or the text
/// form used by SCADA exports with alphanumeric fault codes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatusCode {
    Numeric(f64),
    Text(String),
}

impl StatusCode {
    /// Numeric value as it appears in the ingested data.
    pub fn resolve(&self, registry: &mut FaultCodeRegistry) -> f64 {
        match self {
            StatusCode::Numeric(v) => *v,
            StatusCode::Text(s) => registry.resolve(s),
        }
    }
}

/// Status codes resolved to data values, ready for the filters and classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCodes {
    pub normal_state: Vec<f64>,
    pub status_stop: Vec<f64>,
    pub ips_status: Vec<f64>,
    pub ice_alarm: f64,
}

/// Half-open analysis window; `None` bounds are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: Option<NaiveDateTime>,
    pub stop: Option<NaiveDateTime>,
}

impl TimeWindow {
    pub fn contains(&self, t: NaiveDateTime) -> bool {
        self.start.map_or(true, |s| t >= s) && self.stop.map_or(true, |s| t < s)
    }
}

// ============================================================================
// Source File
// ============================================================================

/// Dataset identity and CSV dialect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Dataset identifier, used as the prefix of every report file
    #[serde(default = "default_dataset_id")]
    pub id: String,

    /// Path of the SCADA CSV file
    #[serde(default)]
    pub filename: String,

    /// Field delimiter; `"TAB"` selects a tab character
    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    /// Optional quote character around text fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quotechar: Option<String>,

    /// chrono/strftime format of the timestamp column
    #[serde(default = "default_datetime_format")]
    pub datetime_format: String,

    /// Trailing characters (e.g. timezone suffix) trimmed before parsing timestamps
    #[serde(default)]
    pub datetime_extra_chars: usize,

    /// Replace textual fault codes with registry numbers
    #[serde(default)]
    pub replace_fault_codes: bool,

    /// Columns holding textual fault codes
    #[serde(default)]
    pub fault_columns: Vec<usize>,

    /// Columns ignored at ingestion (read as NaN)
    #[serde(default)]
    pub skip_columns: Vec<usize>,
}

fn default_dataset_id() -> String {
    "turbine".to_string()
}
fn default_delimiter() -> String {
    ",".to_string()
}
fn default_datetime_format() -> String {
    "%Y-%m-%d %H:%M:%S".to_string()
}

impl SourceConfig {
    /// Field delimiter character.
    pub fn delimiter_char(&self) -> char {
        if self.delimiter.eq_ignore_ascii_case("TAB") {
            '\t'
        } else {
            self.delimiter.chars().next().unwrap_or(',')
        }
    }

    /// Quote character, `None` when unset or `"NONE"`.
    pub fn quote_char(&self) -> Option<char> {
        self.quotechar
            .as_deref()
            .filter(|q| !q.eq_ignore_ascii_case("NONE"))
            .and_then(|q| q.chars().next())
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            id: default_dataset_id(),
            filename: String::new(),
            delimiter: default_delimiter(),
            quotechar: None,
            datetime_format: default_datetime_format(),
            datetime_extra_chars: 0,
            replace_fault_codes: false,
            fault_columns: Vec::new(),
            skip_columns: Vec::new(),
        }
    }
}

// ============================================================================
// Column Layout
// ============================================================================

/// Zero-based column index of every channel in the source CSV.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnConfig {
    #[serde(default)]
    pub timestamp: usize,
    #[serde(default = "default_wind_speed_column")]
    pub wind_speed: usize,
    #[serde(default = "default_wind_direction_column")]
    pub wind_direction: usize,
    #[serde(default = "default_temperature_column")]
    pub temperature: usize,
    #[serde(default = "default_power_column")]
    pub power: usize,
    /// Turbine state columns compared against `turbine.normal_state`
    #[serde(default = "default_state_columns")]
    pub state: Vec<usize>,
    /// Status columns compared against `turbine.status_stop_codes`
    #[serde(default)]
    pub status: Vec<usize>,
}

fn default_wind_speed_column() -> usize { 1 }
fn default_wind_direction_column() -> usize { 2 }
fn default_temperature_column() -> usize { 3 }
fn default_power_column() -> usize { 4 }
fn default_state_columns() -> Vec<usize> { vec![5] }

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            timestamp: 0,
            wind_speed: default_wind_speed_column(),
            wind_direction: default_wind_direction_column(),
            temperature: default_temperature_column(),
            power: default_power_column(),
            state: default_state_columns(),
            status: Vec::new(),
        }
    }
}

// ============================================================================
// Turbine
// ============================================================================

/// Turbine ratings and the status codes that define normal operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurbineConfig {
    /// Rated power (kW); 1.0 when power is given relative to rated
    #[serde(default = "default_rated_power")]
    pub rated_power: f64,

    /// Site elevation above sea level (m), used by the air density correction
    #[serde(default)]
    pub site_elevation: f64,

    /// Normal value of each state column (same order as `columns.state`)
    #[serde(default = "default_normal_state")]
    pub normal_state: Vec<StatusCode>,

    /// Status codes that mark an icing-related stop
    #[serde(default = "default_status_stop_codes")]
    pub status_stop_codes: Vec<StatusCode>,
}

fn default_rated_power() -> f64 { 1.0 }
fn default_normal_state() -> Vec<StatusCode> { vec![StatusCode::Numeric(0.0)] }
fn default_status_stop_codes() -> Vec<StatusCode> { vec![StatusCode::Numeric(0.0)] }

impl Default for TurbineConfig {
    fn default() -> Self {
        Self {
            rated_power: default_rated_power(),
            site_elevation: 0.0,
            normal_state: default_normal_state(),
            status_stop_codes: default_status_stop_codes(),
        }
    }
}

// ============================================================================
// Binning
// ============================================================================

/// Power curve bin centers: speed `[min, max)` and direction `[0, 360)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinningConfig {
    #[serde(default)]
    pub min_wind_speed: f64,
    #[serde(default = "default_max_wind_speed")]
    pub max_wind_speed: f64,
    #[serde(default = "default_wind_speed_bin_size")]
    pub wind_speed_bin_size: f64,
    /// 360 gives a single, direction-independent curve
    #[serde(default = "default_wind_direction_bin_size")]
    pub wind_direction_bin_size: f64,
}

fn default_max_wind_speed() -> f64 { 20.0 }
fn default_wind_speed_bin_size() -> f64 { 1.0 }
fn default_wind_direction_bin_size() -> f64 { 360.0 }

impl Default for BinningConfig {
    fn default() -> Self {
        Self {
            min_wind_speed: 0.0,
            max_wind_speed: default_max_wind_speed(),
            wind_speed_bin_size: default_wind_speed_bin_size(),
            wind_direction_bin_size: default_wind_direction_bin_size(),
        }
    }
}

// ============================================================================
// Filtering
// ============================================================================

/// Reference-set filters and alarm classifier thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilteringConfig {
    /// Low percentile band used as the power-loss limit
    #[serde(default = "default_power_drop_percentile")]
    pub power_drop_percentile: f64,

    /// High percentile band used as the overproduction limit
    #[serde(default = "default_overproduction_percentile")]
    pub overproduction_percentile: f64,

    /// Minimum power as a fraction of rated for the analysed and reference sets
    #[serde(default = "default_power_level_filter")]
    pub power_level_filter: f64,

    /// Temperature at or below which power alarms are possible (°C)
    #[serde(default = "default_icing_temperature")]
    pub icing_temperature: f64,

    /// Minimum temperature of reference samples (°C)
    #[serde(default = "default_reference_temperature")]
    pub reference_temperature: f64,

    /// Consecutive samples required to confirm a power alarm
    #[serde(default = "default_icing_window")]
    pub icing_window: usize,

    /// 0 = power based stops, 1 = status code in set, 2 = status code not in set
    #[serde(default)]
    pub stop_filter_type: u8,

    /// Stop threshold as a fraction of rated power
    #[serde(default = "default_stop_limit_multiplier")]
    pub stop_limit_multiplier: f64,

    /// Look-ahead and confirmation window for stops (samples)
    #[serde(default = "default_stop_window")]
    pub stop_window: usize,

    /// 1 = inclusive, 2 = exclusive, 3 = at least, 4 = at most
    #[serde(default = "default_state_filter_type")]
    pub state_filter_type: u8,

    /// Minimum population of a power curve bin
    #[serde(default = "default_min_bin_size")]
    pub min_bin_size: usize,

    /// Replace cross-direction outliers in the power curve
    #[serde(default = "default_distance_filter")]
    pub distance_filter: bool,

    /// Analysis window start (source datetime format)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,

    /// Analysis window end, exclusive (source datetime format)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_time: Option<String>,
}

fn default_power_drop_percentile() -> f64 { 10.0 }
fn default_overproduction_percentile() -> f64 { 90.0 }
fn default_power_level_filter() -> f64 { 0.01 }
fn default_icing_temperature() -> f64 { 1.0 }
fn default_reference_temperature() -> f64 { 3.0 }
fn default_icing_window() -> usize { 3 }
fn default_stop_limit_multiplier() -> f64 { 0.005 }
fn default_stop_window() -> usize { 6 }
fn default_state_filter_type() -> u8 { 1 }
fn default_min_bin_size() -> usize { 36 }
fn default_distance_filter() -> bool { true }

impl Default for FilteringConfig {
    fn default() -> Self {
        Self {
            power_drop_percentile: default_power_drop_percentile(),
            overproduction_percentile: default_overproduction_percentile(),
            power_level_filter: default_power_level_filter(),
            icing_temperature: default_icing_temperature(),
            reference_temperature: default_reference_temperature(),
            icing_window: default_icing_window(),
            stop_filter_type: 0,
            stop_limit_multiplier: default_stop_limit_multiplier(),
            stop_window: default_stop_window(),
            state_filter_type: default_state_filter_type(),
            min_bin_size: default_min_bin_size(),
            distance_filter: default_distance_filter(),
            start_time: None,
            stop_time: None,
        }
    }
}

// ============================================================================
// Icing (optional)
// ============================================================================

/// Anti-icing system (IPS) and ice detector channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IcingConfig {
    /// Site has a blade heating system
    #[serde(default)]
    pub heating: bool,

    /// Site has an ice detector
    #[serde(default)]
    pub ice_detection: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ice_alarm_column: Option<usize>,

    /// Detector value that means "ice detected"
    #[serde(default = "default_ice_alarm_code")]
    pub ice_alarm_code: StatusCode,

    #[serde(default)]
    pub ips_status_columns: Vec<usize>,

    #[serde(default)]
    pub ips_status_codes: Vec<StatusCode>,

    /// 1 = running when code in set, 2 = running when code not in set
    #[serde(default = "default_ips_status_type")]
    pub ips_status_type: u8,

    /// Heating power consumption column (kW)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ips_power_column: Option<usize>,
}

fn default_ice_alarm_code() -> StatusCode { StatusCode::Numeric(1.0) }
fn default_ips_status_type() -> u8 { 1 }

impl Default for IcingConfig {
    fn default() -> Self {
        Self {
            heating: false,
            ice_detection: false,
            ice_alarm_column: None,
            ice_alarm_code: default_ice_alarm_code(),
            ips_status_columns: Vec::new(),
            ips_status_codes: Vec::new(),
            ips_status_type: default_ips_status_type(),
            ips_power_column: None,
        }
    }
}

// ============================================================================
// Output
// ============================================================================

/// Report selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_result_directory")]
    pub result_directory: String,
    #[serde(default = "default_true")]
    pub summary: bool,
    #[serde(default = "default_true")]
    pub power_curve: bool,
    /// Event CSVs and monthly production statistics
    #[serde(default)]
    pub icing_events: bool,
    #[serde(default)]
    pub alarm_time_series: bool,
    #[serde(default)]
    pub filtered_raw_data: bool,
}

fn default_result_directory() -> String { ".".to_string() }
fn default_true() -> bool { true }

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            result_directory: default_result_directory(),
            summary: true,
            power_curve: true,
            icing_events: false,
            alarm_time_series: false,
            filtered_raw_data: false,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = SiteConfig::default();
        assert!(config.validate().is_ok(), "Default config must always validate");
    }

    #[test]
    fn test_empty_toml_produces_defaults() {
        let config: SiteConfig = toml::from_str("").expect("empty TOML should parse");
        assert_eq!(config.filtering.power_drop_percentile, 10.0);
        assert_eq!(config.filtering.min_bin_size, 36);
        assert_eq!(config.binning.wind_direction_bin_size, 360.0);
        assert_eq!(config.columns.state, vec![5]);
        assert!(config.icing.is_none());
        assert!(config.output.summary);
    }

    #[test]
    fn test_partial_toml_override() {
        let toml_str = r#"
[source]
id = "T1"
delimiter = "TAB"

[filtering]
icing_window = 6
"#;
        let config: SiteConfig = toml::from_str(toml_str).expect("partial TOML should parse");
        assert_eq!(config.source.id, "T1");
        assert_eq!(config.source.delimiter_char(), '\t');
        assert_eq!(config.filtering.icing_window, 6);
        // Non-overridden values retain defaults
        assert_eq!(config.filtering.stop_window, 6);
        assert_eq!(config.turbine.rated_power, 1.0);
    }

    #[test]
    fn test_mixed_status_codes_parse() {
        let toml_str = r#"
[source]
replace_fault_codes = true
fault_columns = [5]

[turbine]
normal_state = ["RUN"]
status_stop_codes = [12, "ICE STOP"]
"#;
        let config: SiteConfig = toml::from_str(toml_str).expect("codes should parse");
        assert_eq!(config.turbine.normal_state, vec![StatusCode::Text("RUN".into())]);
        assert_eq!(config.turbine.status_stop_codes[0], StatusCode::Numeric(12.0));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_text_codes_require_replacement() {
        let mut config = SiteConfig::default();
        config.turbine.normal_state = vec![StatusCode::Text("RUN".into())];
        let result = config.validate();
        assert!(result.is_err(), "Text codes without replacement should fail");
        if let Err(ConfigError::Validation(errors)) = result {
            assert!(errors.iter().any(|e| e.contains("replace_fault_codes")));
        }
    }

    #[test]
    fn test_validation_catches_inverted_percentiles() {
        let mut config = SiteConfig::default();
        config.filtering.power_drop_percentile = 90.0;
        config.filtering.overproduction_percentile = 10.0;
        let result = config.validate();
        assert!(result.is_err(), "Inverted percentile band should fail validation");
        if let Err(ConfigError::Validation(errors)) = result {
            assert!(errors.iter().any(|e| e.contains("percentile")));
        }
    }

    #[test]
    fn test_validation_catches_state_length_mismatch() {
        let mut config = SiteConfig::default();
        config.columns.state = vec![5, 6];
        assert!(config.validate().is_err(), "Two state columns with one normal value should fail");
    }

    #[test]
    fn test_validation_catches_shared_core_column() {
        let mut config = SiteConfig::default();
        config.columns.power = config.columns.wind_speed;
        let result = config.validate();
        assert!(result.is_err());
        if let Err(ConfigError::Validation(errors)) = result {
            assert!(errors.iter().any(|e| e.contains("columns.power")));
        }
    }

    #[test]
    fn test_validation_rejects_nan() {
        let mut config = SiteConfig::default();
        config.turbine.site_elevation = f64::NAN;
        assert!(config.validate().is_err(), "NaN elevation must be rejected");
    }

    #[test]
    fn test_time_window_parsing() {
        let mut config = SiteConfig::default();
        config.filtering.start_time = Some("2015-01-01 00:00:00".into());
        config.filtering.stop_time = Some("NONE".into());
        let window = config.time_window().expect("window should parse");
        assert!(window.start.is_some());
        assert!(window.stop.is_none());

        config.filtering.start_time = Some("01/01/2015".into());
        assert!(config.time_window().is_err());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolve_codes_through_registry() {
        let mut config = SiteConfig::default();
        config.source.replace_fault_codes = true;
        config.turbine.normal_state = vec![StatusCode::Text("RUN".into())];
        config.turbine.status_stop_codes = vec![StatusCode::Text("ICE".into()), StatusCode::Numeric(7.0)];

        let mut registry = FaultCodeRegistry::default();
        registry.resolve("RUN");
        let codes = config.resolve_codes(&mut registry);
        assert_eq!(codes.normal_state, vec![0.0]);
        // Unknown text code is appended to the registry
        assert_eq!(codes.status_stop, vec![1.0, 7.0]);
        assert!(codes.ice_alarm.is_nan(), "No icing section means no detector code");
    }

    #[test]
    fn test_roundtrip_toml() {
        let mut original = SiteConfig::default();
        original.icing = Some(IcingConfig {
            heating: true,
            ips_status_columns: vec![7],
            ips_status_codes: vec![StatusCode::Numeric(1.0)],
            ..Default::default()
        });
        let toml_str = original.to_toml().expect("serialization should work");
        let roundtripped: SiteConfig = toml::from_str(&toml_str).expect("deserialization should work");
        assert_eq!(original, roundtripped);
    }
}
