//! SCADA CSV Ingestion
//!
//! Reads one turbine export into a sorted, de-duplicated [`SampleMatrix`].
//! Column positions, delimiter, quoting and the timestamp format all come
//! from the site configuration.
//!
//! Textual fault codes (e.g. `"FM 221 ICE"`) are mapped to stable numbers
//! through a [`FaultCodeRegistry`] so the rest of the engine only deals with
//! numeric status values.
//!
//! # Usage
//!
//! ```ignore
//! use iceloss::ingest::CsvImporter;
//!
//! let importer = CsvImporter::from_config(&config);
//! let data = importer.read(Path::new("t1.csv"))?;
//! println!("{} rows, {} rejected", data.matrix.len(), data.rows_rejected);
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::defaults::MAX_LOGGED_PARSE_ERRORS;
use crate::config::{ColumnConfig, SiteConfig};
use crate::types::{Sample, SampleMatrix};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Empty file, no header row: {0}")]
    EmptyFile(PathBuf),

    #[error("Column {column} ({channel}) is outside the {width} header columns of {path}")]
    MissingColumn {
        path: PathBuf,
        channel: String,
        column: usize,
        width: usize,
    },

    #[error("No valid rows in {path}: {rejected} rows rejected")]
    NoValidRows { path: PathBuf, rejected: usize },
}

// ============================================================================
// CSV Quote-Aware Parsing
// ============================================================================

/// Split a CSV line on `delimiter`, honouring an optional quote character.
/// Doubled quotes inside a quoted field are unescaped.
pub fn csv_split(line: &str, delimiter: char, quote: Option<char>) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        if Some(ch) == quote {
            if in_quotes {
                if chars.peek() == Some(&ch) {
                    current.push(ch);
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                in_quotes = true;
            }
        } else if ch == delimiter && !in_quotes {
            fields.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }
    }
    fields.push(current);
    fields
}

/// Numeric cell value; boolean text maps to 1/0, anything else is NaN.
pub fn parse_cell(raw: &str) -> f64 {
    let cell = raw.trim();
    if let Ok(v) = cell.parse::<f64>() {
        return v;
    }
    let upper = cell.to_ascii_uppercase();
    if upper.contains("TRUE") {
        1.0
    } else if upper.contains("FALSE") {
        0.0
    } else {
        f64::NAN
    }
}

// ============================================================================
// Fault Code Registry
// ============================================================================

/// Text fault code to number mapping, numbered in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaultCodeRegistry {
    codes: BTreeMap<String, u32>,
}

impl FaultCodeRegistry {
    /// Number every distinct code in the given fault columns.
    ///
    /// Codes of the first column are numbered 0.. in order of appearance;
    /// codes first seen in later columns continue after the highest number.
    pub fn from_records(records: &[Vec<String>], fault_columns: &[usize]) -> Self {
        let mut registry = Self::default();
        for &col in fault_columns {
            for record in records {
                if let Some(cell) = record.get(col) {
                    let code = cell.trim();
                    if !code.is_empty() {
                        registry.resolve(code);
                    }
                }
            }
        }
        registry
    }

    /// Number of `code`, registering it when unseen.
    pub fn resolve(&mut self, code: &str) -> f64 {
        let key = code.trim();
        if let Some(&n) = self.codes.get(key) {
            return f64::from(n);
        }
        let next = self.codes.values().max().map_or(0, |m| m + 1);
        self.codes.insert(key.to_string(), next);
        f64::from(next)
    }

    pub fn get(&self, code: &str) -> Option<f64> {
        self.codes.get(code.trim()).map(|&n| f64::from(n))
    }

    /// Text code of a number, for exports that restore the original values.
    pub fn text_of(&self, value: f64) -> Option<&str> {
        self.codes
            .iter()
            .find(|(_, &n)| f64::from(n) == value)
            .map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Pretty JSON object, keys sorted.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

// ============================================================================
// Importer
// ============================================================================

/// Result of one CSV import.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub matrix: SampleMatrix,
    pub registry: FaultCodeRegistry,
    /// Data lines read (header excluded)
    pub rows_read: usize,
    /// Lines dropped because the timestamp could not be parsed
    pub rows_rejected: usize,
}

/// CSV reader configured for one site.
#[derive(Debug, Clone)]
pub struct CsvImporter {
    delimiter: char,
    quote: Option<char>,
    datetime_format: String,
    datetime_extra_chars: usize,
    replace_fault_codes: bool,
    fault_columns: Vec<usize>,
    skip_columns: Vec<usize>,
    columns: ColumnConfig,
    ips_status_columns: Vec<usize>,
    ice_alarm_column: Option<usize>,
    ips_power_column: Option<usize>,
}

impl CsvImporter {
    pub fn from_config(config: &SiteConfig) -> Self {
        let src = &config.source;
        Self {
            delimiter: src.delimiter_char(),
            quote: src.quote_char(),
            datetime_format: src.datetime_format.clone(),
            datetime_extra_chars: src.datetime_extra_chars,
            replace_fault_codes: src.replace_fault_codes,
            fault_columns: src.fault_columns.clone(),
            skip_columns: src.skip_columns.clone(),
            columns: config.columns.clone(),
            ips_status_columns: config
                .icing
                .as_ref()
                .map(|i| i.ips_status_columns.clone())
                .unwrap_or_default(),
            ice_alarm_column: config.icing.as_ref().and_then(|i| i.ice_alarm_column),
            ips_power_column: config.ips_power_column(),
        }
    }

    /// Read and parse a CSV file.
    pub fn read(&self, path: &Path) -> Result<IngestedData, IngestError> {
        let contents = std::fs::read_to_string(path).map_err(|e| IngestError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.parse_str(&contents, path)
    }

    /// Parse CSV text. `origin` is only used in errors and logs.
    pub fn parse_str(&self, contents: &str, origin: &Path) -> Result<IngestedData, IngestError> {
        let mut lines = contents.lines();
        let header_line = lines
            .next()
            .ok_or_else(|| IngestError::EmptyFile(origin.to_path_buf()))?;
        let headers: Vec<String> = csv_split(header_line.trim_start_matches('\u{feff}'), self.delimiter, self.quote)
            .into_iter()
            .map(|h| h.trim().to_string())
            .collect();
        self.check_columns(headers.len(), origin)?;

        let records: Vec<Vec<String>> = lines
            .filter(|l| !l.trim().is_empty())
            .map(|l| csv_split(l, self.delimiter, self.quote))
            .collect();

        let registry = if self.replace_fault_codes {
            FaultCodeRegistry::from_records(&records, &self.fault_columns)
        } else {
            FaultCodeRegistry::default()
        };

        let mut rows = Vec::with_capacity(records.len());
        let mut rejected = 0usize;
        for (i, record) in records.iter().enumerate() {
            match self.parse_record(record, headers.len(), &registry) {
                Some(sample) => rows.push(sample),
                None => {
                    if rejected < MAX_LOGGED_PARSE_ERRORS {
                        warn!(
                            file = %origin.display(),
                            line = i + 2,
                            value = record.get(self.columns.timestamp).map_or("", String::as_str),
                            "Unparseable timestamp, row skipped"
                        );
                    }
                    rejected += 1;
                }
            }
        }

        if rows.is_empty() {
            return Err(IngestError::NoValidRows {
                path: origin.to_path_buf(),
                rejected,
            });
        }

        rows.sort_by_key(|s| s.timestamp);
        let before = rows.len();
        rows.dedup_by_key(|s| s.timestamp);
        let duplicates = before - rows.len();

        info!(
            file = %origin.display(),
            rows = rows.len(),
            rejected,
            duplicates,
            fault_codes = registry.len(),
            "SCADA data loaded"
        );

        Ok(IngestedData {
            matrix: SampleMatrix::new(headers, rows),
            registry,
            rows_read: records.len(),
            rows_rejected: rejected,
        })
    }

    fn check_columns(&self, width: usize, origin: &Path) -> Result<(), IngestError> {
        let c = &self.columns;
        let mut channels: Vec<(String, usize)> = vec![
            ("timestamp".into(), c.timestamp),
            ("wind_speed".into(), c.wind_speed),
            ("wind_direction".into(), c.wind_direction),
            ("temperature".into(), c.temperature),
            ("power".into(), c.power),
        ];
        channels.extend(c.state.iter().map(|&i| ("state".to_string(), i)));
        channels.extend(c.status.iter().map(|&i| ("status".to_string(), i)));
        channels.extend(self.ips_status_columns.iter().map(|&i| ("ips_status".to_string(), i)));
        channels.extend(self.ice_alarm_column.map(|i| ("ice_alarm".to_string(), i)));
        channels.extend(self.ips_power_column.map(|i| ("ips_power".to_string(), i)));

        match channels.into_iter().find(|(_, col)| *col >= width) {
            Some((channel, column)) => Err(IngestError::MissingColumn {
                path: origin.to_path_buf(),
                channel,
                column,
                width,
            }),
            None => Ok(()),
        }
    }

    fn parse_timestamp(&self, raw: &str) -> Option<NaiveDateTime> {
        let trimmed = raw.trim();
        let keep = trimmed.chars().count().checked_sub(self.datetime_extra_chars)?;
        let text: String = trimmed.chars().take(keep).collect();
        NaiveDateTime::parse_from_str(text.trim(), &self.datetime_format).ok()
    }

    fn parse_record(&self, record: &[String], width: usize, registry: &FaultCodeRegistry) -> Option<Sample> {
        let timestamp = self.parse_timestamp(record.get(self.columns.timestamp)?)?;

        let raw: Vec<f64> = (0..width)
            .map(|col| {
                let Some(cell) = record.get(col) else {
                    return f64::NAN;
                };
                if col == self.columns.timestamp || self.skip_columns.contains(&col) {
                    f64::NAN
                } else if self.replace_fault_codes && self.fault_columns.contains(&col) {
                    registry.get(cell).unwrap_or(f64::NAN)
                } else {
                    parse_cell(cell)
                }
            })
            .collect();

        let at = |col: usize| raw.get(col).copied().unwrap_or(f64::NAN);
        let c = &self.columns;
        Some(Sample {
            timestamp,
            wind_speed: at(c.wind_speed),
            wind_direction: at(c.wind_direction),
            temperature: at(c.temperature),
            power: at(c.power),
            state: c.state.iter().map(|&i| at(i)).collect(),
            status: c.status.iter().map(|&i| at(i)).collect(),
            ips_status: self.ips_status_columns.iter().map(|&i| at(i)).collect(),
            ice_alarm: self.ice_alarm_column.map_or(f64::NAN, at),
            heating_power: self.ips_power_column.map_or(f64::NAN, at),
            raw,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_split_quoted_delimiter() {
        let fields = csv_split(r#"a;"b;c";"say ""hi""""#, ';', Some('"'));
        assert_eq!(fields, vec!["a", "b;c", r#"say "hi""#]);
    }

    #[test]
    fn test_csv_split_without_quote_char() {
        let fields = csv_split("a\t\"b\"\t", '\t', None);
        assert_eq!(fields, vec!["a", "\"b\"", ""]);
    }

    #[test]
    fn test_parse_cell_variants() {
        assert_eq!(parse_cell(" 12.5 "), 12.5);
        assert_eq!(parse_cell("True"), 1.0);
        assert_eq!(parse_cell("FALSE"), 0.0);
        assert!(parse_cell("n/a").is_nan());
        assert!(parse_cell("").is_nan());
    }

    #[test]
    fn test_registry_numbering_across_columns() {
        let records = vec![
            vec!["RUN".to_string(), "OK".to_string()],
            vec!["ICE".to_string(), "RUN".to_string()],
            vec!["RUN".to_string(), "WARN".to_string()],
        ];
        let registry = FaultCodeRegistry::from_records(&records, &[0, 1]);
        assert_eq!(registry.get("RUN"), Some(0.0));
        assert_eq!(registry.get("ICE"), Some(1.0));
        assert_eq!(registry.get("OK"), Some(2.0));
        assert_eq!(registry.get("WARN"), Some(3.0));
        assert_eq!(registry.text_of(1.0), Some("ICE"));
    }

    #[test]
    fn test_registry_resolve_appends() {
        let mut registry = FaultCodeRegistry::default();
        assert_eq!(registry.resolve("A"), 0.0);
        assert_eq!(registry.resolve("B"), 1.0);
        assert_eq!(registry.resolve(" A "), 0.0);
        assert_eq!(registry.len(), 2);
        let json = registry.to_json().unwrap();
        let parsed: BTreeMap<String, u32> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.get("B"), Some(&1));
    }

    #[test]
    fn test_parse_sorts_dedups_and_rejects() {
        let mut config = SiteConfig::default();
        config.source.delimiter = ";".into();
        config.source.datetime_extra_chars = 4;
        let importer = CsvImporter::from_config(&config);
        let csv = "\
time;ws;wd;temp;power;state
2020-01-01 00:20:00 UTC;7;180;-1;0.4;0
2020-01-01 00:10:00 UTC;6;180;-1;0.3;0
bad-date;6;180;-1;0.3;0
2020-01-01 00:10:00 UTC;9;180;-1;0.9;0
2020-01-01 00:30:00 UTC;8;;-1;true;0
";
        let data = importer.parse_str(csv, Path::new("mem.csv")).unwrap();
        assert_eq!(data.rows_read, 5);
        assert_eq!(data.rows_rejected, 1);
        assert_eq!(data.matrix.len(), 3);
        let rows = &data.matrix.rows;
        assert!(rows.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        // First duplicate wins
        assert_eq!(rows[0].wind_speed, 6.0);
        assert!(rows[2].wind_direction.is_nan());
        assert_eq!(rows[2].power, 1.0);
        assert_eq!(rows[0].state, vec![0.0]);
        assert_eq!(data.matrix.headers[1], "ws");
    }

    #[test]
    fn test_fault_codes_replaced() {
        let mut config = SiteConfig::default();
        config.source.replace_fault_codes = true;
        config.source.fault_columns = vec![5];
        let importer = CsvImporter::from_config(&config);
        let csv = "\
time,ws,wd,temp,power,state
2020-01-01 00:00:00,7,180,-1,0.4,RUN
2020-01-01 00:10:00,7,180,-1,0.4,ICE STOP
";
        let data = importer.parse_str(csv, Path::new("mem.csv")).unwrap();
        assert_eq!(data.matrix.rows[1].state, vec![1.0]);
        assert_eq!(data.registry.get("ICE STOP"), Some(1.0));
    }

    #[test]
    fn test_missing_column_is_error() {
        let mut config = SiteConfig::default();
        config.columns.state = vec![9];
        let importer = CsvImporter::from_config(&config);
        let err = importer
            .parse_str("a,b,c,d,e,f\n", Path::new("mem.csv"))
            .unwrap_err();
        assert!(matches!(err, IngestError::MissingColumn { column: 9, .. }));
    }

    #[test]
    fn test_no_valid_rows_is_error() {
        let importer = CsvImporter::from_config(&SiteConfig::default());
        let err = importer
            .parse_str("a,b,c,d,e,f\nxx,1,2,3,4,5\n", Path::new("mem.csv"))
            .unwrap_err();
        assert!(matches!(err, IngestError::NoValidRows { rejected: 1, .. }));
    }
}
