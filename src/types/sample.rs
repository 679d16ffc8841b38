//! SCADA sample types: Sample, SampleMatrix

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One SCADA measurement row with its channels resolved to named fields.
///
/// Missing or unparseable values are `f64::NAN` and propagate through
/// every downstream computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: NaiveDateTime,

    // === Core channels ===
    /// Nacelle wind speed (m/s), density-corrected after the first pipeline stage
    pub wind_speed: f64,
    /// Wind direction (degrees, 0-360 wrap)
    pub wind_direction: f64,
    /// Ambient temperature (°C)
    pub temperature: f64,
    /// Active power (kW, or fraction of rated when rated power is 1.0)
    pub power: f64,

    // === Status channels ===
    /// Turbine state values, one per configured state column
    pub state: Vec<f64>,
    /// Status-code stop values, one per configured status column
    #[serde(default)]
    pub status: Vec<f64>,
    /// Anti-icing system status values, one per configured IPS column
    #[serde(default)]
    pub ips_status: Vec<f64>,
    /// Ice detector alarm value (NaN when no detector is configured)
    pub ice_alarm: f64,
    /// Heating power consumption (kW, NaN when not configured)
    pub heating_power: f64,

    /// Full numeric row in source column order (timestamp slot is NaN)
    #[serde(default)]
    pub raw: Vec<f64>,
}

impl Sample {
    /// Build a sample carrying only the core channels.
    ///
    /// Status channels are empty and optional channels are NaN.
    pub fn new(
        timestamp: NaiveDateTime,
        wind_speed: f64,
        wind_direction: f64,
        temperature: f64,
        power: f64,
    ) -> Self {
        Self {
            timestamp,
            wind_speed,
            wind_direction,
            temperature,
            power,
            state: Vec::new(),
            status: Vec::new(),
            ips_status: Vec::new(),
            ice_alarm: f64::NAN,
            heating_power: f64::NAN,
            raw: Vec::new(),
        }
    }

    /// Attach turbine state values.
    #[must_use]
    pub fn with_state(mut self, state: Vec<f64>) -> Self {
        self.state = state;
        self
    }
}

/// Ordered, de-duplicated SCADA time series.
///
/// Rows are ascending by timestamp with no duplicates. Ingestion enforces
/// this; the engine consumes it as a precondition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleMatrix {
    /// Source header names, in column order
    pub headers: Vec<String>,
    pub rows: Vec<Sample>,
}

impl SampleMatrix {
    pub fn new(headers: Vec<String>, rows: Vec<Sample>) -> Self {
        Self { headers, rows }
    }

    /// Matrix without header information, used for in-memory datasets.
    pub fn from_rows(rows: Vec<Sample>) -> Self {
        Self {
            headers: Vec::new(),
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Return a new matrix with the rows matching `keep`, order preserved.
    pub fn select<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(&Sample) -> bool,
    {
        Self {
            headers: self.headers.clone(),
            rows: self.rows.iter().filter(|s| keep(s)).cloned().collect(),
        }
    }

    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.rows.first().map(|s| s.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.rows.last().map(|s| s.timestamp)
    }
}
