//! Alarm and event types: AlarmCode, AlarmRecord, EventInterval

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ============================================================================
// Alarm Codes
// ============================================================================

/// Per-timestamp icing classification.
///
/// Numeric values are stable and used verbatim in exported alarm files:
/// - **PowerLoss** (1): power at or below the low percentile band while cold
/// - **Stop** (2): power loss that ends in a stop despite available wind
/// - **Overproduction** (3): power at or above the high band while cold
/// - **StatusStop** (4): SCADA status code reports a stop
/// - **IpsActive** (5): anti-icing system running
/// - **IceDetected** (6): ice detector alarm raised
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[repr(u8)]
pub enum AlarmCode {
    #[default]
    None = 0,
    PowerLoss = 1,
    Stop = 2,
    Overproduction = 3,
    StatusStop = 4,
    IpsActive = 5,
    IceDetected = 6,
}

impl AlarmCode {
    /// Numeric code as written to alarm time-series exports.
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn is_alarm(self) -> bool {
        !matches!(self, Self::None)
    }
}

impl std::fmt::Display for AlarmCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlarmCode::None => write!(f, "None"),
            AlarmCode::PowerLoss => write!(f, "Power Loss"),
            AlarmCode::Stop => write!(f, "Stop"),
            AlarmCode::Overproduction => write!(f, "Overproduction"),
            AlarmCode::StatusStop => write!(f, "Status Stop"),
            AlarmCode::IpsActive => write!(f, "IPS Active"),
            AlarmCode::IceDetected => write!(f, "Ice Detected"),
        }
    }
}

// ============================================================================
// Alarm Records
// ============================================================================

/// Classifier output for a single timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmRecord {
    pub timestamp: NaiveDateTime,
    pub code: AlarmCode,
    pub wind_speed: f64,
    /// Power curve median interpolated at this wind speed/direction
    pub reference_power: f64,
    pub temperature: f64,
    /// Measured power
    pub power: f64,
    /// Interpolated threshold (low band, or high band for overproduction)
    pub limit: f64,
    /// Secondary channel (heating power for IPS records)
    pub secondary: Option<f64>,
}

impl AlarmRecord {
    /// Shortfall between reference and measured power.
    pub fn power_drop(&self) -> f64 {
        self.reference_power - self.power
    }
}

// ============================================================================
// Event Intervals
// ============================================================================

/// A confirmed, contiguous icing event with its integrated energy loss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventInterval {
    pub start: NaiveDateTime,
    pub stop: NaiveDateTime,
    /// Integrated production loss (kWh)
    pub loss: f64,
    pub duration_hours: f64,
    pub mean_power_drop: f64,
    pub mean_power: f64,
    pub mean_reference_power: f64,
    pub mean_wind_speed: f64,
    pub mean_temperature: f64,
    /// Integrated secondary channel (kWh), e.g. IPS heating energy
    pub secondary: Option<f64>,
}
