//! Aggregated statistics: MonthlyStatistic, SummaryStatistics

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Loss for one category within a month.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryLoss {
    /// Lost production (kWh)
    pub loss: f64,
    /// `(theoretical - loss) / theoretical`, zero when nothing was expected
    pub relative: f64,
}

/// Production and loss figures for one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyStatistic {
    pub year: i32,
    pub month: u32,
    /// Production expected from the power curve (kWh)
    pub theoretical: f64,
    /// Measured production (kWh)
    pub actual: f64,
    pub total_loss: f64,
    pub total_loss_relative: f64,
    pub power_loss: CategoryLoss,
    pub stop: CategoryLoss,
    pub status_stop: CategoryLoss,
    pub ips: CategoryLoss,
    pub ice_detection: CategoryLoss,
    /// Power loss + stop + IPS + ice detector (status stops excluded)
    pub total_ice_loss: f64,
    pub total_ice_relative: f64,
    /// Anti-icing heating energy (kWh)
    pub ips_consumption: f64,
}

/// Interpolated power-curve expectation paired with the measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferencePoint {
    pub timestamp: NaiveDateTime,
    pub reference: f64,
    pub measured: f64,
    pub p_low: f64,
    pub p_high: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

/// Row counts after each filtering stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSizes {
    /// Rows as ingested
    pub raw: usize,
    /// Rows after time window and state filter
    pub filtered: usize,
    /// Rows in the power curve reference set
    pub reference: usize,
}

/// Dataset-level figures written to the summary report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStatistics {
    // === Icing losses ===
    pub power_loss: f64,
    pub power_loss_pct: f64,
    pub stop_loss: f64,
    pub stop_loss_pct: f64,
    pub power_loss_hours: f64,
    pub power_loss_hours_pct: f64,
    pub stop_hours: f64,
    pub stop_hours_pct: f64,
    pub overproduction_hours: f64,
    pub overproduction_hours_pct: f64,

    // === Anti-icing and ice detection ===
    pub ips_hours: f64,
    pub ips_hours_pct: f64,
    pub ips_loss: f64,
    pub ips_loss_pct: f64,
    pub ips_self_consumption: f64,
    pub ips_self_consumption_pct: f64,
    pub ice_detection_hours: f64,
    pub ice_detection_hours_pct: f64,
    pub ice_detection_loss: f64,
    pub ice_detection_loss_pct: f64,

    // === Availability ===
    pub status_stop_hours: f64,
    /// Time based availability (%)
    pub tba: f64,
    pub status_stop_loss: f64,
    pub status_stop_loss_pct: f64,

    // === Production ===
    /// Mean power-curve uncertainty over the 4-15 m/s range (%)
    pub power_curve_uncertainty: f64,
    pub production_upper_pct: f64,
    pub production_lower_pct: f64,
    pub production_p90_pct: f64,
    pub production_p10_pct: f64,
    pub theoretical: f64,
    pub actual: f64,
    pub total_losses: f64,
    /// Energy based availability (%)
    pub eba: f64,

    // === Data coverage ===
    pub data_start: Option<NaiveDateTime>,
    pub data_stop: Option<NaiveDateTime>,
    pub period_hours: f64,
    pub reference_start: Option<NaiveDateTime>,
    pub reference_stop: Option<NaiveDateTime>,
    pub reference_period_hours: f64,
    pub availability: f64,
    pub sizes: DataSizes,
    pub filtered_pct: f64,
    pub reference_pct: f64,
}
