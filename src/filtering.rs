//! Row filters and the air density correction
//!
//! Every filter is a pure selection over a [`SampleMatrix`] and returns a new
//! matrix with order preserved. The pipeline composes them in a fixed order.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::defaults::{
    KELVIN_OFFSET, PRESSURE_EXPONENT, PRESSURE_LAPSE_PER_M, STANDARD_TEMPERATURE_K,
};
use crate::config::TimeWindow;
use crate::types::{Sample, SampleMatrix};

// ============================================================================
// State Filter
// ============================================================================

/// How turbine state values are compared against their normal values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateFilter {
    /// Every state column equals its normal value
    Inclusive,
    /// At least one state column differs from its normal value
    Exclusive,
    /// Every state column is at or above its normal value
    AtLeast,
    /// Every state column is at or below its normal value
    AtMost,
}

impl StateFilter {
    /// Map the numeric config selector; unknown values fall back to inclusive.
    pub fn from_type(filter_type: u8) -> Self {
        match filter_type {
            2 => Self::Exclusive,
            3 => Self::AtLeast,
            4 => Self::AtMost,
            _ => Self::Inclusive,
        }
    }

    /// Whether a sample's state values pass. NaN never compares true.
    pub fn accepts(self, state: &[f64], normal: &[f64]) -> bool {
        let all = |cmp: fn(f64, f64) -> bool| state.iter().zip(normal).all(|(&s, &n)| cmp(s, n));
        match self {
            Self::Inclusive => all(|s, n| s == n),
            Self::Exclusive => !all(|s, n| s == n),
            Self::AtLeast => all(|s, n| s >= n),
            Self::AtMost => all(|s, n| s <= n),
        }
    }
}

/// Keep samples whose state columns pass `filter` against `normal`.
pub fn state_filter(matrix: &SampleMatrix, normal: &[f64], filter: StateFilter) -> SampleMatrix {
    let out = matrix.select(|s| filter.accepts(&s.state, normal));
    debug!(before = matrix.len(), after = out.len(), ?filter, "State filter");
    out
}

// ============================================================================
// Threshold Filters
// ============================================================================

/// Keep samples at or above `min_temperature` (°C).
pub fn temperature_filter(matrix: &SampleMatrix, min_temperature: f64) -> SampleMatrix {
    let out = matrix.select(|s| s.temperature >= min_temperature);
    debug!(before = matrix.len(), after = out.len(), min_temperature, "Temperature filter");
    out
}

/// Keep samples producing at least `fraction × rated_power`.
pub fn power_level_filter(matrix: &SampleMatrix, fraction: f64, rated_power: f64) -> SampleMatrix {
    let limit = fraction * rated_power;
    let out = matrix.select(|s| s.power >= limit);
    debug!(before = matrix.len(), after = out.len(), limit, "Power level filter");
    out
}

/// Keep samples inside the half-open window.
pub fn time_filter(matrix: &SampleMatrix, window: &TimeWindow) -> SampleMatrix {
    if window.start.is_none() && window.stop.is_none() {
        return matrix.clone();
    }
    let out = matrix.select(|s| window.contains(s.timestamp));
    debug!(before = matrix.len(), after = out.len(), "Time window filter");
    out
}

// ============================================================================
// Air Density Correction
// ============================================================================

/// Density ratio relative to standard conditions at `elevation` (m) and
/// `temperature` (°C).
pub fn density_ratio(temperature: f64, elevation: f64) -> f64 {
    (STANDARD_TEMPERATURE_K / (temperature + KELVIN_OFFSET))
        * (1.0 - elevation * PRESSURE_LAPSE_PER_M).powf(PRESSURE_EXPONENT)
}

/// Wind speed normalised to standard air density.
pub fn corrected_wind_speed(wind_speed: f64, temperature: f64, elevation: f64) -> f64 {
    let c = density_ratio(temperature, elevation);
    if c.is_nan() {
        return f64::NAN;
    }
    wind_speed * c.signum() * c.abs().cbrt()
}

/// Apply [`corrected_wind_speed`] to every sample.
pub fn air_density_correction(matrix: &SampleMatrix, elevation: f64) -> SampleMatrix {
    let rows = matrix
        .rows
        .iter()
        .map(|s| Sample {
            wind_speed: corrected_wind_speed(s.wind_speed, s.temperature, elevation),
            ..s.clone()
        })
        .collect();
    SampleMatrix::new(matrix.headers.clone(), rows)
}

// ============================================================================
// Tests
// ============================================================================
