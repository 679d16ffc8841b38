//! Engine-wide default constants.
//!
//! Fixed numbers used by the analysis stages that are not exposed as site
//! configuration. Grouped by subsystem for easy discovery.

// ============================================================================
// Alarm Classification
// ============================================================================

/// Maximum gap to either neighbour for a sample to count as continuous (seconds).
///
/// Slightly above one 10-minute SCADA interval so jitter does not break runs.
pub const MAX_CONTINUITY_GAP_SECS: i64 = 601;

// ============================================================================
// Production Integration
// ============================================================================

/// Nominal SCADA sampling interval (seconds).
///
/// Production steps spanning a longer gap contribute zero energy.
pub const NOMINAL_SAMPLE_INTERVAL_SECS: i64 = 600;

// ============================================================================
// Power Curve
// ============================================================================

/// Ratio of a direction bin's mean neighbour distance to the median distance
/// above which the bin is treated as an outlier.
pub const DISTANCE_FILTER_RATIO: f64 = 2.5;

/// Lowest representative wind speed included in the uncertainty average (m/s).
pub const UNCERTAINTY_MIN_WIND_SPEED: f64 = 4.0;

/// Highest representative wind speed included in the uncertainty average (m/s).
pub const UNCERTAINTY_MAX_WIND_SPEED: f64 = 15.0;

// ============================================================================
// Air Density Correction
// ============================================================================

/// Standard temperature at sea level (K).
pub const STANDARD_TEMPERATURE_K: f64 = 288.15;

/// Celsius to Kelvin offset.
pub const KELVIN_OFFSET: f64 = 273.15;

/// Barometric pressure lapse coefficient (1/m).
pub const PRESSURE_LAPSE_PER_M: f64 = 2.2557e-5;

/// Barometric formula exponent.
pub const PRESSURE_EXPONENT: f64 = 5.25588;

// ============================================================================
// Ingestion
// ============================================================================

/// Number of row parse failures logged individually before only counting.
pub const MAX_LOGGED_PARSE_ERRORS: usize = 10;

// ============================================================================
// Reports
// ============================================================================

/// Heading column width in the summary report.
pub const SUMMARY_HEADING_WIDTH: usize = 50;

/// Value column width in the summary report.
pub const SUMMARY_VALUE_WIDTH: usize = 20;

/// Field width of power curve table cells.
pub const POWER_CURVE_FIELD_WIDTH: usize = 10;

/// Date-time format used in every exported file.
pub const EXPORT_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
