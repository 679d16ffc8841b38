//! Power Curve Builder
//!
//! Builds the empirical, direction-resolved power curve from the reference
//! subset of the SCADA data.
//!
//! ## Build stages
//!
//! ```text
//! 1. Bin every reference sample (direction, then speed)
//! 2. Per-cell statistics: median, percentile bands, std-dev, soft bounds
//! 3. Small-bin suppression (population < min_bin_size -> NaN)
//! 4. Gap interpolation along speed, per direction
//! 5. Cross-direction distance filter (power, low band, high band)
//! ```
//!
//! The resulting [`PowerCurveTable`] is immutable input to every later stage.

pub mod distance_filter;
pub mod stats;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::binning::{BinDefinition, BinIndex};
use crate::config::defaults::{UNCERTAINTY_MAX_WIND_SPEED, UNCERTAINTY_MIN_WIND_SPEED};
use crate::config::SiteConfig;
use crate::types::Sample;
use stats::{
    circular_mean_deg, interp, interpolate_gaps, nan_mean, nan_median, nan_std, percentile_linear,
};

// ============================================================================
// Curve Cells
// ============================================================================

/// Power-derived quantity stored in every curve cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurveField {
    Power,
    PLow,
    PHigh,
    StdDev,
    Uncertainty,
    LowerBound,
    UpperBound,
}

impl CurveField {
    /// Every power-derived field, in report order.
    pub const ALL: [CurveField; 7] = [
        CurveField::Power,
        CurveField::PLow,
        CurveField::PHigh,
        CurveField::StdDev,
        CurveField::Uncertainty,
        CurveField::LowerBound,
        CurveField::UpperBound,
    ];
}

/// Statistics of one (speed, direction) bin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveCell {
    /// Representative wind speed (median of members, or bin center)
    pub wind_speed: f64,
    /// Representative direction (circular mean of members, or bin center)
    pub direction: f64,
    /// Median power
    pub power: f64,
    pub p_low: f64,
    pub p_high: f64,
    pub std_dev: f64,
    /// Std-dev relative to the median (%)
    pub uncertainty: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    /// Bin population
    pub count: usize,
}

impl CurveCell {
    /// Cell with no members: bin centers and the given power-derived value.
    pub fn empty(wind_speed: f64, direction: f64, fill: f64) -> Self {
        Self {
            wind_speed,
            direction,
            power: fill,
            p_low: fill,
            p_high: fill,
            std_dev: fill,
            uncertainty: fill,
            lower_bound: fill,
            upper_bound: fill,
            count: 0,
        }
    }

    /// Cell statistics from its members.
    pub fn from_members(
        speeds: &[f64],
        directions: &[f64],
        powers: &[f64],
        low_pct: f64,
        high_pct: f64,
        rated_power: f64,
    ) -> Self {
        let power = nan_median(powers);
        let std_dev = nan_std(powers);
        let uncertainty = if power == 0.0 {
            0.0
        } else {
            std_dev / power * 100.0
        };

        let (lower_bound, upper_bound) = soft_bounds(power, std_dev, rated_power);

        Self {
            wind_speed: nan_median(speeds),
            direction: circular_mean_deg(directions),
            power,
            p_low: percentile_linear(powers, low_pct),
            p_high: percentile_linear(powers, high_pct),
            std_dev,
            uncertainty,
            lower_bound,
            upper_bound,
            count: powers.len(),
        }
    }

    pub fn get(&self, field: CurveField) -> f64 {
        match field {
            CurveField::Power => self.power,
            CurveField::PLow => self.p_low,
            CurveField::PHigh => self.p_high,
            CurveField::StdDev => self.std_dev,
            CurveField::Uncertainty => self.uncertainty,
            CurveField::LowerBound => self.lower_bound,
            CurveField::UpperBound => self.upper_bound,
        }
    }

    pub fn set(&mut self, field: CurveField, value: f64) {
        match field {
            CurveField::Power => self.power = value,
            CurveField::PLow => self.p_low = value,
            CurveField::PHigh => self.p_high = value,
            CurveField::StdDev => self.std_dev = value,
            CurveField::Uncertainty => self.uncertainty = value,
            CurveField::LowerBound => self.lower_bound = value,
            CurveField::UpperBound => self.upper_bound = value,
        }
    }

    /// Reset every power-derived field to NaN, keeping count and position.
    pub fn clear_power_fields(&mut self) {
        for field in CurveField::ALL {
            self.set(field, f64::NAN);
        }
    }
}

/// `median ± std`, lower clamped at zero, upper clamped at rated power
/// unless the median already exceeds it. NaN inputs stay NaN.
fn soft_bounds(median: f64, std_dev: f64, rated_power: f64) -> (f64, f64) {
    let lower = median - std_dev;
    let upper = median + std_dev;
    if lower.is_nan() || upper.is_nan() {
        return (f64::NAN, f64::NAN);
    }
    let upper = if median > rated_power {
        upper
    } else {
        upper.min(rated_power)
    };
    (lower.max(0.0), upper)
}

// ============================================================================
// Power Curve Table
// ============================================================================

/// Speed × direction grid of curve cells, indexed `[speed][direction]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerCurveTable {
    pub bins: BinDefinition,
    pub rated_power: f64,
    cells: Vec<Vec<CurveCell>>,
}

impl PowerCurveTable {
    /// Table from pre-computed cells. `cells` must be `speed_bins × direction_bins`.
    pub fn from_cells(bins: BinDefinition, rated_power: f64, cells: Vec<Vec<CurveCell>>) -> Self {
        Self {
            bins,
            rated_power,
            cells,
        }
    }

    pub fn speed_bins(&self) -> usize {
        self.cells.len()
    }

    pub fn direction_bins(&self) -> usize {
        self.cells.first().map_or(0, Vec::len)
    }

    pub fn cell(&self, speed: usize, direction: usize) -> &CurveCell {
        &self.cells[speed][direction]
    }

    pub(crate) fn cell_mut(&mut self, speed: usize, direction: usize) -> &mut CurveCell {
        &mut self.cells[speed][direction]
    }

    /// All cells of one speed bin.
    pub fn speed_row(&self, speed: usize) -> &[CurveCell] {
        &self.cells[speed]
    }

    /// Values of `field` along speed for one direction bin.
    pub fn column(&self, direction: usize, field: CurveField) -> Vec<f64> {
        self.cells.iter().map(|row| row[direction].get(field)).collect()
    }

    /// Representative wind speeds along speed for one direction bin.
    pub fn column_speeds(&self, direction: usize) -> Vec<f64> {
        self.cells.iter().map(|row| row[direction].wind_speed).collect()
    }

    /// Direction bin nearest to `direction` (circular).
    pub fn direction_index(&self, direction: f64) -> usize {
        self.bins.direction_bin(direction)
    }

    /// Piecewise-linear value of `field` at `wind_speed` within one direction bin.
    pub fn interpolate(&self, wind_speed: f64, direction: usize, field: CurveField) -> f64 {
        interp(
            wind_speed,
            &self.column_speeds(direction),
            &self.column(direction, field),
        )
    }

    /// Interpolated value at a sample's wind speed and direction.
    pub fn lookup(&self, wind_speed: f64, direction: f64, field: CurveField) -> f64 {
        self.interpolate(wind_speed, self.direction_index(direction), field)
    }

    /// Direction-averaged curve: per speed bin, the NaN-ignoring mean of every
    /// field across directions. Counts are summed.
    pub fn mean_curve(&self) -> Vec<CurveCell> {
        self.cells
            .iter()
            .map(|row| {
                let directions: Vec<f64> = row.iter().map(|c| c.direction).collect();
                let mut cell = CurveCell::empty(
                    mean_across(row, |c| c.wind_speed),
                    circular_mean_deg(&directions),
                    f64::NAN,
                );
                for field in CurveField::ALL {
                    cell.set(field, mean_across(row, |c| c.get(field)));
                }
                cell.count = row.iter().map(|c| c.count).sum();
                cell
            })
            .collect()
    }

    /// Mean relative uncertainty (%) of the direction-averaged curve between
    /// `low` and `high` m/s.
    pub fn uncertainty_average(&self, low: f64, high: f64) -> f64 {
        let values: Vec<f64> = self
            .mean_curve()
            .iter()
            .filter(|c| c.wind_speed >= low && c.wind_speed <= high)
            .map(|c| c.uncertainty)
            .collect();
        nan_mean(&values)
    }

    /// Uncertainty average over the standard 4-15 m/s range.
    pub fn typical_uncertainty(&self) -> f64 {
        self.uncertainty_average(UNCERTAINTY_MIN_WIND_SPEED, UNCERTAINTY_MAX_WIND_SPEED)
    }

    /// Number of cells whose median power is still NaN.
    pub fn nan_cells(&self) -> usize {
        self.cells
            .iter()
            .flatten()
            .filter(|c| c.power.is_nan())
            .count()
    }
}

fn mean_across<F>(row: &[CurveCell], value: F) -> f64
where
    F: Fn(&CurveCell) -> f64,
{
    nan_mean(&row.iter().map(value).collect::<Vec<_>>())
}

// ============================================================================
// Builder
// ============================================================================

/// Builder settings, resolved from site configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveSettings {
    pub low_pct: f64,
    pub high_pct: f64,
    pub min_bin_size: usize,
    pub rated_power: f64,
    pub distance_filter: bool,
}

impl CurveSettings {
    pub fn from_config(config: &SiteConfig) -> Self {
        Self {
            low_pct: config.filtering.power_drop_percentile,
            high_pct: config.filtering.overproduction_percentile,
            min_bin_size: config.filtering.min_bin_size,
            rated_power: config.turbine.rated_power,
            distance_filter: config.filtering.distance_filter,
        }
    }
}

impl Default for CurveSettings {
    fn default() -> Self {
        Self {
            low_pct: 10.0,
            high_pct: 90.0,
            min_bin_size: 36,
            rated_power: 1.0,
            distance_filter: true,
        }
    }
}

/// Stateless power curve construction.
pub struct PowerCurveBuilder;

impl PowerCurveBuilder {
    /// Run every build stage over the reference rows.
    pub fn build(rows: &[Sample], bins: &BinDefinition, settings: &CurveSettings) -> PowerCurveTable {
        let mut table = Self::bin_statistics(rows, bins, settings);

        let suppressed = Self::suppress_small_bins(&mut table, settings.min_bin_size);
        let failed = Self::interpolate_gaps(&mut table);

        let mut replaced = 0;
        if settings.distance_filter && table.direction_bins() > 1 {
            for field in [CurveField::Power, CurveField::PLow, CurveField::PHigh] {
                replaced += distance_filter::apply(&mut table, field);
            }
        }

        info!(
            reference_rows = rows.len(),
            speed_bins = table.speed_bins(),
            direction_bins = table.direction_bins(),
            suppressed,
            failed_columns = failed,
            outliers_replaced = replaced,
            "Power curve built"
        );
        table
    }

    /// Stages 1-2: per-cell statistics from binned members.
    pub fn bin_statistics(
        rows: &[Sample],
        bins: &BinDefinition,
        settings: &CurveSettings,
    ) -> PowerCurveTable {
        let n_speed = bins.speed_bins();
        let n_dir = bins.direction_bins();

        let mut members: Vec<Vec<Vec<&Sample>>> = vec![vec![Vec::new(); n_dir]; n_speed];
        if n_speed > 0 && n_dir > 0 {
            for (sample, BinIndex { speed, direction }) in rows.iter().zip(bins.bin_indices(rows)) {
                members[speed][direction].push(sample);
            }
        }

        let cells = members
            .iter()
            .enumerate()
            .map(|(s, row)| {
                row.iter()
                    .enumerate()
                    .map(|(d, group)| {
                        if group.is_empty() {
                            let fill = if s == 0 { 0.0 } else { f64::NAN };
                            return CurveCell::empty(
                                bins.speed_centers[s],
                                bins.direction_centers[d],
                                fill,
                            );
                        }
                        let speeds: Vec<f64> = group.iter().map(|x| x.wind_speed).collect();
                        let dirs: Vec<f64> = group.iter().map(|x| x.wind_direction).collect();
                        let powers: Vec<f64> = group.iter().map(|x| x.power).collect();
                        CurveCell::from_members(
                            &speeds,
                            &dirs,
                            &powers,
                            settings.low_pct,
                            settings.high_pct,
                            settings.rated_power,
                        )
                    })
                    .collect()
            })
            .collect();

        PowerCurveTable::from_cells(bins.clone(), settings.rated_power, cells)
    }

    /// Stage 3: clear power fields of under-populated cells.
    ///
    /// Returns the number of suppressed cells.
    pub fn suppress_small_bins(table: &mut PowerCurveTable, min_bin_size: usize) -> usize {
        let mut suppressed = 0;
        for row in table.cells.iter_mut() {
            for cell in row.iter_mut() {
                if cell.count < min_bin_size {
                    cell.clear_power_fields();
                    suppressed += 1;
                }
            }
        }
        debug!(suppressed, min_bin_size, "Small bins suppressed");
        suppressed
    }

    /// Stage 4: fill NaN cells along speed in every direction column.
    ///
    /// Returns the number of direction columns that could not be interpolated.
    pub fn interpolate_gaps(table: &mut PowerCurveTable) -> usize {
        let mut failed = 0;
        for dir in 0..table.direction_bins() {
            let mut column_failed = false;
            for field in CurveField::ALL {
                let mut values = table.column(dir, field);
                if !values.iter().any(|v| v.is_nan()) {
                    continue;
                }
                if interpolate_gaps(&mut values) {
                    for (s, v) in values.into_iter().enumerate() {
                        table.cells[s][dir].set(field, v);
                    }
                } else {
                    column_failed = true;
                }
            }
            if column_failed {
                warn!(
                    direction_bin = dir,
                    direction = table.bins.direction_centers.get(dir).copied().unwrap_or(f64::NAN),
                    "Power curve interpolation failed: fewer than two valid bins"
                );
                failed += 1;
            }
        }
        failed
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn sample(i: i64, ws: f64, wd: f64, p: f64) -> Sample {
        Sample::new(t0() + Duration::minutes(10 * i), ws, wd, 5.0, p)
    }

    fn settings(min_bin_size: usize) -> CurveSettings {
        CurveSettings {
            low_pct: 10.0,
            high_pct: 90.0,
            min_bin_size,
            rated_power: 100.0,
            distance_filter: true,
        }
    }

    #[test]
    fn test_single_direction_scenario() {
        let bins = BinDefinition::new(vec![0.0, 5.0, 10.0], vec![0.0]);
        let rows: Vec<Sample> = [10.0, 20.0, 30.0, 40.0, 50.0]
            .iter()
            .enumerate()
            .map(|(i, &p)| sample(i as i64, 5.0, 0.0, p))
            .collect();

        let raw = PowerCurveBuilder::bin_statistics(&rows, &bins, &settings(1));
        assert_relative_eq!(raw.cell(1, 0).power, 30.0);
        assert_relative_eq!(raw.cell(0, 0).power, 0.0);
        assert!(raw.cell(2, 0).power.is_nan());
        assert_eq!(raw.cell(1, 0).count, 5);

        let table = PowerCurveBuilder::build(&rows, &bins, &settings(1));
        assert_relative_eq!(table.cell(2, 0).power, 30.0);
        assert_eq!(table.nan_cells(), 0);
    }

    #[test]
    fn test_cell_statistics() {
        let cell = CurveCell::from_members(
            &[5.0, 5.2, 4.8, 5.1, 4.9],
            &[350.0, 10.0, 0.0, 355.0, 5.0],
            &[10.0, 20.0, 30.0, 40.0, 50.0],
            10.0,
            90.0,
            100.0,
        );
        assert_relative_eq!(cell.wind_speed, 5.0);
        assert!(cell.direction < 1e-9 || cell.direction > 359.999);
        assert_relative_eq!(cell.p_low, 14.0);
        assert_relative_eq!(cell.p_high, 46.0);
        let std = 200.0_f64.sqrt();
        assert_relative_eq!(cell.std_dev, std, epsilon = 1e-9);
        assert_relative_eq!(cell.uncertainty, std / 30.0 * 100.0, epsilon = 1e-9);
        assert_relative_eq!(cell.lower_bound, 30.0 - std, epsilon = 1e-9);
        assert_relative_eq!(cell.upper_bound, 30.0 + std, epsilon = 1e-9);
    }

    #[test]
    fn test_upper_bound_clamped_at_rated() {
        let (lo, hi) = soft_bounds(95.0, 10.0, 100.0);
        assert_relative_eq!(lo, 85.0);
        assert_relative_eq!(hi, 100.0);
        // Median above rated keeps the raw upper bound
        let (_, hi) = soft_bounds(105.0, 10.0, 100.0);
        assert_relative_eq!(hi, 115.0);
        let (lo, _) = soft_bounds(2.0, 10.0, 100.0);
        assert_relative_eq!(lo, 0.0);
        let (lo, hi) = soft_bounds(f64::NAN, 1.0, 100.0);
        assert!(lo.is_nan() && hi.is_nan());
    }

    #[test]
    fn test_zero_median_has_zero_uncertainty() {
        let cell = CurveCell::from_members(&[1.0, 1.0], &[0.0, 0.0], &[0.0, 0.0], 10.0, 90.0, 1.0);
        assert_eq!(cell.uncertainty, 0.0);
    }

    #[test]
    fn test_small_bins_suppressed_before_interpolation() {
        let bins = BinDefinition::new(vec![0.0, 5.0, 10.0], vec![0.0]);
        let mut rows: Vec<Sample> = (0..10).map(|i| sample(i, 5.0, 0.0, 40.0)).collect();
        rows.extend((10..13).map(|i| sample(i, 10.0, 0.0, 90.0)));

        let mut table = PowerCurveBuilder::bin_statistics(&rows, &bins, &settings(5));
        let suppressed = PowerCurveBuilder::suppress_small_bins(&mut table, 5);
        assert_eq!(suppressed, 2);
        assert!(table.cell(2, 0).power.is_nan(), "3-member bin must be cleared");
        assert_eq!(table.cell(2, 0).count, 3, "population is kept");
        assert!(table.cell(0, 0).power.is_nan(), "empty speed-zero bin is cleared too");
    }

    #[test]
    fn test_empty_speed_zero_bin_holds_first_valid_value() {
        let bins = BinDefinition::new(vec![0.0, 5.0, 10.0], vec![0.0]);
        let mut rows: Vec<Sample> = (0..40).map(|i| sample(i, 5.0, 0.0, 40.0)).collect();
        rows.extend((40..80).map(|i| sample(i, 10.0, 0.0, 90.0)));

        let mut table = PowerCurveBuilder::bin_statistics(&rows, &bins, &settings(36));
        PowerCurveBuilder::suppress_small_bins(&mut table, 36);
        assert_eq!(table.cell(0, 0).count, 0);
        assert!(table.cell(0, 0).power.is_nan());
        assert!(table.cell(0, 0).p_low.is_nan());

        let table = PowerCurveBuilder::build(&rows, &bins, &settings(36));
        assert_relative_eq!(table.cell(0, 0).power, 40.0);
        assert_relative_eq!(table.lookup(2.5, 0.0, CurveField::Power), 40.0);
        assert_relative_eq!(table.lookup(7.5, 0.0, CurveField::Power), 65.0);
    }

    #[test]
    fn test_interpolation_failure_is_not_fatal() {
        let bins = BinDefinition::new(vec![0.0, 5.0, 10.0], vec![0.0, 180.0]);
        // Direction 180 has no samples; 0° has two populated bins
        let mut rows: Vec<Sample> = (0..5).map(|i| sample(i, 5.0, 0.0, 40.0)).collect();
        rows.extend((5..10).map(|i| sample(i, 10.0, 0.0, 90.0)));
        let mut table = PowerCurveBuilder::bin_statistics(&rows, &bins, &settings(1));
        PowerCurveBuilder::suppress_small_bins(&mut table, 1);

        let failed = PowerCurveBuilder::interpolate_gaps(&mut table);
        assert_eq!(failed, 1);
        assert!(table.cell(1, 1).power.is_nan());
        assert_relative_eq!(table.cell(1, 0).power, 40.0);
    }

    #[test]
    fn test_distance_filter_replaces_outlying_direction() {
        let bins = BinDefinition::new(vec![0.0, 5.0], vec![0.0, 90.0, 180.0, 270.0]);
        let mut rows = Vec::new();
        let mut i = 0;
        for (dir, p) in [(0.0, 50.0), (90.0, 52.0), (180.0, 48.0), (270.0, 95.0)] {
            for _ in 0..4 {
                rows.push(sample(i, 5.0, dir, p));
                i += 1;
            }
        }
        let table = PowerCurveBuilder::build(&rows, &bins, &settings(1));
        assert_relative_eq!(table.cell(1, 3).power, 50.0, epsilon = 1e-9);
        assert_relative_eq!(table.cell(1, 0).power, 50.0);
    }

    #[test]
    fn test_interpolate_lookup() {
        let bins = BinDefinition::new(vec![0.0, 5.0, 10.0], vec![0.0]);
        let mut rows: Vec<Sample> = (0..5).map(|i| sample(i, 5.0, 0.0, 40.0)).collect();
        rows.extend((5..10).map(|i| sample(i, 10.0, 0.0, 90.0)));
        let table = PowerCurveBuilder::build(&rows, &bins, &settings(1));

        assert_relative_eq!(table.lookup(7.5, 123.0, CurveField::Power), 65.0);
        // Below the first populated bin the curve holds its value
        assert_relative_eq!(table.lookup(2.5, 0.0, CurveField::Power), 40.0);
        assert_relative_eq!(table.lookup(30.0, 0.0, CurveField::Power), 90.0);
        assert!(table.lookup(f64::NAN, 0.0, CurveField::Power).is_nan());
    }

    #[test]
    fn test_uncertainty_average_window() {
        let bins = BinDefinition::new(vec![0.0, 5.0, 10.0, 20.0], vec![0.0]);
        let mut rows: Vec<Sample> = Vec::new();
        for (i, p) in [30.0, 50.0].iter().enumerate() {
            rows.push(sample(i as i64, 5.0, 0.0, *p));
        }
        for (i, p) in [80.0, 80.0].iter().enumerate() {
            rows.push(sample(10 + i as i64, 10.0, 0.0, *p));
        }
        let table = PowerCurveBuilder::build(&rows, &bins, &settings(1));
        // 5 m/s: std 10 / median 40 = 25 %, 10 m/s: 0 %; 0 and 20 m/s excluded
        assert_relative_eq!(table.typical_uncertainty(), 12.5);
    }
}
