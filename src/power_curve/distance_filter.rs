//! Cross-direction outlier filter
//!
//! At each speed bin, a direction whose value sits far from every other
//! direction is replaced by the direction-averaged value of the remaining
//! directions.

use tracing::debug;

use super::stats::{nan_mean, nan_median};
use super::{CurveField, PowerCurveTable};
use crate::config::defaults::DISTANCE_FILTER_RATIO;

/// Indices of outlying entries in one speed row across directions.
///
/// Entry `j` is an outlier when its mean absolute distance to all other
/// entries exceeds `DISTANCE_FILTER_RATIO` times the median of those mean
/// distances.
pub fn outlier_directions(row: &[f64]) -> Vec<usize> {
    let distances: Vec<f64> = row
        .iter()
        .enumerate()
        .map(|(j, vj)| {
            let others: Vec<f64> = row
                .iter()
                .enumerate()
                .filter(|&(k, _)| k != j)
                .map(|(_, vk)| (vk - vj).abs())
                .collect();
            nan_mean(&others)
        })
        .collect();

    let median = nan_median(&distances);
    distances
        .iter()
        .enumerate()
        .filter(|&(_, d)| d / median > DISTANCE_FILTER_RATIO)
        .map(|(j, _)| j)
        .collect()
}

/// Replace outlying directions of `field` at every speed bin.
///
/// Returns the number of replaced cells.
pub fn apply(table: &mut PowerCurveTable, field: CurveField) -> usize {
    if table.direction_bins() < 2 {
        return 0;
    }

    let mut replaced = 0;
    for speed in 0..table.speed_bins() {
        let row: Vec<f64> = (0..table.direction_bins())
            .map(|dir| table.cell(speed, dir).get(field))
            .collect();
        let outliers = outlier_directions(&row);
        if outliers.is_empty() {
            continue;
        }

        let kept: Vec<f64> = row
            .iter()
            .enumerate()
            .filter(|(j, _)| !outliers.contains(j))
            .map(|(_, v)| *v)
            .collect();
        let replacement = nan_mean(&kept);

        for &dir in &outliers {
            debug!(
                speed_bin = speed,
                direction_bin = dir,
                field = ?field,
                from = row[dir],
                to = replacement,
                "Replacing direction outlier"
            );
            table.cell_mut(speed, dir).set(field, replacement);
            replaced += 1;
        }
    }
    replaced
}
