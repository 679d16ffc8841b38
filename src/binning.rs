//! Binning Engine - nearest-center assignment for wind speed and direction
//!
//! Speed bins use plain absolute distance. Direction bins compare points on
//! the unit circle so that 359° and 1° land in the same 0° bin.

use serde::{Deserialize, Serialize};

use crate::config::BinningConfig;
use crate::types::Sample;

// ============================================================================
// Assignment
// ============================================================================

/// Index of the smallest value.
///
/// Matches the usual array-library convention: the first NaN is treated as
/// the minimum, so a NaN input value always lands in bin 0.
pub fn argmin<I>(values: I) -> usize
where
    I: IntoIterator<Item = f64>,
{
    let mut best_idx = 0;
    let mut best = f64::INFINITY;
    for (i, v) in values.into_iter().enumerate() {
        if v.is_nan() {
            return i;
        }
        if i == 0 || v < best {
            best = v;
            best_idx = i;
        }
    }
    best_idx
}

/// Nearest bin center for `value`.
///
/// With `circular`, value and centers are in degrees and compared as
/// (cos, sin) points; otherwise the absolute difference is used.
pub fn assign_bin(value: f64, centers: &[f64], circular: bool) -> usize {
    if circular {
        let (vs, vc) = value.to_radians().sin_cos();
        argmin(centers.iter().map(|c| {
            let (cs, cc) = c.to_radians().sin_cos();
            (vc - cc).hypot(vs - cs)
        }))
    } else {
        argmin(centers.iter().map(|c| (value - c).abs()))
    }
}

/// Evenly spaced values in the half-open interval `[start, stop)`.
pub fn arange(start: f64, stop: f64, step: f64) -> Vec<f64> {
    if step <= 0.0 || !(stop > start) {
        return Vec::new();
    }
    let n = ((stop - start) / step).ceil() as usize;
    (0..n).map(|i| start + i as f64 * step).collect()
}

// ============================================================================
// Bin Definition
// ============================================================================

/// Cell position of one sample in the power curve grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BinIndex {
    pub speed: usize,
    pub direction: usize,
}

/// Wind speed and wind direction bin centers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinDefinition {
    pub speed_centers: Vec<f64>,
    pub direction_centers: Vec<f64>,
}

impl BinDefinition {
    pub fn new(speed_centers: Vec<f64>, direction_centers: Vec<f64>) -> Self {
        Self {
            speed_centers,
            direction_centers,
        }
    }

    pub fn from_config(cfg: &BinningConfig) -> Self {
        Self {
            speed_centers: arange(cfg.min_wind_speed, cfg.max_wind_speed, cfg.wind_speed_bin_size),
            direction_centers: arange(0.0, 360.0, cfg.wind_direction_bin_size),
        }
    }

    pub fn speed_bins(&self) -> usize {
        self.speed_centers.len()
    }

    pub fn direction_bins(&self) -> usize {
        self.direction_centers.len()
    }

    pub fn speed_bin(&self, wind_speed: f64) -> usize {
        assign_bin(wind_speed, &self.speed_centers, false)
    }

    pub fn direction_bin(&self, direction: f64) -> usize {
        assign_bin(direction, &self.direction_centers, true)
    }

    /// Bin every sample by direction, then by speed.
    pub fn bin_indices(&self, rows: &[Sample]) -> Vec<BinIndex> {
        rows.iter()
            .map(|s| BinIndex {
                direction: self.direction_bin(s.wind_direction),
                speed: self.speed_bin(s.wind_speed),
            })
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
