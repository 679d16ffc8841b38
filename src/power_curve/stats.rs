//! NaN-aware estimators used by the power curve builder
//!
//! Every helper ignores NaN inputs and returns NaN when no finite value is
//! left. Moments go through statrs; percentiles and the median use linear
//! interpolation between closest ranks.

use statrs::statistics::Statistics;

fn finite(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| !v.is_nan()).collect()
}

/// Median ignoring NaN (mean of the two middle values for even counts).
pub fn nan_median(values: &[f64]) -> f64 {
    percentile_linear(values, 50.0)
}

/// Arithmetic mean ignoring NaN.
pub fn nan_mean(values: &[f64]) -> f64 {
    let valid = finite(values);
    if valid.is_empty() {
        return f64::NAN;
    }
    valid.iter().mean()
}

/// Population standard deviation ignoring NaN.
pub fn nan_std(values: &[f64]) -> f64 {
    let valid = finite(values);
    if valid.is_empty() {
        return f64::NAN;
    }
    valid.iter().population_std_dev()
}

/// Percentile (0-100) with linear interpolation between closest ranks.
pub fn percentile_linear(values: &[f64], pct: f64) -> f64 {
    let mut valid = finite(values);
    if valid.is_empty() || pct.is_nan() {
        return f64::NAN;
    }
    valid.sort_by(f64::total_cmp);

    let pos = (pct.clamp(0.0, 100.0) / 100.0) * (valid.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    valid[lo] + (valid[hi] - valid[lo]) * frac
}

/// Circular mean of angles in degrees, normalised into `[0, 360)`.
pub fn circular_mean_deg(degrees: &[f64]) -> f64 {
    let valid = finite(degrees);
    if valid.is_empty() {
        return f64::NAN;
    }
    let n = valid.len() as f64;
    let (sin_sum, cos_sum) = valid.iter().fold((0.0, 0.0), |(s, c), d| {
        let (ds, dc) = d.to_radians().sin_cos();
        (s + ds, c + dc)
    });
    let mean = (sin_sum / n).atan2(cos_sum / n).to_degrees();
    (mean + 360.0) % 360.0
}

/// Fill NaN entries by linear interpolation over index position.
///
/// Leading and trailing gaps are held at the nearest valid value. Returns
/// `false` and leaves `values` untouched when fewer than two entries are valid.
pub fn interpolate_gaps(values: &mut [f64]) -> bool {
    let valid: Vec<usize> = (0..values.len()).filter(|&i| !values[i].is_nan()).collect();
    if valid.len() < 2 {
        return false;
    }

    let first = valid[0];
    let last = valid[valid.len() - 1];
    let (head, tail) = (values[first], values[last]);
    values[..first].fill(head);
    values[last + 1..].fill(tail);

    for pair in valid.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let (va, vb) = (values[a], values[b]);
        let span = (b - a) as f64;
        for i in a + 1..b {
            values[i] = va + (vb - va) * (i - a) as f64 / span;
        }
    }
    true
}

/// Piecewise-linear interpolation of `x` over ascending breakpoints.
///
/// Breakpoints whose `xp` is NaN are skipped. Outside the range the first or
/// last `fp` is returned. A NaN `x` gives NaN.
pub fn interp(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }
    let points: Vec<(f64, f64)> = xp
        .iter()
        .zip(fp)
        .filter(|(px, _)| !px.is_nan())
        .map(|(&px, &pf)| (px, pf))
        .collect();

    let (Some(&(x0, f0)), Some(&(xn, fn_))) = (points.first(), points.last()) else {
        return f64::NAN;
    };
    if x <= x0 {
        return f0;
    }
    if x >= xn {
        return fn_;
    }

    // First breakpoint strictly above x; guaranteed to exist and be > 0
    let hi = points.partition_point(|&(px, _)| px <= x);
    let (xa, fa) = points[hi - 1];
    let (xb, fb) = points[hi];
    if xb == xa {
        return fb;
    }
    fa + (fb - fa) * (x - xa) / (xb - xa)
}
