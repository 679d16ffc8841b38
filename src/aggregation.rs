//! Aggregator - production integrals, monthly statistics and the dataset summary
//!
//! Production is integrated with the trapezoid rule over consecutive samples.
//! A step contributes nothing when it spans more than one nominal sampling
//! interval or when either endpoint is missing or non-positive.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::defaults::NOMINAL_SAMPLE_INTERVAL_SECS;
use crate::config::TimeWindow;
use crate::power_curve::{CurveField, PowerCurveTable};
use crate::types::{
    AlarmRecord, CategoryLoss, DataSizes, EventInterval, MonthlyStatistic, ReferencePoint, Sample,
    SummaryStatistics,
};

// ============================================================================
// Series
// ============================================================================

/// Curve expectation for every sample.
pub fn reference_series(rows: &[Sample], curve: &PowerCurveTable) -> Vec<ReferencePoint> {
    rows.iter()
        .map(|s| {
            let dir = curve.direction_index(s.wind_direction);
            let at = |field| curve.interpolate(s.wind_speed, dir, field);
            ReferencePoint {
                timestamp: s.timestamp,
                reference: at(CurveField::Power),
                measured: s.power,
                p_low: at(CurveField::PLow),
                p_high: at(CurveField::PHigh),
                lower_bound: at(CurveField::LowerBound),
                upper_bound: at(CurveField::UpperBound),
            }
        })
        .collect()
}

/// Energy (kWh) of each step between consecutive points, attributed to the
/// later timestamp.
pub fn production_steps(series: &[(NaiveDateTime, f64)]) -> Vec<(NaiveDateTime, f64)> {
    series
        .windows(2)
        .map(|pair| {
            let ((t0, v0), (t1, v1)) = (pair[0], pair[1]);
            let gap_ms = (t1 - t0).num_milliseconds();
            let valid = gap_ms <= NOMINAL_SAMPLE_INTERVAL_SECS * 1000 && v0 > 0.0 && v1 > 0.0;
            let energy = if valid {
                gap_ms as f64 / 3_600_000.0 * (v0 + v1) / 2.0
            } else {
                0.0
            };
            (t1, energy)
        })
        .collect()
}

/// Total energy of a series.
pub fn production(series: &[(NaiveDateTime, f64)]) -> f64 {
    production_steps(series).iter().map(|(_, e)| e).sum()
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

fn percent(numerator: f64, denominator: f64) -> f64 {
    ratio(numerator, denominator) * 100.0
}

fn hours(a: NaiveDateTime, b: NaiveDateTime) -> f64 {
    (b - a).num_seconds() as f64 / 3600.0
}

// ============================================================================
// Monthly Statistics
// ============================================================================

/// Classified alarm series per loss category. `None` counts as zero loss.
#[derive(Debug, Clone, Copy, Default)]
pub struct LossCategories<'a> {
    pub power_loss: Option<&'a [AlarmRecord]>,
    pub stop: Option<&'a [AlarmRecord]>,
    pub status_stop: Option<&'a [AlarmRecord]>,
    pub ips: Option<&'a [AlarmRecord]>,
    pub ice_detection: Option<&'a [AlarmRecord]>,
}

type MonthKey = (i32, u32);

fn month_of(t: NaiveDateTime) -> MonthKey {
    (t.year(), t.month())
}

/// Sum steps into the months already present in `totals`.
fn accumulate(totals: &mut BTreeMap<MonthKey, f64>, steps: &[(NaiveDateTime, f64)]) {
    for (t, e) in steps {
        if let Some(total) = totals.get_mut(&month_of(*t)) {
            *total += e;
        }
    }
}

/// Production lost on the flagged records of one category, per month.
fn category_loss(months: &[MonthKey], records: Option<&[AlarmRecord]>) -> BTreeMap<MonthKey, f64> {
    let mut totals: BTreeMap<MonthKey, f64> = months.iter().map(|&m| (m, 0.0)).collect();
    if let Some(records) = records {
        let drops: Vec<(NaiveDateTime, f64)> = records
            .iter()
            .filter(|r| r.code.is_alarm())
            .map(|r| (r.timestamp, r.power_drop()))
            .collect();
        accumulate(&mut totals, &production_steps(&drops));
    }
    totals
}

/// One statistic per calendar month present in `rows`, ascending.
pub fn monthly_statistics(
    rows: &[Sample],
    curve: &PowerCurveTable,
    categories: &LossCategories<'_>,
) -> Vec<MonthlyStatistic> {
    let mut months: Vec<MonthKey> = rows.iter().map(|s| month_of(s.timestamp)).collect();
    months.dedup();
    months.sort_unstable();
    months.dedup();

    let zeroed = || -> BTreeMap<MonthKey, f64> { months.iter().map(|&m| (m, 0.0)).collect() };

    let reference = reference_series(rows, curve);
    let mut theoretical = zeroed();
    let mut actual = zeroed();
    let mut heating = zeroed();
    accumulate(
        &mut theoretical,
        &production_steps(&reference.iter().map(|p| (p.timestamp, p.reference)).collect::<Vec<_>>()),
    );
    accumulate(
        &mut actual,
        &production_steps(&rows.iter().map(|s| (s.timestamp, s.power)).collect::<Vec<_>>()),
    );
    accumulate(
        &mut heating,
        &production_steps(&rows.iter().map(|s| (s.timestamp, s.heating_power)).collect::<Vec<_>>()),
    );

    let power_loss = category_loss(&months, categories.power_loss);
    let stop = category_loss(&months, categories.stop);
    let status_stop = category_loss(&months, categories.status_stop);
    let ips = category_loss(&months, categories.ips);
    let ice = category_loss(&months, categories.ice_detection);

    let stats: Vec<MonthlyStatistic> = months
        .iter()
        .map(|m| {
            let theo = theoretical[m];
            let act = actual[m];
            let category = |totals: &BTreeMap<MonthKey, f64>| {
                let loss = totals[m];
                CategoryLoss {
                    loss,
                    relative: ratio(theo - loss, theo),
                }
            };
            let total_ice_loss = power_loss[m] + stop[m] + ips[m] + ice[m];
            let total_loss = theo - act;
            MonthlyStatistic {
                year: m.0,
                month: m.1,
                theoretical: theo,
                actual: act,
                total_loss,
                total_loss_relative: ratio(theo - total_loss, theo),
                power_loss: category(&power_loss),
                stop: category(&stop),
                status_stop: category(&status_stop),
                ips: category(&ips),
                ice_detection: category(&ice),
                total_ice_loss,
                total_ice_relative: ratio(theo - total_ice_loss, theo),
                ips_consumption: heating[m],
            }
        })
        .collect();

    debug!(months = stats.len(), "Monthly statistics");
    stats
}

// ============================================================================
// Summary Statistics
// ============================================================================

/// Extracted events per category; absent categories stay empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryEvents {
    pub power_loss: Vec<EventInterval>,
    pub stop: Vec<EventInterval>,
    pub overproduction: Vec<EventInterval>,
    pub status_stop: Vec<EventInterval>,
    pub ips: Vec<EventInterval>,
    pub ice_detection: Vec<EventInterval>,
}

fn total_loss(events: &[EventInterval]) -> f64 {
    events.iter().map(|e| e.loss).sum()
}

fn total_hours(events: &[EventInterval]) -> f64 {
    events.iter().map(|e| e.duration_hours).sum()
}

/// Inputs of [`summary_statistics`].
#[derive(Debug, Clone, Copy)]
pub struct SummaryInputs<'a> {
    /// Time-limited, density-corrected rows
    pub rows: &'a [Sample],
    /// Power curve reference rows
    pub reference_rows: &'a [Sample],
    pub curve: &'a PowerCurveTable,
    pub events: &'a CategoryEvents,
    pub sizes: DataSizes,
    pub window: TimeWindow,
}

/// Dataset-level loss, availability and coverage figures.
pub fn summary_statistics(inputs: &SummaryInputs<'_>) -> SummaryStatistics {
    let SummaryInputs {
        rows,
        reference_rows,
        curve,
        events,
        sizes,
        window,
    } = *inputs;

    let reference = reference_series(rows, curve);
    let integral = |f: fn(&ReferencePoint) -> f64| {
        production(&reference.iter().map(|p| (p.timestamp, f(p))).collect::<Vec<_>>())
    };
    let theoretical = integral(|p| p.reference);
    let actual = integral(|p| p.measured);
    let lower = integral(|p| p.lower_bound);
    let upper = integral(|p| p.upper_bound);
    let p_low = integral(|p| p.p_low);
    let p_high = integral(|p| p.p_high);

    let data_start = window.start.or_else(|| rows.first().map(|s| s.timestamp));
    let data_stop = window.stop.or_else(|| rows.last().map(|s| s.timestamp));
    let period_hours = match (data_start, data_stop) {
        (Some(a), Some(b)) => hours(a, b),
        _ => 0.0,
    };

    let reference_start = reference_rows.first().map(|s| s.timestamp);
    let reference_stop = reference_rows.last().map(|s| s.timestamp);
    let reference_period_hours = match (reference_start, reference_stop) {
        (Some(a), Some(b)) => hours(a, b),
        _ => 0.0,
    };

    let step_hours = match rows {
        [a, b, ..] => hours(a.timestamp, b.timestamp),
        _ => 0.0,
    };
    let expected_samples = ratio(period_hours, step_hours);
    let availability = percent(sizes.raw as f64, expected_samples);

    let power_loss = total_loss(&events.power_loss);
    let stop_loss = total_loss(&events.stop);
    let status_stop_loss = total_loss(&events.status_stop);
    let ips_loss = total_loss(&events.ips);
    let ice_detection_loss = total_loss(&events.ice_detection);
    let ips_self_consumption: f64 = events.ips.iter().filter_map(|e| e.secondary).sum();

    let power_loss_hours = total_hours(&events.power_loss);
    let stop_hours = total_hours(&events.stop);
    let overproduction_hours = total_hours(&events.overproduction);
    let status_stop_hours = total_hours(&events.status_stop);
    let ips_hours = total_hours(&events.ips);
    let ice_detection_hours = total_hours(&events.ice_detection);

    let total_losses = theoretical - actual;
    let eba = if theoretical == 0.0 {
        0.0
    } else {
        100.0 - percent(total_losses, theoretical)
    };

    SummaryStatistics {
        power_loss,
        power_loss_pct: percent(power_loss, actual),
        stop_loss,
        stop_loss_pct: percent(stop_loss, actual),
        power_loss_hours,
        power_loss_hours_pct: percent(power_loss_hours, period_hours),
        stop_hours,
        stop_hours_pct: percent(stop_hours, period_hours),
        overproduction_hours,
        overproduction_hours_pct: percent(overproduction_hours, period_hours),

        ips_hours,
        ips_hours_pct: percent(ips_hours, period_hours),
        ips_loss,
        ips_loss_pct: percent(ips_loss, actual),
        ips_self_consumption,
        ips_self_consumption_pct: percent(ips_self_consumption, actual),
        ice_detection_hours,
        ice_detection_hours_pct: percent(ice_detection_hours, period_hours),
        ice_detection_loss,
        ice_detection_loss_pct: percent(ice_detection_loss, actual),

        status_stop_hours,
        tba: percent(period_hours - status_stop_hours, period_hours),
        status_stop_loss,
        status_stop_loss_pct: percent(status_stop_loss, actual),

        power_curve_uncertainty: curve.typical_uncertainty(),
        production_upper_pct: percent(upper, theoretical),
        production_lower_pct: percent(lower, theoretical),
        production_p90_pct: percent(p_high, theoretical),
        production_p10_pct: percent(p_low, theoretical),
        theoretical,
        actual,
        total_losses,
        eba,

        data_start,
        data_stop,
        period_hours,
        reference_start,
        reference_stop,
        reference_period_hours,
        availability,
        sizes,
        filtered_pct: percent(sizes.filtered as f64, sizes.raw as f64),
        reference_pct: percent(sizes.reference as f64, sizes.raw as f64),
    }
}

// ============================================================================
// Tests
// ============================================================================
