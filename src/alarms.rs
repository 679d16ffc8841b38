//! Alarm Classifier - per-timestamp icing labels
//!
//! Compares every sample against the power curve (or against SCADA status
//! codes) and emits one [`AlarmRecord`] per input row. Power-based labels
//! need temporal continuity and must persist for a minimum number of
//! consecutive samples before they are confirmed.
//!
//! ## Label sources
//!
//! - **Power**: measured power at or below the low band (power loss) or at
//!   or above the high band (overproduction) while cold
//! - **Stops**: power losses that drop to standstill while the curve still
//!   expects production
//! - **Status**: status-code stops, anti-icing system activity and ice
//!   detector alarms

use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::defaults::MAX_CONTINUITY_GAP_SECS;
use crate::config::SiteConfig;
use crate::power_curve::{CurveField, PowerCurveTable};
use crate::types::{AlarmCode, AlarmRecord, Sample};

// ============================================================================
// Status Modes
// ============================================================================

/// How status column values are matched against a code set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusMatching {
    /// Flag when any column value is in the set
    Inclusive,
    /// Flag when any column value is outside the set
    Exclusive,
    /// Never flag
    Disabled,
}

impl StatusMatching {
    /// 1 = inclusive, 2 = exclusive, anything else disables matching.
    pub fn from_type(matching_type: u8) -> Self {
        match matching_type {
            1 => Self::Inclusive,
            2 => Self::Exclusive,
            _ => Self::Disabled,
        }
    }

    pub fn matches(self, values: &[f64], codes: &[f64]) -> bool {
        let in_set = |v: &f64| codes.contains(v);
        match self {
            Self::Inclusive => values.iter().any(in_set),
            Self::Exclusive => values.iter().any(|v| !in_set(v)),
            Self::Disabled => false,
        }
    }
}

/// Status-driven classification mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StatusMode {
    /// Status-code stops from the status columns
    Stop {
        codes: Vec<f64>,
        matching: StatusMatching,
    },
    /// Anti-icing system running, from the IPS status columns
    Ips {
        codes: Vec<f64>,
        matching: StatusMatching,
    },
    /// Ice detector alarm value
    IceDetected { code: f64 },
}

impl StatusMode {
    fn alarm_code(&self) -> AlarmCode {
        match self {
            Self::Stop { .. } => AlarmCode::StatusStop,
            Self::Ips { .. } => AlarmCode::IpsActive,
            Self::IceDetected { .. } => AlarmCode::IceDetected,
        }
    }

    fn flags(&self, sample: &Sample) -> bool {
        match self {
            Self::Stop { codes, matching } => matching.matches(&sample.status, codes),
            Self::Ips { codes, matching } => matching.matches(&sample.ips_status, codes),
            Self::IceDetected { code } => sample.ice_alarm == *code,
        }
    }
}

// ============================================================================
// Classifier
// ============================================================================

/// Labels samples against a finished power curve.
pub struct AlarmClassifier<'a> {
    curve: &'a PowerCurveTable,
    icing_temperature: f64,
    rated_power: f64,
}

impl<'a> AlarmClassifier<'a> {
    pub fn new(curve: &'a PowerCurveTable, icing_temperature: f64, rated_power: f64) -> Self {
        Self {
            curve,
            icing_temperature,
            rated_power,
        }
    }

    pub fn from_config(curve: &'a PowerCurveTable, config: &SiteConfig) -> Self {
        Self::new(
            curve,
            config.filtering.icing_temperature,
            config.turbine.rated_power,
        )
    }

    /// Power loss (or overproduction with `over`) labels, confirmed over
    /// `confirm_window` consecutive samples. A zero window skips confirmation.
    pub fn classify_power(&self, rows: &[Sample], confirm_window: usize, over: bool) -> Vec<AlarmRecord> {
        let mut records = self.classify_power_unconfirmed(rows, over);
        let cleared = confirm_runs(&mut records, confirm_window);
        debug!(
            rows = rows.len(),
            flagged = count_flagged(&records),
            cleared,
            over,
            "Power classification"
        );
        records
    }

    pub(crate) fn classify_power_unconfirmed(&self, rows: &[Sample], over: bool) -> Vec<AlarmRecord> {
        let limit_field = if over { CurveField::PHigh } else { CurveField::PLow };
        rows.iter()
            .enumerate()
            .map(|(i, s)| {
                let mut record = self.record(s, limit_field);
                if is_continuous(rows, i) && s.temperature <= self.icing_temperature {
                    if over && s.power >= record.limit {
                        record.code = AlarmCode::Overproduction;
                    } else if !over && s.power <= record.limit {
                        record.code = AlarmCode::PowerLoss;
                    }
                }
                record
            })
            .collect()
    }

    /// Stops: unconfirmed power losses at standstill that are followed,
    /// within `lookahead_window` samples, by a sample below the stop
    /// threshold while the curve still expects at least the threshold.
    pub fn classify_stops(&self, rows: &[Sample], lookahead_window: usize, stop_level: f64) -> Vec<AlarmRecord> {
        let threshold = stop_level * self.rated_power;
        let losses = self.classify_power_unconfirmed(rows, false);

        let mut records: Vec<AlarmRecord> = losses
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let mut record = r.clone();
                record.code = AlarmCode::None;
                if r.code == AlarmCode::PowerLoss && r.power <= threshold {
                    let end = (i + lookahead_window).min(losses.len());
                    let stopping = losses[i..end]
                        .iter()
                        .any(|n| n.power < threshold && n.reference_power >= threshold);
                    if stopping {
                        record.code = AlarmCode::Stop;
                    }
                }
                record
            })
            .collect();

        let cleared = confirm_runs(&mut records, lookahead_window);
        debug!(
            rows = rows.len(),
            flagged = count_flagged(&records),
            cleared,
            threshold,
            "Stop classification"
        );
        records
    }

    /// Status-code labels. No continuity check and no run confirmation.
    pub fn classify_by_status(&self, rows: &[Sample], mode: &StatusMode) -> Vec<AlarmRecord> {
        let code = mode.alarm_code();
        let records: Vec<AlarmRecord> = rows
            .iter()
            .map(|s| {
                let mut record = self.record(s, CurveField::PLow);
                if mode.flags(s) {
                    record.code = code;
                }
                if matches!(mode, StatusMode::Ips { .. }) {
                    record.secondary = Some(if s.heating_power.is_nan() {
                        0.0
                    } else {
                        s.heating_power
                    });
                }
                record
            })
            .collect();
        debug!(rows = rows.len(), flagged = count_flagged(&records), %code, "Status classification");
        records
    }

    fn record(&self, s: &Sample, limit_field: CurveField) -> AlarmRecord {
        let dir = self.curve.direction_index(s.wind_direction);
        AlarmRecord {
            timestamp: s.timestamp,
            code: AlarmCode::None,
            wind_speed: s.wind_speed,
            reference_power: self.curve.interpolate(s.wind_speed, dir, CurveField::Power),
            temperature: s.temperature,
            power: s.power,
            limit: self.curve.interpolate(s.wind_speed, dir, limit_field),
            secondary: None,
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Both neighbours exist and lie within the continuity gap.
pub fn is_continuous(rows: &[Sample], i: usize) -> bool {
    if i == 0 || i + 1 >= rows.len() {
        return false;
    }
    let before = (rows[i].timestamp - rows[i - 1].timestamp).num_seconds();
    let after = (rows[i + 1].timestamp - rows[i].timestamp).num_seconds();
    before < MAX_CONTINUITY_GAP_SECS && after < MAX_CONTINUITY_GAP_SECS
}

/// Reset every run of labelled records shorter than `window` to `None`.
///
/// Returns the number of cleared records. A zero window keeps everything.
pub fn confirm_runs(records: &mut [AlarmRecord], window: usize) -> usize {
    let mut cleared = 0;
    let mut i = 0;
    while i < records.len() {
        if !records[i].code.is_alarm() {
            i += 1;
            continue;
        }
        let start = i;
        while i < records.len() && records[i].code.is_alarm() {
            i += 1;
        }
        if i - start < window {
            for r in &mut records[start..i] {
                r.code = AlarmCode::None;
            }
            cleared += i - start;
        }
    }
    cleared
}

fn count_flagged(records: &[AlarmRecord]) -> usize {
    records.iter().filter(|r| r.code.is_alarm()).count()
}

/// Merge stop, power-loss and overproduction labels into one series.
///
/// The stop series is the base when present, otherwise the power-loss
/// series. Unlabelled base records take the power-loss label at the same
/// timestamp, then the overproduction label.
pub fn combine_alarm_series(
    power_loss: &[AlarmRecord],
    stops: Option<&[AlarmRecord]>,
    overproduction: Option<&[AlarmRecord]>,
) -> Vec<AlarmRecord> {
    let index = |records: &[AlarmRecord]| -> HashMap<NaiveDateTime, AlarmCode> {
        records
            .iter()
            .filter(|r| r.code.is_alarm())
            .map(|r| (r.timestamp, r.code))
            .collect()
    };
    let over = overproduction.map(index).unwrap_or_default();

    let (base, loss) = match stops {
        Some(stops) => (stops, index(power_loss)),
        None => (power_loss, HashMap::new()),
    };

    base.iter()
        .map(|r| {
            let mut record = r.clone();
            if !record.code.is_alarm() {
                if let Some(&code) = loss.get(&r.timestamp).or_else(|| over.get(&r.timestamp)) {
                    record.code = code;
                }
            }
            record
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
