//! Dataset Coordinator - the per-dataset analysis sequence
//!
//! ```text
//! STAGE 1: Air density correction (all rows)
//! STAGE 2: Time window
//! STAGE 3: State filter
//! STAGE 4: Power level filter (analysed set)
//! STAGE 5: Reference set (state, temperature, power level on the full range)
//! STAGE 6: Power curve
//! STAGE 7: Stop classification (power based and/or status codes)
//! STAGE 8: Power loss classification
//! STAGE 9: IPS and ice detector classification (when configured)
//! STAGE 10: Overproduction classification
//! STAGE 11: Event extraction
//! STAGE 12: Monthly and summary statistics
//! ```
//!
//! The sequence is single-threaded and deterministic; parallelism happens
//! across datasets, never inside one.

use tracing::{debug, info, warn};

use crate::aggregation::{
    monthly_statistics, summary_statistics, CategoryEvents, LossCategories, SummaryInputs,
};
use crate::alarms::{combine_alarm_series, AlarmClassifier, StatusMatching, StatusMode};
use crate::binning::BinDefinition;
use crate::config::{ConfigError, ResolvedCodes, SiteConfig};
use crate::events::extract_events;
use crate::filtering::{
    air_density_correction, power_level_filter, state_filter, temperature_filter, time_filter,
    StateFilter,
};
use crate::power_curve::{CurveSettings, PowerCurveBuilder, PowerCurveTable};
use crate::types::{AlarmRecord, DataSizes, MonthlyStatistic, SampleMatrix, SummaryStatistics};

/// Everything one dataset run produces.
#[derive(Debug, Clone)]
pub struct DatasetReport {
    pub id: String,
    /// Density-corrected rows inside the time window
    pub time_limited: SampleMatrix,
    pub curve: PowerCurveTable,
    pub power_loss: Vec<AlarmRecord>,
    pub stops: Option<Vec<AlarmRecord>>,
    pub overproduction: Vec<AlarmRecord>,
    pub status_stops: Option<Vec<AlarmRecord>>,
    pub ips: Option<Vec<AlarmRecord>>,
    pub ice_detection: Option<Vec<AlarmRecord>>,
    pub events: CategoryEvents,
    pub monthly: Vec<MonthlyStatistic>,
    pub summary: SummaryStatistics,
    pub sizes: DataSizes,
}

impl DatasetReport {
    /// Stops, power losses and overproduction merged into one labelled series.
    pub fn combined_alarms(&self) -> Vec<AlarmRecord> {
        combine_alarm_series(
            &self.power_loss,
            self.stops.as_deref(),
            Some(&self.overproduction),
        )
    }
}

/// Run the full analysis on one ingested dataset.
///
/// `codes` are the configured status codes resolved against the dataset's
/// fault-code registry.
pub fn run_dataset(
    config: &SiteConfig,
    matrix: &SampleMatrix,
    codes: &ResolvedCodes,
) -> Result<DatasetReport, ConfigError> {
    let id = config.source.id.clone();
    let f = &config.filtering;
    let rated = config.turbine.rated_power;
    let window = config.time_window()?;
    let state_mode = StateFilter::from_type(f.state_filter_type);

    // Stages 1-5: filtering
    let corrected = air_density_correction(matrix, config.turbine.site_elevation);
    let time_limited = time_filter(&corrected, &window);
    let state_filtered = state_filter(&time_limited, &codes.normal_state, state_mode);
    let power_level_filtered = power_level_filter(&state_filtered, f.power_level_filter, rated);
    let reference = power_level_filter(
        &temperature_filter(
            &state_filter(&corrected, &codes.normal_state, state_mode),
            f.reference_temperature,
        ),
        f.power_level_filter,
        rated,
    );
    debug!(
        dataset = %id,
        raw = matrix.len(),
        time_limited = time_limited.len(),
        state_filtered = state_filtered.len(),
        power_level_filtered = power_level_filtered.len(),
        reference = reference.len(),
        "Filtering complete"
    );
    if reference.is_empty() {
        warn!(dataset = %id, "Reference set is empty, power curve will be undefined");
    }

    // Stage 6: power curve
    let bins = BinDefinition::from_config(&config.binning);
    let curve = PowerCurveBuilder::build(&reference.rows, &bins, &CurveSettings::from_config(config));
    let classifier = AlarmClassifier::from_config(&curve, config);

    // Stage 7: stops
    let power_stops = || {
        classifier.classify_stops(&state_filtered.rows, f.stop_window, f.stop_limit_multiplier)
    };
    let (stops, status_stops) = match f.stop_filter_type {
        0 => (Some(power_stops()), None),
        t @ (1 | 2) => {
            let mode = StatusMode::Stop {
                codes: codes.status_stop.clone(),
                matching: StatusMatching::from_type(t),
            };
            (
                Some(power_stops()),
                Some(classifier.classify_by_status(&time_limited.rows, &mode)),
            )
        }
        _ => (None, None),
    };

    // Stages 8-10: power based and status based labels
    let power_loss = classifier.classify_power(&power_level_filtered.rows, f.icing_window, false);
    let ips = config.icing.as_ref().filter(|i| i.heating).map(|icing| {
        let mode = StatusMode::Ips {
            codes: codes.ips_status.clone(),
            matching: StatusMatching::from_type(icing.ips_status_type),
        };
        classifier.classify_by_status(&time_limited.rows, &mode)
    });
    let ice_detection = config.ice_detection().then(|| {
        classifier.classify_by_status(
            &time_limited.rows,
            &StatusMode::IceDetected {
                code: codes.ice_alarm,
            },
        )
    });
    let overproduction = classifier.classify_power(&power_level_filtered.rows, f.icing_window, true);

    // Stage 11: events
    let events_of = |records: Option<&[AlarmRecord]>, secondary: bool| {
        records.map(|r| extract_events(r, secondary)).unwrap_or_default()
    };
    let events = CategoryEvents {
        power_loss: extract_events(&power_loss, false),
        stop: events_of(stops.as_deref(), false),
        overproduction: extract_events(&overproduction, false),
        status_stop: events_of(status_stops.as_deref(), false),
        ips: events_of(ips.as_deref(), true),
        ice_detection: events_of(ice_detection.as_deref(), false),
    };

    // Stage 12: statistics
    let monthly = monthly_statistics(
        &time_limited.rows,
        &curve,
        &LossCategories {
            power_loss: Some(&power_loss),
            stop: stops.as_deref(),
            status_stop: status_stops.as_deref(),
            ips: ips.as_deref(),
            ice_detection: ice_detection.as_deref(),
        },
    );
    let sizes = DataSizes {
        raw: matrix.len(),
        filtered: state_filtered.len(),
        reference: reference.len(),
    };
    let summary = summary_statistics(&SummaryInputs {
        rows: &time_limited.rows,
        reference_rows: &reference.rows,
        curve: &curve,
        events: &events,
        sizes,
        window,
    });

    info!(
        dataset = %id,
        power_loss_events = events.power_loss.len(),
        stop_events = events.stop.len(),
        power_loss_kwh = summary.power_loss,
        stop_loss_kwh = summary.stop_loss,
        eba = summary.eba,
        "Dataset analysed"
    );

    Ok(DatasetReport {
        id,
        time_limited,
        curve,
        power_loss,
        stops,
        overproduction,
        status_stops,
        ips,
        ice_detection,
        events,
        monthly,
        summary,
        sizes,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IcingConfig;
    use crate::ingest::FaultCodeRegistry;
    use crate::types::{AlarmCode, Sample};
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    /// Ten days of 10-minute data at 15 °C with a linear-ish curve, then a
    /// cold two-hour spell where power collapses to a tenth.
    fn dataset() -> SampleMatrix {
        let mut rows = Vec::new();
        for i in 0..1440 {
            let ws = 3.0 + f64::from(i % 10);
            let power = 0.1 * ws;
            rows.push(
                Sample::new(t0() + Duration::minutes(10 * i64::from(i)), ws, 180.0, 15.0, power)
                    .with_state(vec![0.0]),
            );
        }
        let cold_start = 1440;
        for k in 0..12 {
            let ws = 8.0;
            rows.push(
                Sample::new(
                    t0() + Duration::minutes(10 * i64::from(cold_start + k)),
                    ws,
                    180.0,
                    -5.0,
                    0.1 * ws * 0.1,
                )
                .with_state(vec![0.0]),
            );
        }
        rows.push(
            Sample::new(t0() + Duration::minutes(10 * i64::from(cold_start + 12)), 8.0, 180.0, 15.0, 0.8)
                .with_state(vec![0.0]),
        );
        SampleMatrix::from_rows(rows)
    }

    fn config() -> SiteConfig {
        let mut config = SiteConfig::default();
        config.source.id = "unit".into();
        config.filtering.min_bin_size = 10;
        config
    }

    fn resolved(config: &SiteConfig) -> ResolvedCodes {
        config.resolve_codes(&mut FaultCodeRegistry::default())
    }

    #[test]
    fn test_cold_spell_yields_one_power_loss_event() {
        let config = config();
        let report = run_dataset(&config, &dataset(), &resolved(&config)).unwrap();

        assert_eq!(report.sizes.raw, 1453);
        assert_eq!(report.sizes.reference, 1441);
        assert_eq!(report.events.power_loss.len(), 1);
        let event = &report.events.power_loss[0];
        assert!(event.loss > 0.0);
        assert!(event.mean_temperature < 0.0);
        assert!(report.events.overproduction.is_empty());
        assert!(report.summary.power_loss > 0.0);
        assert!(report.ips.is_none());
        assert!(report.status_stops.is_none());
    }

    #[test]
    fn test_stop_filter_type_selects_series() {
        let mut config = config();
        config.filtering.stop_filter_type = 1;
        let report = run_dataset(&config, &dataset(), &resolved(&config)).unwrap();
        assert!(report.stops.is_some());
        assert!(report.status_stops.is_some());

        config.filtering.stop_filter_type = 7;
        let report = run_dataset(&config, &dataset(), &resolved(&config)).unwrap();
        assert!(report.stops.is_none());
        assert!(report.events.stop.is_empty());
        // Without stops the combined series is the power-loss series
        let combined = report.combined_alarms();
        assert_eq!(combined.len(), report.power_loss.len());
        assert!(combined.iter().any(|r| r.code == AlarmCode::PowerLoss));
    }

    #[test]
    fn test_heated_site_runs_ips_classification() {
        let mut config = config();
        config.icing = Some(IcingConfig {
            heating: true,
            ips_status_columns: vec![6],
            ips_status_codes: vec![crate::config::StatusCode::Numeric(1.0)],
            ..Default::default()
        });
        let report = run_dataset(&config, &dataset(), &resolved(&config)).unwrap();
        let ips = report.ips.as_ref().unwrap();
        assert_eq!(ips.len(), report.time_limited.len());
        // No IPS channel values in the data: nothing is flagged
        assert!(report.events.ips.is_empty());
        assert!(report.ice_detection.is_none());
    }

    #[test]
    fn test_time_window_limits_statistics() {
        let mut config = config();
        config.filtering.start_time = Some("2020-01-05 00:00:00".into());
        let report = run_dataset(&config, &dataset(), &resolved(&config)).unwrap();
        assert!(report.time_limited.len() < report.sizes.raw);
        assert_eq!(report.summary.data_start, Some(t0() + Duration::days(4)));
        // Reference set still spans the full range
        assert_eq!(report.sizes.reference, 1441);
    }

    #[test]
    fn test_bad_time_window_is_config_error() {
        let mut config = config();
        config.filtering.stop_time = Some("yesterday".into());
        let err = run_dataset(&config, &dataset(), &resolved(&config)).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
