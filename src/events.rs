//! Event Extractor - alarm runs to integrated loss events
//!
//! A labelled alarm series is treated as a binary indicator. Rising edges
//! start an event and falling edges end it; the loss is the trapezoidal
//! integral of `reference - measured` power over the event.

use tracing::{debug, warn};

use crate::power_curve::stats::nan_mean;
use crate::types::{AlarmRecord, EventInterval};

/// Hours between two records.
fn hours_between(a: &AlarmRecord, b: &AlarmRecord) -> f64 {
    (b.timestamp - a.timestamp).num_milliseconds() as f64 / 3_600_000.0
}

/// Indices where a labelled run starts and where it ends (first unlabelled
/// index after the run).
pub fn edges(records: &[AlarmRecord]) -> (Vec<usize>, Vec<usize>) {
    let mut starts = Vec::new();
    let mut stops = Vec::new();
    let mut previous = false;
    for (i, r) in records.iter().enumerate() {
        let current = r.code.is_alarm();
        if current && !previous {
            starts.push(i);
        } else if !current && previous {
            stops.push(i);
        }
        previous = current;
    }
    (starts, stops)
}

/// Convert labelled runs into events.
///
/// Starts and stops are paired in order; a run still open at the end of the
/// series has no stop and is dropped. With `secondary`, the record's
/// secondary channel is integrated over the same steps as the loss.
pub fn extract_events(records: &[AlarmRecord], secondary: bool) -> Vec<EventInterval> {
    let (starts, stops) = edges(records);
    let pairs = starts.len().min(stops.len());

    let mut events = Vec::with_capacity(pairs);
    for (k, (&start, &stop)) in starts.iter().zip(&stops).enumerate() {
        let (t_start, t_stop) = (records[start].timestamp, records[stop].timestamp);
        if t_start > t_stop {
            warn!(
                pair = k,
                start = %t_start,
                stop = %t_stop,
                "Skipping event with start after stop"
            );
            continue;
        }
        events.push(integrate(&records[start..=stop], secondary));
    }

    debug!(
        records = records.len(),
        starts = starts.len(),
        stops = stops.len(),
        events = events.len(),
        "Events extracted"
    );
    events
}

/// Integrate one event. `span` runs from the start record to the stop record
/// inclusive; means cover every record but the stop record.
fn integrate(span: &[AlarmRecord], secondary: bool) -> EventInterval {
    let mut loss = 0.0;
    let mut heating = 0.0;

    for pair in span.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        let (da, db) = (a.power_drop(), b.power_drop());
        if !(da.is_finite() && db.is_finite()) {
            continue;
        }
        let dt = hours_between(a, b);
        loss += dt * (da + db) / 2.0;
        if secondary {
            let value = |r: &AlarmRecord| r.secondary.filter(|v| v.is_finite()).unwrap_or(0.0);
            heating += dt * (value(a) + value(b)) / 2.0;
        }
    }

    let body = &span[..span.len() - 1];
    let mean = |f: fn(&AlarmRecord) -> f64| nan_mean(&body.iter().map(f).collect::<Vec<_>>());

    let first = &span[0];
    let last = &span[span.len() - 1];
    EventInterval {
        start: first.timestamp,
        stop: last.timestamp,
        loss,
        duration_hours: hours_between(first, last),
        mean_power_drop: mean(AlarmRecord::power_drop),
        mean_power: mean(|r| r.power),
        mean_reference_power: mean(|r| r.reference_power),
        mean_wind_speed: mean(|r| r.wind_speed),
        mean_temperature: mean(|r| r.temperature),
        secondary: secondary.then_some(heating),
    }
}
