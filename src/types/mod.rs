//! Shared data structures for the icing loss engine
//!
//! Types flow strictly downstream through the pipeline:
//! - SampleMatrix (ingested SCADA rows)
//! - AlarmRecord (per-timestamp classifier output)
//! - EventInterval (confirmed events with integrated loss)
//! - MonthlyStatistic / SummaryStatistics (aggregated figures)

mod alarm;
mod sample;
mod statistics;

pub use alarm::*;
pub use sample::*;
pub use statistics::*;
