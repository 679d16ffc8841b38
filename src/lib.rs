//! iceloss: Icing Energy-Loss Estimation for Wind Turbines
//!
//! Estimates production lost to blade icing from 10-minute SCADA data by
//! comparing each sample against a site power curve learnt from warm,
//! normally operating periods.
//!
//! ## Architecture
//!
//! - **Ingestion**: CSV to typed samples, text fault codes to numbers
//! - **Filtering**: air density correction, time window, state, temperature, power level
//! - **Power Curve**: binned median and percentile bands per speed/direction cell
//! - **Alarm Classifier**: power loss, stops, overproduction, status-code labels
//! - **Events and Aggregation**: integrated losses per event, month and dataset
//! - **Reports**: summary, power curve grid, event CSVs, monthly statistics

pub mod aggregation;
pub mod alarms;
pub mod binning;
pub mod config;
pub mod events;
pub mod filtering;
pub mod ingest;
pub mod pipeline;
pub mod power_curve;
pub mod report;
pub mod types;

// Re-export site configuration
pub use config::{ConfigError, SiteConfig};

// Re-export commonly used types
pub use types::{
    AlarmCode, AlarmRecord, EventInterval, MonthlyStatistic, Sample, SampleMatrix,
    SummaryStatistics,
};

// Re-export engine entry points
pub use ingest::{CsvImporter, FaultCodeRegistry, IngestError, IngestedData};
pub use pipeline::{process_config_file, run_batch, run_dataset, DatasetReport};
pub use power_curve::{PowerCurveBuilder, PowerCurveTable};
pub use report::ReportError;
