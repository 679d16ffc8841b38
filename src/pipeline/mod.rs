//! Analysis Pipeline
//!
//! ```text
//! config file ──► SiteConfig ──► CsvImporter ──► SampleMatrix
//!                                                    │
//!                      coordinator::run_dataset ◄────┘
//!                                │
//!                          DatasetReport ──► report writers
//! ```
//!
//! `coordinator` owns the per-dataset stage order; `batch` fans config files
//! out over a rayon pool.

mod batch;
mod coordinator;

pub use batch::{discover_configs, process_config_file, run_batch, write_outputs, BatchOutcome};
pub use coordinator::{run_dataset, DatasetReport};
