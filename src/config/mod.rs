//! Site Configuration Module
//!
//! Per-dataset configuration loaded from TOML files. Each file describes one
//! turbine: source CSV dialect, column layout, power curve binning, alarm
//! thresholds and the reports to write.
//!
//! ## Usage
//!
//! ```ignore
//! let config = SiteConfig::load_from_file(Path::new("sites/t1.toml"))?;
//! let window = config.time_window()?;
//! ```
//!
//! There is no process-wide config: each stage receives the `SiteConfig` of
//! the dataset it is working on.

pub mod defaults;
mod site_config;
pub mod validation;

pub use site_config::*;
