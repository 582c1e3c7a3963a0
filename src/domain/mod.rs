//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the forecast targets (`Indicator`) and series labels (`ModelTag`)
//! - persisted forecast rows (`ForecastRow`)
//! - the run configuration (`ForecastConfig`)

pub mod types;

pub use types::*;
