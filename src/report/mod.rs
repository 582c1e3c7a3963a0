//! Reporting utilities: formatted terminal output for forecast runs.

pub mod format;

pub use format::*;
