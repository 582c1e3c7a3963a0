//! `macro-forecast` library crate.
//!
//! The binary (`mf`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the pipeline and the dashboard share one set of types
//! - code stays easy to navigate as the project grows

pub mod ai;
pub mod app;
pub mod cli;
pub mod dashboard;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod math;
pub mod models;
pub mod prep;
pub mod report;
pub mod scenario;
