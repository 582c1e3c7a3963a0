//! Time-series containers and external survey data.
//!
//! - month-start calendar helpers (`calendar`)
//! - the date-indexed `TimeFrame` table (`frame`)
//! - BCB Focus inflation expectations (`focus`)

pub mod calendar;
pub mod focus;
pub mod frame;

pub use calendar::*;
pub use focus::{Expectation, FocusClient};
pub use frame::{Series, TimeFrame};
