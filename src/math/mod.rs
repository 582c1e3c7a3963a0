//! Numerical utilities: least squares, HP filter, power transform, statistics.

pub mod hp;
pub mod ols;
pub mod power;
pub mod stats;

pub use hp::hp_trend;
pub use ols::*;
pub use power::PowerTransformer;
pub use stats::*;
