//! Forecasting models.
//!
//! - linear regressors behind the `Regressor` trait (`bayes_ridge`, `ridge`, `linear_svr`)
//! - the equal-weight ensemble (`voting`)
//! - the recursive autoregressive forecaster with bootstrap intervals (`autoreg`)

pub mod autoreg;
pub mod bayes_ridge;
pub mod linear_svr;
pub mod regressor;
pub mod ridge;
pub mod voting;

pub use autoreg::{AutoregForecaster, IntervalForecast};
pub use bayes_ridge::BayesianRidge;
pub use linear_svr::LinearSvr;
pub use regressor::{LinearFit, Regressor};
pub use ridge::Ridge;
pub use voting::VotingRegressor;

use crate::domain::{ForecastRow, ModelTag};
use crate::error::AppError;

/// Unfitted forecaster for a statistical model tag.
///
/// - `Ensemble`: voting over Bayesian ridge, linear SVR (seeded) and ridge
/// - `BayesianRidge`: Bayesian ridge alone
pub fn build_forecaster(tag: ModelTag, lags: usize, seed: u64) -> Result<AutoregForecaster, AppError> {
    let regressor: Box<dyn Regressor> = match tag {
        ModelTag::Ensemble => Box::new(VotingRegressor::new(vec![
            Box::new(BayesianRidge::new()),
            Box::new(LinearSvr::new(seed)),
            Box::new(Ridge::default()),
        ])),
        ModelTag::BayesianRidge => Box::new(BayesianRidge::new()),
        ModelTag::Actual | ModelTag::Ai => {
            return Err(AppError::new(
                2,
                format!("`{}` is not a statistical model.", tag.model_name()),
            ));
        }
    };
    Ok(AutoregForecaster::new(regressor, lags))
}

/// Tag forecaster output as persisted rows.
pub fn to_rows(forecasts: &[IntervalForecast], tag: ModelTag) -> Vec<ForecastRow> {
    forecasts
        .iter()
        .map(|f| ForecastRow {
            date: f.date,
            value: f.value,
            lower: f.lower,
            upper: f.upper,
            model: tag,
        })
        .collect()
}
