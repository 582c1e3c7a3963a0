//! Recursive autoregressive forecaster with exogenous regressors.
//!
//! The target and the exogenous columns are each power-transformed before
//! fitting. Training row `t` is
//!
//! ```text
//! [z_{t-1}, ..., z_{t-lags}, e_{t,1}, ..., e_{t,k}]  ->  z_t
//! ```
//!
//! with `z` the transformed target and `e` the transformed exogenous values.
//! Multi-step forecasts feed each prediction back in as the newest lag.
//!
//! Prediction intervals come from a residual bootstrap: every path draws one
//! in-sample residual per step (with replacement) and adds it to the
//! prediction before it re-enters the lag window. Path `i` uses its own
//! `StdRng`, seeded from a master generator, so the result does not depend on
//! how rayon schedules the paths.

use chrono::NaiveDate;
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::data::{TimeFrame, add_months, month_range};
use crate::error::AppError;
use crate::math::{PowerTransformer, percentile_sorted};
use crate::models::regressor::Regressor;

/// Point forecast with optional bootstrap bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalForecast {
    pub date: NaiveDate,
    pub value: f64,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

struct FittedState {
    y_transform: PowerTransformer,
    exog_transform: PowerTransformer,
    exog_columns: Vec<String>,
    /// Transformed target, oldest first.
    last_window: Vec<f64>,
    last_date: NaiveDate,
    /// In-sample residuals on the transformed scale.
    residuals: Vec<f64>,
}

pub struct AutoregForecaster {
    regressor: Box<dyn Regressor>,
    lags: usize,
    state: Option<FittedState>,
}

impl AutoregForecaster {
    pub fn new(regressor: Box<dyn Regressor>, lags: usize) -> Self {
        Self {
            regressor,
            lags,
            state: None,
        }
    }

    pub fn lags(&self) -> usize {
        self.lags
    }

    pub fn regressor_name(&self) -> &'static str {
        self.regressor.name()
    }

    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    /// Date of the last training observation.
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.state.as_ref().map(|s| s.last_date)
    }

    pub fn residuals(&self) -> &[f64] {
        self.state.as_ref().map_or(&[], |s| s.residuals.as_slice())
    }

    /// Fit on the full sample. `exog` must share `y`'s index and have no gaps.
    pub fn fit(&mut self, y: &TimeFrame, target: &str, exog: &TimeFrame) -> Result<(), AppError> {
        if self.lags == 0 {
            return Err(AppError::new(2, "The autoregressive lag count must be at least 1."));
        }
        if exog.index() != y.index() {
            return Err(AppError::new(
                2,
                "Exogenous features must cover exactly the target's dates.",
            ));
        }
        let y_values = complete_column(y, target)?;
        let n = y_values.len();
        if n <= self.lags {
            return Err(AppError::new(
                3,
                format!(
                    "Need more than {} observations of `{target}` for a {}-lag model, got {n}.",
                    self.lags, self.lags
                ),
            ));
        }
        if let Some(w) = y.index().windows(2).find(|w| add_months(w[0], 1) != w[1]) {
            return Err(AppError::new(
                3,
                format!("`{target}` has a gap between {} and {}.", w[0], w[1]),
            ));
        }
        let last_date = y
            .last_date()
            .ok_or_else(|| AppError::new(3, format!("No observations of `{target}`.")))?;

        let exog_columns: Vec<String> = exog.column_names().to_vec();
        let exog_values = exog_columns
            .iter()
            .map(|c| complete_column(exog, c))
            .collect::<Result<Vec<_>, _>>()?;

        let y_transform = PowerTransformer::fit(std::slice::from_ref(&y_values));
        let z = y_transform.transform_column(0, &y_values);
        let exog_transform = PowerTransformer::fit(&exog_values);
        let e: Vec<Vec<f64>> = exog_values
            .iter()
            .enumerate()
            .map(|(j, col)| exog_transform.transform_column(j, col))
            .collect();
        if z.iter().chain(e.iter().flatten()).any(|v| !v.is_finite()) {
            return Err(AppError::new(4, "Power transform produced non-finite values."));
        }

        let width = self.lags + e.len();
        let n_train = n - self.lags;
        let mut design = DMatrix::<f64>::zeros(n_train, width);
        for (r, t) in (self.lags..n).enumerate() {
            for k in 0..self.lags {
                design[(r, k)] = z[t - 1 - k];
            }
            for (j, col) in e.iter().enumerate() {
                design[(r, self.lags + j)] = col[t];
            }
        }
        let target_z = DVector::from_iterator(n_train, z[self.lags..].iter().copied());

        self.regressor.fit(&design, &target_z)?;

        let residuals: Vec<f64> = (0..n_train)
            .map(|r| {
                let row: Vec<f64> = design.row(r).iter().copied().collect();
                target_z[r] - self.regressor.predict_row(&row)
            })
            .collect();
        if residuals.iter().any(|r| !r.is_finite()) {
            return Err(AppError::new(
                4,
                format!("{} produced non-finite in-sample predictions.", self.regressor.name()),
            ));
        }

        debug!(
            regressor = self.regressor.name(),
            observations = n_train,
            features = width,
            "autoregressive model fitted"
        );

        self.state = Some(FittedState {
            y_transform,
            exog_transform,
            exog_columns,
            last_window: z[n - self.lags..].to_vec(),
            last_date,
            residuals,
        });
        Ok(())
    }

    /// Recursive point forecast over the `steps` months after the last observation.
    pub fn predict(&self, steps: usize, exog: &TimeFrame) -> Result<Vec<IntervalForecast>, AppError> {
        let state = self.fitted()?;
        let (dates, rows) = self.prepare_exog(state, steps, exog)?;
        let point = self.inverse_path(state, &self.forecast_path(state, &rows, None));
        dates
            .into_iter()
            .zip(point)
            .map(|(date, value)| {
                finite_point(date, value).map(|value| IntervalForecast {
                    date,
                    value,
                    lower: None,
                    upper: None,
                })
            })
            .collect()
    }

    /// Point forecast plus bootstrap percentile bounds.
    ///
    /// `percentiles` are `[lower, upper]` in `[0, 100]`. Bounds are widened to
    /// include the point forecast when the bootstrap distribution lies on one
    /// side of it.
    pub fn predict_interval(
        &self,
        steps: usize,
        exog: &TimeFrame,
        n_boot: usize,
        seed: u64,
        percentiles: [f64; 2],
    ) -> Result<Vec<IntervalForecast>, AppError> {
        if n_boot == 0 {
            return Err(AppError::new(2, "The bootstrap count must be at least 1."));
        }
        if !(0.0..=100.0).contains(&percentiles[0])
            || !(0.0..=100.0).contains(&percentiles[1])
            || percentiles[0] > percentiles[1]
        {
            return Err(AppError::new(
                2,
                format!("Invalid interval percentiles {percentiles:?}."),
            ));
        }

        let state = self.fitted()?;
        let (dates, rows) = self.prepare_exog(state, steps, exog)?;
        let point = self.inverse_path(state, &self.forecast_path(state, &rows, None));

        let mut master = StdRng::seed_from_u64(seed);
        let seeds: Vec<u64> = (0..n_boot).map(|_| master.r#gen()).collect();
        let residuals = &state.residuals;

        let paths: Vec<Vec<f64>> = seeds
            .par_iter()
            .map(|&path_seed| {
                let mut rng = StdRng::seed_from_u64(path_seed);
                let draws: Vec<f64> = (0..steps)
                    .map(|_| residuals[rng.gen_range(0..residuals.len())])
                    .collect();
                self.inverse_path(state, &self.forecast_path(state, &rows, Some(&draws)))
            })
            .collect();

        let mut out = Vec::with_capacity(steps);
        for (step, (date, value)) in dates.into_iter().zip(point).enumerate() {
            let value = finite_point(date, value)?;
            let mut draws: Vec<f64> = paths.iter().map(|p| p[step]).filter(|v| v.is_finite()).collect();
            if draws.is_empty() {
                return Err(AppError::new(
                    4,
                    format!("Every bootstrap path is non-finite at {date}."),
                ));
            }
            if draws.len() < n_boot {
                warn!(%date, dropped = n_boot - draws.len(), "discarding non-finite bootstrap paths");
            }
            draws.sort_by(f64::total_cmp);
            let lower = percentile_sorted(&draws, percentiles[0]).min(value);
            let upper = percentile_sorted(&draws, percentiles[1]).max(value);
            out.push(IntervalForecast {
                date,
                value,
                lower: Some(lower),
                upper: Some(upper),
            });
        }

        debug!(
            regressor = self.regressor.name(),
            steps,
            n_boot,
            "bootstrap interval computed"
        );
        Ok(out)
    }

    fn fitted(&self) -> Result<&FittedState, AppError> {
        self.state
            .as_ref()
            .ok_or_else(|| AppError::new(4, "Forecaster used before fitting."))
    }

    /// Validate the scenario and return its dates plus transformed rows.
    fn prepare_exog(
        &self,
        state: &FittedState,
        steps: usize,
        exog: &TimeFrame,
    ) -> Result<(Vec<NaiveDate>, Vec<Vec<f64>>), AppError> {
        if steps == 0 {
            return Err(AppError::new(2, "The forecast horizon must be at least 1."));
        }
        let first = add_months(state.last_date, 1);
        let dates = month_range(first, add_months(state.last_date, steps as i32));
        if exog.index() != dates.as_slice() {
            return Err(AppError::new(
                2,
                format!("Scenario must cover the {steps} months starting {first}."),
            ));
        }
        if exog.column_names() != state.exog_columns.as_slice() {
            return Err(AppError::new(
                2,
                format!(
                    "Scenario columns {:?} do not match the fitted columns {:?}.",
                    exog.column_names(),
                    state.exog_columns
                ),
            ));
        }

        let columns = state
            .exog_columns
            .iter()
            .enumerate()
            .map(|(j, c)| complete_column(exog, c).map(|col| state.exog_transform.transform_column(j, &col)))
            .collect::<Result<Vec<_>, _>>()?;
        let rows = (0..steps)
            .map(|t| columns.iter().map(|col| col[t]).collect())
            .collect();
        Ok((dates, rows))
    }

    /// Recursive forecast on the transformed scale, optionally perturbed by
    /// one residual per step.
    fn forecast_path(&self, state: &FittedState, exog_rows: &[Vec<f64>], residuals: Option<&[f64]>) -> Vec<f64> {
        let mut window = state.last_window.clone();
        let mut out = Vec::with_capacity(exog_rows.len());
        let mut row = vec![0.0; self.lags + state.exog_columns.len()];

        for (step, exog_row) in exog_rows.iter().enumerate() {
            for k in 0..self.lags {
                row[k] = window[window.len() - 1 - k];
            }
            row[self.lags..].copy_from_slice(exog_row);

            let mut pred = self.regressor.predict_row(&row);
            if let Some(r) = residuals {
                pred += r[step];
            }
            window.push(pred);
            out.push(pred);
        }
        out
    }

    fn inverse_path(&self, state: &FittedState, path: &[f64]) -> Vec<f64> {
        path.iter().map(|z| state.y_transform.inverse(0, *z)).collect()
    }
}

fn complete_column(frame: &TimeFrame, name: &str) -> Result<Vec<f64>, AppError> {
    frame
        .require(name)?
        .iter()
        .zip(frame.index())
        .map(|(v, d)| v.ok_or_else(|| AppError::new(3, format!("Column `{name}` is missing a value at {d}."))))
        .collect()
}

fn finite_point(date: NaiveDate, value: f64) -> Result<f64, AppError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(AppError::new(4, format!("Non-finite point forecast at {date}.")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BayesianRidge, Ridge};
    use rand_distr::{Distribution, Normal};

    fn d(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn ar_series(n: usize, seed: u64) -> TimeFrame {
        let mut rng = StdRng::seed_from_u64(seed);
        let noise = Normal::new(0.0, 0.2).unwrap();
        let mut values = vec![10.0, 10.2];
        for t in 2..n {
            let v = 2.0 + 0.6 * values[t - 1] + 0.2 * values[t - 2] + noise.sample(&mut rng);
            values.push(v);
        }
        let index = month_range(d(2010, 1), add_months(d(2010, 1), n as i32 - 1));
        TimeFrame::from_columns(index, vec![("selic".into(), values.into_iter().map(Some).collect())]).unwrap()
    }

    fn no_exog(first: NaiveDate, steps: usize) -> TimeFrame {
        TimeFrame::new(month_range(first, add_months(first, steps as i32 - 1))).unwrap()
    }

    #[test]
    fn interval_brackets_point_and_is_seed_deterministic() {
        let y = ar_series(120, 3);
        let mut model = AutoregForecaster::new(Box::new(BayesianRidge::new()), 2);
        model.fit(&y, "selic", &TimeFrame::new(y.index().to_vec()).unwrap()).unwrap();
        assert_eq!(model.residuals().len(), 118);

        let scenario = no_exog(d(2020, 1), 6);
        let a = model.predict_interval(6, &scenario, 500, 1984, [5.0, 95.0]).unwrap();
        let b = model.predict_interval(6, &scenario, 500, 1984, [5.0, 95.0]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 6);
        assert_eq!(a[0].date, d(2020, 1));

        let point = model.predict(6, &scenario).unwrap();
        for (p, i) in point.iter().zip(&a) {
            assert_eq!(p.value, i.value);
            assert!(i.lower.unwrap() <= i.value && i.value <= i.upper.unwrap());
        }
        // Uncertainty grows with the horizon.
        let width = |f: &IntervalForecast| f.upper.unwrap() - f.lower.unwrap();
        assert!(width(&a[5]) > width(&a[0]));
    }

    #[test]
    fn exogenous_columns_enter_the_design() {
        let y = ar_series(80, 11);
        let driver: Vec<Option<f64>> = (0..80).map(|t| Some((t as f64 / 6.0).sin())).collect();
        let exog = TimeFrame::from_columns(y.index().to_vec(), vec![("gap".into(), driver)]).unwrap();

        let mut model = AutoregForecaster::new(Box::new(Ridge::default()), 2);
        model.fit(&y, "selic", &exog).unwrap();

        let first = add_months(model.last_date().unwrap(), 1);
        let future = TimeFrame::from_columns(
            month_range(first, add_months(first, 2)),
            vec![("gap".into(), vec![Some(0.1), Some(0.2), Some(0.3)])],
        )
        .unwrap();
        assert_eq!(model.predict(3, &future).unwrap().len(), 3);

        // Wrong columns or wrong dates are rejected.
        let renamed = TimeFrame::from_columns(
            future.index().to_vec(),
            vec![("other".into(), vec![Some(0.1), Some(0.2), Some(0.3)])],
        )
        .unwrap();
        assert_eq!(model.predict(3, &renamed).unwrap_err().exit_code(), 2);
        assert_eq!(model.predict(2, &future).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn too_short_history_is_insufficient_data() {
        let index = vec![d(2024, 1), d(2024, 2)];
        let y = TimeFrame::from_columns(index.clone(), vec![("selic".into(), vec![Some(5.0), Some(5.25)])]).unwrap();
        let mut model = AutoregForecaster::new(Box::new(BayesianRidge::new()), 2);
        let err = model.fit(&y, "selic", &TimeFrame::new(index).unwrap()).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn missing_month_in_target_is_rejected() {
        let index = vec![d(2024, 1), d(2024, 2), d(2024, 3), d(2024, 5)];
        let y = TimeFrame::from_columns(
            index.clone(),
            vec![("selic".into(), vec![Some(5.0), Some(5.25), Some(5.5), Some(5.75)])],
        )
        .unwrap();
        let mut model = AutoregForecaster::new(Box::new(Ridge::default()), 2);
        let err = model.fit(&y, "selic", &TimeFrame::new(index).unwrap()).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
