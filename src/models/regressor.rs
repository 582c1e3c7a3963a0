//! Regressor interface shared by the linear models and the ensemble.

use nalgebra::{DMatrix, DVector};

use crate::error::AppError;

/// A regressor fitted on a dense design matrix (rows = observations).
///
/// Implementations are object-safe so forecasters can own a
/// `Box<dyn Regressor>` regardless of which model sits inside.
pub trait Regressor: Send + Sync {
    fn name(&self) -> &'static str;

    fn fit(&mut self, x: &DMatrix<f64>, y: &DVector<f64>) -> Result<(), AppError>;

    /// Predict one observation. Must only be called after `fit`.
    fn predict_row(&self, row: &[f64]) -> f64;
}

/// Coefficients plus intercept of a fitted linear model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearFit {
    pub coef: Vec<f64>,
    pub intercept: f64,
}

impl LinearFit {
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        self.intercept + self.coef.iter().zip(row).map(|(b, x)| b * x).sum::<f64>()
    }

    /// Reject non-finite coefficients from a degenerate fit.
    pub fn validated(self, model: &str) -> Result<Self, AppError> {
        if self.intercept.is_finite() && self.coef.iter().all(|c| c.is_finite()) {
            Ok(self)
        } else {
            Err(AppError::new(4, format!("{model} produced non-finite coefficients.")))
        }
    }
}

/// Column means of `x` and the mean of `y`, with both centred in place.
pub(crate) fn center(x: &DMatrix<f64>, y: &DVector<f64>) -> (DMatrix<f64>, DVector<f64>, DVector<f64>, f64) {
    let n = x.nrows().max(1) as f64;
    let x_mean = DVector::from_iterator(x.ncols(), x.column_iter().map(|c| c.sum() / n));
    let y_mean = y.sum() / n;

    let mut xc = x.clone();
    for (j, mut col) in xc.column_iter_mut().enumerate() {
        col.add_scalar_mut(-x_mean[j]);
    }
    let yc = y.add_scalar(-y_mean);
    (xc, yc, x_mean, y_mean)
}

/// Map coefficients fitted on centred data back to an intercept.
pub(crate) fn uncenter(coef: DVector<f64>, x_mean: &DVector<f64>, y_mean: f64) -> LinearFit {
    let intercept = y_mean - coef.dot(x_mean);
    LinearFit {
        coef: coef.iter().copied().collect(),
        intercept,
    }
}

pub(crate) fn check_shapes(x: &DMatrix<f64>, y: &DVector<f64>, model: &str) -> Result<(), AppError> {
    if x.nrows() != y.len() {
        return Err(AppError::new(
            4,
            format!("{model}: design has {} rows but target has {}.", x.nrows(), y.len()),
        ));
    }
    if x.nrows() == 0 {
        return Err(AppError::new(3, format!("{model}: no observations to fit.")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centring_round_trips_through_intercept() {
        let x = DMatrix::from_row_slice(3, 1, &[1.0, 2.0, 3.0]);
        let y = DVector::from_row_slice(&[3.0, 5.0, 7.0]);
        let (xc, yc, xm, ym) = center(&x, &y);
        assert!((xc.column(0).sum()).abs() < 1e-12);
        assert!(yc.sum().abs() < 1e-12);

        let fit = uncenter(DVector::from_row_slice(&[2.0]), &xm, ym);
        assert!((fit.intercept - 1.0).abs() < 1e-12);
        assert!((fit.predict_row(&[4.0]) - 9.0).abs() < 1e-12);
    }

    #[test]
    fn non_finite_coefficients_are_numerical_failures() {
        let fit = LinearFit {
            coef: vec![f64::NAN],
            intercept: 0.0,
        };
        assert_eq!(fit.validated("Ridge").unwrap_err().exit_code(), 4);
    }
}
