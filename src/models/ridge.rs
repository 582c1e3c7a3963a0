//! Ridge regression with an unpenalised intercept.

use nalgebra::{DMatrix, DVector};

use crate::error::AppError;
use crate::math::{augment_for_ridge, solve_least_squares};
use crate::models::regressor::{LinearFit, Regressor, center, check_shapes, uncenter};

#[derive(Debug, Clone)]
pub struct Ridge {
    pub alpha: f64,
    fit: Option<LinearFit>,
}

impl Default for Ridge {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Ridge {
    pub fn new(alpha: f64) -> Self {
        Self { alpha, fit: None }
    }

    pub fn coefficients(&self) -> Option<&LinearFit> {
        self.fit.as_ref()
    }
}

impl Regressor for Ridge {
    fn name(&self) -> &'static str {
        "Ridge"
    }

    fn fit(&mut self, x: &DMatrix<f64>, y: &DVector<f64>) -> Result<(), AppError> {
        check_shapes(x, y, self.name())?;
        let (xc, yc, x_mean, y_mean) = center(x, y);

        let coef = if xc.ncols() == 0 {
            DVector::zeros(0)
        } else {
            let (x_aug, y_aug) = augment_for_ridge(&xc, &yc, self.alpha);
            solve_least_squares(&x_aug, &y_aug)
                .ok_or_else(|| AppError::new(4, "Ridge: least squares solve failed."))?
        };

        self.fit = Some(uncenter(coef, &x_mean, y_mean).validated(self.name())?);
        Ok(())
    }

    fn predict_row(&self, row: &[f64]) -> f64 {
        self.fit.as_ref().map_or(f64::NAN, |f| f.predict_row(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_closed_form_on_one_feature() {
        // Centred x = [-1, 0, 1], centred y = [-2, 0, 2]: β = Σxy / (Σx² + α) = 4 / 3.
        let x = DMatrix::from_row_slice(3, 1, &[1.0, 2.0, 3.0]);
        let y = DVector::from_row_slice(&[1.0, 3.0, 5.0]);
        let mut model = Ridge::default();
        model.fit(&x, &y).unwrap();
        let fit = model.coefficients().unwrap();
        assert!((fit.coef[0] - 4.0 / 3.0).abs() < 1e-10);
        assert!((fit.intercept - (3.0 - 2.0 * 4.0 / 3.0)).abs() < 1e-10);
    }

    #[test]
    fn no_features_predicts_the_mean() {
        let x = DMatrix::<f64>::zeros(3, 0);
        let y = DVector::from_row_slice(&[1.0, 2.0, 6.0]);
        let mut model = Ridge::default();
        model.fit(&x, &y).unwrap();
        assert!((model.predict_row(&[]) - 3.0).abs() < 1e-12);
    }
}
