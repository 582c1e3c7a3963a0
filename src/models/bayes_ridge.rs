//! Bayesian ridge regression by evidence maximisation.
//!
//! Gaussian likelihood with noise precision `α` and an isotropic Gaussian
//! prior on the weights with precision `λ`, both with Gamma hyper-priors.
//! Each iteration computes the posterior mean of the weights for the current
//! `(α, λ)` and re-estimates them from the effective number of parameters
//! `γ = Σ α s_i² / (λ + α s_i²)`.
//!
//! The posterior mean uses the thin SVD `X = U S Vᵀ` of the centred design:
//! `w = V diag(s_i / (s_i² + λ/α)) Uᵀ y`, which covers both tall and wide
//! designs.

use nalgebra::{DMatrix, DVector};

use crate::error::AppError;
use crate::models::regressor::{LinearFit, Regressor, center, check_shapes, uncenter};

#[derive(Debug, Clone)]
pub struct BayesianRidge {
    pub max_iter: usize,
    pub tol: f64,
    pub alpha_1: f64,
    pub alpha_2: f64,
    pub lambda_1: f64,
    pub lambda_2: f64,
    fit: Option<LinearFit>,
    alpha: f64,
    lambda: f64,
}

impl Default for BayesianRidge {
    fn default() -> Self {
        Self {
            max_iter: 300,
            tol: 1e-3,
            alpha_1: 1e-6,
            alpha_2: 1e-6,
            lambda_1: 1e-6,
            lambda_2: 1e-6,
            fit: None,
            alpha: 0.0,
            lambda: 0.0,
        }
    }
}

impl BayesianRidge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Estimated noise precision.
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Estimated weight precision.
    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    pub fn coefficients(&self) -> Option<&LinearFit> {
        self.fit.as_ref()
    }
}

fn posterior_mean(
    u: &DMatrix<f64>,
    s: &DVector<f64>,
    v_t: &DMatrix<f64>,
    y: &DVector<f64>,
    ratio: f64,
) -> DVector<f64> {
    let uty = u.transpose() * y;
    let scaled = DVector::from_iterator(s.len(), s.iter().zip(uty.iter()).map(|(si, c)| si / (si * si + ratio) * c));
    v_t.transpose() * scaled
}

impl Regressor for BayesianRidge {
    fn name(&self) -> &'static str {
        "BayesianRidge"
    }

    fn fit(&mut self, x: &DMatrix<f64>, y: &DVector<f64>) -> Result<(), AppError> {
        check_shapes(x, y, self.name())?;
        let (xc, yc, x_mean, y_mean) = center(x, y);
        let n = xc.nrows() as f64;
        if xc.ncols() == 0 {
            self.fit = Some(uncenter(DVector::zeros(0), &x_mean, y_mean));
            return Ok(());
        }

        let svd = xc.clone().svd(true, true);
        let (Some(u), Some(v_t)) = (svd.u, svd.v_t) else {
            return Err(AppError::new(4, "BayesianRidge: SVD did not converge."));
        };
        let s = svd.singular_values;
        let eigen: Vec<f64> = s.iter().map(|v| v * v).collect();

        let y_var = yc.norm_squared() / n;
        let mut alpha = 1.0 / (y_var + f64::EPSILON);
        let mut lambda = 1.0;
        let mut coef_old: Option<DVector<f64>> = None;

        for _ in 0..self.max_iter {
            let coef = posterior_mean(&u, &s, &v_t, &yc, lambda / alpha);
            let rmse = (&yc - &xc * &coef).norm_squared();

            let gamma: f64 = eigen.iter().map(|e| alpha * e / (lambda + alpha * e)).sum();
            lambda = (gamma + 2.0 * self.lambda_1) / (coef.norm_squared() + 2.0 * self.lambda_2);
            alpha = (n - gamma + 2.0 * self.alpha_1) / (rmse + 2.0 * self.alpha_2);

            if let Some(old) = &coef_old {
                if (old - &coef).abs().sum() < self.tol {
                    break;
                }
            }
            coef_old = Some(coef);
        }

        let coef = posterior_mean(&u, &s, &v_t, &yc, lambda / alpha);
        self.alpha = alpha;
        self.lambda = lambda;
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
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand_distr::{Distribution, Normal};

    #[test]
    fn recovers_linear_relationship_under_noise() {
        let mut rng = StdRng::seed_from_u64(7);
        let noise = Normal::new(0.0, 0.05).unwrap();
        let n = 200;
        let mut data = Vec::with_capacity(n * 2);
        let mut y = Vec::with_capacity(n);
        for i in 0..n {
            let a = (i as f64 / 10.0).sin();
            let b = (i as f64 / 7.0).cos();
            data.extend([a, b]);
            y.push(1.5 + 2.0 * a - 0.5 * b + noise.sample(&mut rng));
        }
        let x = DMatrix::from_row_slice(n, 2, &data);
        let y = DVector::from_vec(y);

        let mut model = BayesianRidge::new();
        model.fit(&x, &y).unwrap();
        let fit = model.coefficients().unwrap();
        assert!((fit.coef[0] - 2.0).abs() < 0.05, "{fit:?}");
        assert!((fit.coef[1] + 0.5).abs() < 0.05, "{fit:?}");
        assert!((fit.intercept - 1.5).abs() < 0.05, "{fit:?}");
        // Noise precision close to 1 / 0.05².
        assert!(model.alpha() > 100.0);
    }

    #[test]
    fn single_observation_predicts_its_target() {
        let x = DMatrix::from_row_slice(1, 2, &[0.3, -1.2]);
        let y = DVector::from_row_slice(&[0.8]);
        let mut model = BayesianRidge::new();
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict_row(&[0.3, -1.2]), 0.8);
    }
}
