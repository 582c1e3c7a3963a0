//! Hodrick–Prescott trend filter.
//!
//! The trend `τ` minimises
//!
//! ```text
//! Σ (y_t - τ_t)^2 + λ Σ (τ_{t+1} - 2τ_t + τ_{t-1})^2
//! ```
//!
//! which is the linear system `(I + λ DᵀD) τ = y`, with `D` the
//! `(n-2) × n` second-difference operator. The matrix is symmetric positive
//! definite, so we solve it with a Cholesky factorisation.
//!
//! This is the exact two-sided filter (no recursive approximation); both ends
//! of the sample are treated symmetrically.

use nalgebra::{DMatrix, DVector};

use crate::error::AppError;

/// Return the HP trend of `y` for smoothing penalty `lambda`.
///
/// Series shorter than 3 observations have no curvature term and are
/// returned unchanged.
pub fn hp_trend(y: &[f64], lambda: f64) -> Result<Vec<f64>, AppError> {
    if !(lambda.is_finite() && lambda >= 0.0) {
        return Err(AppError::new(2, format!("Invalid HP smoothing parameter: {lambda}.")));
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(AppError::new(4, "HP filter input contains non-finite values."));
    }

    let n = y.len();
    if n < 3 {
        return Ok(y.to_vec());
    }

    let mut a = DMatrix::<f64>::identity(n, n);
    let coeffs = [1.0, -2.0, 1.0];
    for k in 0..n - 2 {
        for (i, ci) in coeffs.iter().enumerate() {
            for (j, cj) in coeffs.iter().enumerate() {
                a[(k + i, k + j)] += lambda * ci * cj;
            }
        }
    }

    let chol = a
        .cholesky()
        .ok_or_else(|| AppError::new(4, "HP filter system is not positive definite."))?;
    let trend = chol.solve(&DVector::from_column_slice(y));
    Ok(trend.iter().copied().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_series_is_its_own_trend() {
        let y: Vec<f64> = (0..40).map(|t| 3.0 + 0.5 * t as f64).collect();
        let trend = hp_trend(&y, 14_400.0).unwrap();
        for (a, b) in y.iter().zip(&trend) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn zero_lambda_returns_input() {
        let y = vec![1.0, 5.0, 2.0, 8.0];
        let trend = hp_trend(&y, 0.0).unwrap();
        for (a, b) in y.iter().zip(&trend) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn large_lambda_smooths_oscillation() {
        let y: Vec<f64> = (0..60).map(|t| if t % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let trend = hp_trend(&y, 14_400.0).unwrap();
        assert!(trend.iter().all(|v| v.abs() < 0.1));
        // The cycle sums to ~zero, and so does the trend's deviation from it.
        let sum_y: f64 = y.iter().sum();
        let sum_t: f64 = trend.iter().sum();
        assert!((sum_y - sum_t).abs() < 1e-6);
    }

    #[test]
    fn rejects_non_finite_input() {
        assert!(hp_trend(&[1.0, f64::NAN, 2.0], 10.0).is_err());
        assert!(hp_trend(&[1.0, 2.0, 3.0], -1.0).is_err());
    }
}
