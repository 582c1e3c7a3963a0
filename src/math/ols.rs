//! Least squares solver.
//!
//! The ridge regressor solves `min ||Xβ - y||² + α||β||²` by stacking
//! `sqrt(α)·I` under the design matrix and zeros under the target, which turns
//! it into an ordinary least squares problem on a tall matrix.
//!
//! We use SVD so tall and rank-deficient systems are handled without panics
//! (nalgebra's `QR::solve` expects square systems).

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Stack `sqrt(alpha)·I` under `x` and zeros under `y` (Tikhonov augmentation).
pub fn augment_for_ridge(x: &DMatrix<f64>, y: &DVector<f64>, alpha: f64) -> (DMatrix<f64>, DVector<f64>) {
    let (n, p) = x.shape();
    if alpha <= 0.0 {
        return (x.clone(), y.clone());
    }
    let mut x_aug = DMatrix::<f64>::zeros(n + p, p);
    x_aug.rows_mut(0, n).copy_from(x);
    for j in 0..p {
        x_aug[(n + j, j)] = alpha.sqrt();
    }
    let mut y_aug = DVector::<f64>::zeros(n + p);
    y_aug.rows_mut(0, n).copy_from(y);
    (x_aug, y_aug)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn ridge_augmentation_shrinks_towards_zero() {
        // Single column, x = [1, 1], y = [2, 2]: OLS gives 2, ridge gives 4 / (2 + alpha).
        let x = DMatrix::from_row_slice(2, 1, &[1.0, 1.0]);
        let y = DVector::from_row_slice(&[2.0, 2.0]);
        let (xa, ya) = augment_for_ridge(&x, &y, 2.0);
        assert_eq!(xa.shape(), (3, 1));
        let beta = solve_least_squares(&xa, &ya).unwrap();
        assert!((beta[0] - 1.0).abs() < 1e-10);
    }
}
