//! Yeo–Johnson power transform with standardisation.
//!
//! Unlike Box–Cox, Yeo–Johnson accepts zero and negative values, which matters
//! for gaps and rates that can turn negative. Each column gets its own `λ`,
//! chosen by maximum likelihood over `[-2, 2]` (coarse grid, then a finer grid
//! around the best value). Transformed values are then centred and scaled to
//! unit variance. A constant column (up to rounding) keeps `λ = 1` and scale 1,
//! so it maps to exactly zero and a new value moves by its raw difference.

use crate::math::stats::{mean, variance};

const LAMBDA_EPS: f64 = 1e-10;

/// Forward Yeo–Johnson transform of a single value.
pub fn yeo_johnson(x: f64, lambda: f64) -> f64 {
    if x >= 0.0 {
        if lambda.abs() < LAMBDA_EPS {
            x.ln_1p()
        } else {
            ((x + 1.0).powf(lambda) - 1.0) / lambda
        }
    } else if (lambda - 2.0).abs() < LAMBDA_EPS {
        -(-x).ln_1p()
    } else {
        -((1.0 - x).powf(2.0 - lambda) - 1.0) / (2.0 - lambda)
    }
}

/// Inverse Yeo–Johnson transform. Returns NaN outside the transform's range.
pub fn inv_yeo_johnson(y: f64, lambda: f64) -> f64 {
    if y >= 0.0 {
        if lambda.abs() < LAMBDA_EPS {
            y.exp_m1()
        } else {
            let base = y * lambda + 1.0;
            if base <= 0.0 { f64::NAN } else { base.powf(1.0 / lambda) - 1.0 }
        }
    } else if (lambda - 2.0).abs() < LAMBDA_EPS {
        1.0 - (-y).exp()
    } else {
        let base = 1.0 - (2.0 - lambda) * y;
        if base <= 0.0 { f64::NAN } else { 1.0 - base.powf(1.0 / (2.0 - lambda)) }
    }
}

/// Maximum-likelihood `λ` for one column.
pub fn yeo_johnson_lambda(values: &[f64]) -> f64 {
    let mut best_lambda = 1.0;
    let mut best_llf = f64::NEG_INFINITY;

    for i in -200..=200 {
        let lambda = i as f64 / 100.0;
        let llf = yeo_johnson_llf(values, lambda);
        if llf > best_llf {
            best_llf = llf;
            best_lambda = lambda;
        }
    }

    let start = (best_lambda - 0.01).max(-2.0);
    let end = (best_lambda + 0.01).min(2.0);
    for i in 0..=100 {
        let lambda = start + (end - start) * i as f64 / 100.0;
        let llf = yeo_johnson_llf(values, lambda);
        if llf > best_llf {
            best_llf = llf;
            best_lambda = lambda;
        }
    }

    best_lambda
}

fn yeo_johnson_llf(values: &[f64], lambda: f64) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NEG_INFINITY;
    }
    let transformed: Vec<f64> = values.iter().map(|&x| yeo_johnson(x, lambda)).collect();
    if transformed.iter().any(|v| !v.is_finite()) {
        return f64::NEG_INFINITY;
    }
    let var = variance(&transformed);
    if negligible_variance(var, mean(&transformed), n) {
        return f64::NEG_INFINITY;
    }
    let log_term: f64 = values.iter().map(|&x| x.signum() * x.abs().ln_1p()).sum();
    -0.5 * n as f64 * var.ln() + (lambda - 1.0) * log_term
}

/// Whether a variance is rounding noise relative to the column's magnitude.
///
/// Summing `n` equal values leaves a mean error of order `n·|mean|·ε`, so a
/// variance below that (squared) is treated as zero.
fn negligible_variance(var: f64, mean: f64, n: usize) -> bool {
    let n = n as f64;
    var <= n * f64::EPSILON * var + (n * mean * f64::EPSILON).powi(2)
}

/// Whether a column is constant up to floating-point rounding.
pub fn is_constant(values: &[f64]) -> bool {
    match values.first() {
        None => true,
        Some(first) if values.iter().all(|v| v == first) => true,
        Some(_) => negligible_variance(variance(values), mean(values), values.len()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ColumnParams {
    lambda: f64,
    mean: f64,
    scale: f64,
}

/// Column-wise fitted Yeo–Johnson + standard scaler.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerTransformer {
    params: Vec<ColumnParams>,
}

impl PowerTransformer {
    /// Fit one set of parameters per column (columns given column-major).
    pub fn fit(columns: &[Vec<f64>]) -> Self {
        let params = columns
            .iter()
            .map(|col| {
                if is_constant(col) {
                    return ColumnParams {
                        lambda: 1.0,
                        mean: col.first().map_or(0.0, |&x| yeo_johnson(x, 1.0)),
                        scale: 1.0,
                    };
                }
                let lambda = yeo_johnson_lambda(col);
                let transformed: Vec<f64> = col.iter().map(|&x| yeo_johnson(x, lambda)).collect();
                let std = variance(&transformed).sqrt();
                ColumnParams {
                    lambda,
                    mean: mean(&transformed),
                    scale: if std > f64::EPSILON { std } else { 1.0 },
                }
            })
            .collect();
        Self { params }
    }

    pub fn n_columns(&self) -> usize {
        self.params.len()
    }

    pub fn lambdas(&self) -> Vec<f64> {
        self.params.iter().map(|p| p.lambda).collect()
    }

    pub fn transform(&self, col: usize, x: f64) -> f64 {
        let p = &self.params[col];
        (yeo_johnson(x, p.lambda) - p.mean) / p.scale
    }

    pub fn inverse(&self, col: usize, z: f64) -> f64 {
        let p = &self.params[col];
        inv_yeo_johnson(z * p.scale + p.mean, p.lambda)
    }

    pub fn transform_column(&self, col: usize, values: &[f64]) -> Vec<f64> {
        values.iter().map(|&x| self.transform(col, x)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverse_recovers_input_for_mixed_signs() {
        for &lambda in &[-1.5, 0.0, 0.5, 1.0, 2.0, 2.5] {
            for &x in &[-3.0, -0.5, 0.0, 0.7, 4.0] {
                let back = inv_yeo_johnson(yeo_johnson(x, lambda), lambda);
                assert!((back - x).abs() < 1e-9, "lambda={lambda} x={x} back={back}");
            }
        }
    }

    #[test]
    fn standardizes_columns() {
        let col: Vec<f64> = (1..=50).map(|i| (i as f64).powi(2) / 10.0).collect();
        let pt = PowerTransformer::fit(&[col.clone()]);
        let z = pt.transform_column(0, &col);
        assert!(mean(&z).abs() < 1e-9);
        assert!((variance(&z) - 1.0).abs() < 1e-9);
        for (x, zi) in col.iter().zip(&z) {
            assert!((pt.inverse(0, *zi) - x).abs() < 1e-6);
        }
    }

    #[test]
    fn right_skewed_data_gets_lambda_below_one() {
        let col: Vec<f64> = (0..100).map(|i| (i as f64 / 20.0).exp()).collect();
        assert!(yeo_johnson_lambda(&col) < 1.0);
    }

    #[test]
    fn long_constant_column_is_not_rescaled_by_rounding_noise() {
        let col = vec![13.75; 60];
        assert!(is_constant(&col));
        let pt = PowerTransformer::fit(&[col]);
        assert_eq!(pt.lambdas(), vec![1.0]);
        assert_eq!(pt.transform(0, 13.75), 0.0);
        assert!((pt.transform(0, 14.0) - 0.25).abs() < 1e-12);
        assert!(!is_constant(&[13.75, 13.75, 14.0]));
    }

    #[test]
    fn constant_column_keeps_unit_scale() {
        let pt = PowerTransformer::fit(&[vec![2.0, 2.0, 2.0]]);
        assert_eq!(pt.lambdas(), vec![1.0]);
        assert_eq!(pt.transform(0, 2.0), 0.0);
        assert!((pt.inverse(0, 0.0) - 2.0).abs() < 1e-12);
    }
}
