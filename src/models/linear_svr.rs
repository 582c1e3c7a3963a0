//! Linear support vector regression (ε-insensitive L1 loss), solved in the
//! dual by coordinate descent with shrinking.
//!
//! Primal:
//!
//! ```text
//! min_w  ½‖w‖² + C Σ max(0, |y_i - w·x_i| - ε)
//! ```
//!
//! The bias is learned as the weight of an extra constant feature, so it is
//! regularised like every other weight. Coordinates are visited in a random
//! order each pass; the order comes from a seeded `StdRng`, so fits are
//! reproducible.

use nalgebra::{DMatrix, DVector};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::warn;

use crate::error::AppError;
use crate::models::regressor::{LinearFit, Regressor, check_shapes};

#[derive(Debug, Clone)]
pub struct LinearSvr {
    pub c: f64,
    pub epsilon: f64,
    pub tol: f64,
    pub max_iter: usize,
    /// Value of the constant feature carrying the bias.
    pub intercept_scaling: f64,
    pub seed: u64,
    fit: Option<LinearFit>,
    n_iter: usize,
}

impl LinearSvr {
    pub fn new(seed: u64) -> Self {
        Self {
            c: 1.0,
            epsilon: 0.0,
            tol: 1e-4,
            max_iter: 100_000,
            intercept_scaling: 1.0,
            seed,
            fit: None,
            n_iter: 0,
        }
    }

    pub fn coefficients(&self) -> Option<&LinearFit> {
        self.fit.as_ref()
    }

    /// Outer passes used by the last fit.
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }
}

impl Regressor for LinearSvr {
    fn name(&self) -> &'static str {
        "LinearSVR"
    }

    fn fit(&mut self, x: &DMatrix<f64>, y: &DVector<f64>) -> Result<(), AppError> {
        check_shapes(x, y, self.name())?;
        let (l, p) = x.shape();
        let bias = self.intercept_scaling;
        let upper = self.c;

        // Row-major copy with the bias column appended.
        let rows: Vec<Vec<f64>> = (0..l)
            .map(|i| {
                let mut r: Vec<f64> = x.row(i).iter().copied().collect();
                r.push(bias);
                r
            })
            .collect();
        let qd: Vec<f64> = rows.iter().map(|r| r.iter().map(|v| v * v).sum()).collect();

        let mut w = vec![0.0; p + 1];
        let mut beta = vec![0.0; l];
        let mut index: Vec<usize> = (0..l).collect();
        let mut active = l;
        let mut gmax_old = f64::INFINITY;
        let mut gnorm1_init = -1.0;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut iter = 0;

        while iter < self.max_iter {
            let mut gmax_new: f64 = 0.0;
            let mut gnorm1_new = 0.0;
            index[..active].shuffle(&mut rng);

            let mut s = 0;
            while s < active {
                let i = index[s];
                let xi = &rows[i];
                let g = -y[i] + dot(&w, xi);
                let gp = g + self.epsilon;
                let gn = g - self.epsilon;
                let h = qd[i];

                let violation = if beta[i] == 0.0 {
                    if gp < 0.0 {
                        -gp
                    } else if gn > 0.0 {
                        gn
                    } else if gp > gmax_old && gn < -gmax_old {
                        active -= 1;
                        index.swap(s, active);
                        continue;
                    } else {
                        0.0
                    }
                } else if beta[i] >= upper {
                    if gp > 0.0 {
                        gp
                    } else if gp < -gmax_old {
                        active -= 1;
                        index.swap(s, active);
                        continue;
                    } else {
                        0.0
                    }
                } else if beta[i] <= -upper {
                    if gn < 0.0 {
                        -gn
                    } else if gn > gmax_old {
                        active -= 1;
                        index.swap(s, active);
                        continue;
                    } else {
                        0.0
                    }
                } else if beta[i] > 0.0 {
                    gp.abs()
                } else {
                    gn.abs()
                };

                gmax_new = gmax_new.max(violation);
                gnorm1_new += violation;
                s += 1;

                if h <= 0.0 {
                    continue;
                }
                // Newton step on the one-dimensional dual, clipped to the box.
                let d = if gp < h * beta[i] {
                    -gp / h
                } else if gn > h * beta[i] {
                    -gn / h
                } else {
                    -beta[i]
                };
                if d.abs() < 1e-12 {
                    continue;
                }
                let beta_old = beta[i];
                beta[i] = (beta[i] + d).clamp(-upper, upper);
                let d = beta[i] - beta_old;
                if d != 0.0 {
                    for (wj, xij) in w.iter_mut().zip(xi) {
                        *wj += d * xij;
                    }
                }
            }

            if iter == 0 {
                gnorm1_init = gnorm1_new;
            }
            iter += 1;

            if gnorm1_new <= self.tol * gnorm1_init {
                if active == l {
                    break;
                }
                active = l;
                gmax_old = f64::INFINITY;
                continue;
            }
            gmax_old = gmax_new;
        }

        if iter >= self.max_iter {
            warn!(max_iter = self.max_iter, "LinearSVR reached the iteration limit");
        }
        self.n_iter = iter;

        let intercept = w[p] * bias;
        w.truncate(p);
        self.fit = Some(LinearFit { coef: w, intercept }.validated(self.name())?);
        Ok(())
    }

    fn predict_row(&self, row: &[f64]) -> f64 {
        self.fit.as_ref().map_or(f64::NAN, |f| f.predict_row(row))
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
