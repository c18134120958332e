//! Gaussian-process surrogate for the optimizer.
//!
//! Inputs live in the unit cube, targets are standardized before fitting.
//! The kernel is squared-exponential with unit signal variance and a single
//! isotropic length scale picked from [`LENGTH_SCALE_GRID`] by log marginal
//! likelihood.

use nalgebra::{DMatrix, DVector};
use std::f64::consts::PI;

pub const LENGTH_SCALE_GRID: [f64; 9] = [0.05, 0.1, 0.15, 0.2, 0.3, 0.5, 0.75, 1.0, 2.0];
pub const NOISE_VARIANCE: f64 = 1e-6;

/// Added to the diagonal when the plain kernel matrix is not positive definite.
const JITTER_STEPS: [f64; 4] = [0.0, 1e-8, 1e-6, 1e-4];

#[derive(Debug, Clone)]
pub struct GaussianProcess {
    inputs: Vec<DVector<f64>>,
    /// Lower Cholesky factor of the kernel matrix.
    l: DMatrix<f64>,
    alpha: DVector<f64>,
    length_scale: f64,
    y_mean: f64,
    y_std: f64,
}

struct Factorization {
    l: DMatrix<f64>,
    alpha: DVector<f64>,
    log_marginal_likelihood: f64,
}

impl GaussianProcess {
    /// Fit to `(inputs, targets)`. Returns `None` for an empty or
    /// numerically singular training set.
    pub fn fit(inputs: &[Vec<f64>], targets: &[f64]) -> Option<Self> {
        if inputs.is_empty() || inputs.len() != targets.len() {
            return None;
        }

        let n = targets.len() as f64;
        let y_mean = targets.iter().sum::<f64>() / n;
        let var = targets.iter().map(|y| (y - y_mean).powi(2)).sum::<f64>() / n;
        let y_std = if var.sqrt() > 1e-12 { var.sqrt() } else { 1.0 };
        let y = DVector::from_iterator(targets.len(), targets.iter().map(|t| (t - y_mean) / y_std));
        let xs: Vec<DVector<f64>> = inputs
            .iter()
            .map(|x| DVector::from_column_slice(x))
            .collect();

        let mut best: Option<(f64, Factorization)> = None;
        for &length_scale in &LENGTH_SCALE_GRID {
            let Some(f) = factorize(&xs, &y, length_scale) else {
                continue;
            };
            if best
                .as_ref()
                .is_none_or(|(_, b)| f.log_marginal_likelihood > b.log_marginal_likelihood)
            {
                best = Some((length_scale, f));
            }
        }

        best.map(|(length_scale, f)| GaussianProcess {
            inputs: xs,
            l: f.l,
            alpha: f.alpha,
            length_scale,
            y_mean,
            y_std,
        })
    }

    pub fn length_scale(&self) -> f64 {
        self.length_scale
    }

    /// Posterior mean and standard deviation at `x`, in target units.
    pub fn predict(&self, x: &[f64]) -> (f64, f64) {
        let x = DVector::from_column_slice(x);
        let k = DVector::from_iterator(
            self.inputs.len(),
            self.inputs.iter().map(|xi| kernel(xi, &x, self.length_scale)),
        );
        let mean = k.dot(&self.alpha);
        let explained = self
            .l
            .solve_lower_triangular(&k)
            .map_or(0.0, |v| v.norm_squared());
        let var = (1.0 - explained).max(0.0);
        (self.y_mean + mean * self.y_std, var.sqrt() * self.y_std)
    }
}

fn kernel(a: &DVector<f64>, b: &DVector<f64>, length_scale: f64) -> f64 {
    let sq = (a - b).norm_squared();
    (-0.5 * sq / (length_scale * length_scale)).exp()
}

fn kernel_matrix(xs: &[DVector<f64>], length_scale: f64, diagonal: f64) -> DMatrix<f64> {
    let n = xs.len();
    DMatrix::from_fn(n, n, |i, j| {
        let k = kernel(&xs[i], &xs[j], length_scale);
        if i == j { k + diagonal } else { k }
    })
}

fn factorize(xs: &[DVector<f64>], y: &DVector<f64>, length_scale: f64) -> Option<Factorization> {
    for jitter in JITTER_STEPS {
        let k = kernel_matrix(xs, length_scale, NOISE_VARIANCE + jitter);
        let Some(chol) = k.cholesky() else {
            continue;
        };
        let alpha = chol.solve(y);
        let l = chol.unpack();
        let log_det: f64 = l.diagonal().iter().map(|d| d.ln()).sum();
        let n = y.len() as f64;
        let lml = -0.5 * y.dot(&alpha) - log_det - 0.5 * n * (2.0 * PI).ln();
        if !lml.is_finite() {
            continue;
        }
        return Some(Factorization {
            l,
            alpha,
            log_marginal_likelihood: lml,
        });
    }
    None
}
