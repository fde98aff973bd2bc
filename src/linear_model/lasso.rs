//! Lasso: linear regression with an L1 penalty, fit by coordinate descent.

use log::{debug, warn};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::base::{Estimator, Predict, Regressor};
use crate::internal::numpy::{check_array, check_consistent_length};
use crate::{Error, Result};

/// Configuration for [`Lasso`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LassoParams {
    /// Weight of the L1 penalty
    pub alpha: f64,
    /// Center the data and fit an intercept
    pub fit_intercept: bool,
    /// Maximum number of coordinate descent sweeps
    pub max_iter: usize,
    /// Tolerance on the relative update and on the duality gap
    pub tol: f64,
}

impl LassoParams {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            ..Self::default()
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.alpha.is_nan() || self.alpha < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "alpha must be non-negative, got {}",
                self.alpha
            )));
        }
        if self.max_iter == 0 {
            return Err(Error::InvalidConfig(
                "max_iter must be at least 1".to_string(),
            ));
        }
        if self.tol.is_nan() || self.tol <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "tol must be positive, got {}",
                self.tol
            )));
        }
        Ok(())
    }
}

impl Default for LassoParams {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            fit_intercept: true,
            max_iter: 1000,
            tol: 1e-4,
        }
    }
}

/// Outcome of one coordinate descent run.
#[derive(Clone, Debug)]
struct Descent {
    coef: DVector<f64>,
    n_iter: usize,
    dual_gap: f64,
    converged: bool,
}

fn soft_threshold(value: f64, threshold: f64) -> f64 {
    value.signum() * (value.abs() - threshold).max(0.0)
}

/// Duality gap of `(1/2)||y - Xw||^2 + alpha_n ||w||_1`.
fn duality_gap(x: &DMatrix<f64>, y: &DVector<f64>, w: &DVector<f64>, residual: &DVector<f64>, alpha_n: f64) -> f64 {
    let dual_norm = (x.transpose() * residual).amax();
    let r_norm2 = residual.norm_squared();
    let w_norm1 = w.lp_norm(1);

    let (scale, a_norm2) = if dual_norm > alpha_n {
        let scale = alpha_n / dual_norm;
        (scale, r_norm2 * scale * scale)
    } else {
        (1.0, r_norm2)
    };

    0.5 * (r_norm2 + a_norm2) + alpha_n * w_norm1 - scale * residual.dot(y)
}

/// Cyclic coordinate descent on centered data.
fn coordinate_descent(x: &DMatrix<f64>, y: &DVector<f64>, params: &LassoParams) -> Descent {
    let (n_samples, n_features) = x.shape();
    let alpha_n = params.alpha * n_samples as f64;
    let col_norms: Vec<f64> = (0..n_features).map(|j| x.column(j).norm_squared()).collect();
    let tol = params.tol * y.norm_squared();

    let mut w = DVector::zeros(n_features);
    let mut residual = y.clone();
    let mut dual_gap = duality_gap(x, y, &w, &residual, alpha_n);

    for iter in 0..params.max_iter {
        let mut w_max: f64 = 0.0;
        let mut d_w_max: f64 = 0.0;

        for j in 0..n_features {
            if col_norms[j] == 0.0 {
                continue;
            }
            let w_old = w[j];
            let col = x.column(j);
            if w_old != 0.0 {
                residual.axpy(w_old, &col, 1.0);
            }

            let rho = col.dot(&residual);
            let w_new = soft_threshold(rho, alpha_n) / col_norms[j];
            if w_new != 0.0 {
                residual.axpy(-w_new, &col, 1.0);
            }
            w[j] = w_new;

            d_w_max = d_w_max.max((w_new - w_old).abs());
            w_max = w_max.max(w_new.abs());
        }

        let last = iter + 1 == params.max_iter;
        if w_max == 0.0 || d_w_max / w_max < params.tol || last {
            dual_gap = duality_gap(x, y, &w, &residual, alpha_n);
            if dual_gap <= tol {
                return Descent {
                    coef: w,
                    n_iter: iter + 1,
                    dual_gap,
                    converged: true,
                };
            }
        }
    }

    Descent {
        coef: w,
        n_iter: params.max_iter,
        dual_gap,
        converged: false,
    }
}

/// Linear model trained with an L1 prior as regularizer.
///
/// Minimizes `(1 / (2 * n_samples)) * ||y - Xw - c||^2 + alpha * ||w||_1`.
#[derive(Clone, Debug)]
pub struct Lasso {
    params: LassoParams,
    coef: Option<DVector<f64>>,
    intercept: f64,
    n_iter: usize,
    dual_gap: f64,
}

impl Lasso {
    pub fn new(params: LassoParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            coef: None,
            intercept: 0.0,
            n_iter: 0,
            dual_gap: 0.0,
        })
    }

    pub fn fit(&mut self, x: &DMatrix<f64>, y: &DVector<f64>) -> Result<&mut Self> {
        check_array(x)?;
        check_consistent_length(x.nrows(), y.len())?;
        if y.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidInput(
                "targets must be finite".to_string(),
            ));
        }

        let (x_centered, y_centered, x_mean, y_mean) = if self.params.fit_intercept {
            let x_mean = x.row_mean();
            let y_mean = y.mean();
            let mut xc = x.clone();
            for mut row in xc.row_iter_mut() {
                row -= &x_mean;
            }
            (xc, y.add_scalar(-y_mean), Some(x_mean), y_mean)
        } else {
            (x.clone(), y.clone(), None, 0.0)
        };

        let descent = coordinate_descent(&x_centered, &y_centered, &self.params);
        if descent.converged {
            debug!(
                "lasso converged after {} iterations (duality gap {:.3e})",
                descent.n_iter, descent.dual_gap
            );
        } else {
            warn!(
                "lasso did not converge after {} iterations (duality gap {:.3e}), consider increasing max_iter",
                descent.n_iter, descent.dual_gap
            );
        }

        self.intercept = match x_mean {
            Some(x_mean) => y_mean - (x_mean * &descent.coef)[0],
            None => 0.0,
        };
        self.n_iter = descent.n_iter;
        self.dual_gap = descent.dual_gap;
        self.coef = Some(descent.coef);
        Ok(self)
    }

    /// Fitted coefficients, one per feature.
    pub fn coef(&self) -> Result<&DVector<f64>> {
        self.coef.as_ref().ok_or(Error::NotFitted)
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Coordinate descent sweeps used by the last fit.
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    pub fn dual_gap(&self) -> f64 {
        self.dual_gap
    }
}

impl Estimator for Lasso {
    type Params = LassoParams;

    fn params(&self) -> &LassoParams {
        &self.params
    }

    fn set_params(&mut self, params: LassoParams) -> Result<()> {
        params.validate()?;
        self.params = params;
        Ok(())
    }
}

impl Predict for Lasso {
    type Output = DVector<f64>;

    fn predict(&self, x: &DMatrix<f64>) -> Result<DVector<f64>> {
        let coef = self.coef()?;
        if x.ncols() != coef.len() {
            return Err(Error::ShapeMismatch {
                expected: format!("{} features", coef.len()),
                got: format!("{} features", x.ncols()),
            });
        }
        Ok((x * coef).add_scalar(self.intercept))
    }
}

impl Regressor for Lasso {}
