//! Kalman filter, RTS smoother and sampling.

use nalgebra::{DMatrix, DVector};
use rand::Rng;

use super::params::KalmanParams;
use crate::base::Estimator;
use crate::internal::numpy::{multivariate_normal, row_has_nan};
use crate::internal::scipy::{gaussian_log_pdf, inv_sym_pos, symmetrize};
use crate::{Error, Result};

/// Output of the forward pass.
#[derive(Clone, Debug)]
pub struct FilterResult {
    /// Filtered means `E[x_t | z_{0:t}]` (T x n_state)
    pub means: DMatrix<f64>,
    /// Filtered covariances, one per time step
    pub covariances: Vec<DMatrix<f64>>,
    /// One-step predictions `E[x_t | z_{0:t-1}]` (T x n_state)
    pub predicted_means: DMatrix<f64>,
    pub predicted_covariances: Vec<DMatrix<f64>>,
    /// `log p(z_{0:T-1})`, summed over observed time steps
    pub log_likelihood: f64,
}

/// Output of the Rauch-Tung-Striebel backward pass.
#[derive(Clone, Debug)]
pub struct SmoothResult {
    /// Smoothed means `E[x_t | z_{0:T-1}]` (T x n_state)
    pub means: DMatrix<f64>,
    pub covariances: Vec<DMatrix<f64>>,
    /// `Cov(x_t, x_{t-1} | z_{0:T-1})`; the entry for t = 0 is zero
    pub pairwise_covariances: Vec<DMatrix<f64>>,
    pub log_likelihood: f64,
}

/// Linear-Gaussian state space model.
#[derive(Clone, Debug)]
pub struct KalmanFilter {
    pub(crate) params: KalmanParams,
}

impl KalmanFilter {
    pub fn new(params: KalmanParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn n_dim_state(&self) -> usize {
        self.params.n_dim_state()
    }

    pub fn n_dim_obs(&self) -> usize {
        self.params.n_dim_obs()
    }

    /// Check an observation sequence; NaN marks a missing entry.
    pub(crate) fn check_observations(&self, z: &DMatrix<f64>) -> Result<()> {
        if z.nrows() == 0 {
            return Err(Error::InvalidInput(
                "observations must contain at least one time step".to_string(),
            ));
        }
        if z.ncols() != self.n_dim_obs() {
            return Err(Error::ShapeMismatch {
                expected: format!("(T, {})", self.n_dim_obs()),
                got: format!("({}, {})", z.nrows(), z.ncols()),
            });
        }
        if z.iter().any(|v| v.is_infinite()) {
            return Err(Error::InvalidInput(
                "observations contain infinity".to_string(),
            ));
        }
        self.params.b.check_steps(z.nrows() - 1, "b")?;
        self.params.d.check_steps(z.nrows(), "d")?;
        Ok(())
    }

    /// Estimate the hidden states from observations up to each time step.
    ///
    /// Rows of `z` containing NaN are treated as missing: the update step is
    /// skipped and they do not contribute to the log-likelihood.
    pub fn filter(&self, z: &DMatrix<f64>) -> Result<FilterResult> {
        self.check_observations(z)?;

        let p = &self.params;
        let n_timesteps = z.nrows();
        let n = self.n_dim_state();

        let mut means = DMatrix::zeros(n_timesteps, n);
        let mut predicted_means = DMatrix::zeros(n_timesteps, n);
        let mut covariances = Vec::with_capacity(n_timesteps);
        let mut predicted_covariances = Vec::with_capacity(n_timesteps);
        let mut log_likelihood = 0.0;

        let mut x = p.x_0.clone();
        let mut cov = p.v_0.clone();

        for t in 0..n_timesteps {
            // Predict
            if t > 0 {
                x = &p.a * &x + p.b.at(t - 1)?;
                cov = &p.a * &cov * p.a.transpose() + &p.q;
                symmetrize(&mut cov);
            }
            predicted_means.set_row(t, &x.transpose());
            predicted_covariances.push(cov.clone());

            // Update
            if !row_has_nan(z, t) {
                let observed: DVector<f64> = z.row(t).transpose();
                let innovation = observed - (&p.c * &x + p.d.at(t)?);
                let s = &p.c * &cov * p.c.transpose() + &p.r;

                log_likelihood += gaussian_log_pdf(&innovation, &s)?;

                let gain = &cov * p.c.transpose() * inv_sym_pos(&s)?;
                x += &gain * innovation;
                cov = &cov - &gain * &p.c * &cov;
                symmetrize(&mut cov);
            }

            means.set_row(t, &x.transpose());
            covariances.push(cov.clone());
        }

        Ok(FilterResult {
            means,
            covariances,
            predicted_means,
            predicted_covariances,
            log_likelihood,
        })
    }

    /// Estimate the hidden states using all observations.
    pub fn smooth(&self, z: &DMatrix<f64>) -> Result<SmoothResult> {
        let filtered = self.filter(z)?;
        let n_timesteps = z.nrows();
        let n = self.n_dim_state();
        let a = &self.params.a;

        let mut means = filtered.means.clone();
        let mut covariances = filtered.covariances.clone();
        let mut gains: Vec<DMatrix<f64>> = vec![DMatrix::zeros(n, n); n_timesteps];

        for t in (0..n_timesteps.saturating_sub(1)).rev() {
            let pred_inv = inv_sym_pos(&filtered.predicted_covariances[t + 1])?;
            let gain = &filtered.covariances[t] * a.transpose() * pred_inv;

            let next_mean: DVector<f64> = means.row(t + 1).transpose();
            let next_pred: DVector<f64> = filtered.predicted_means.row(t + 1).transpose();
            let filt_mean: DVector<f64> = filtered.means.row(t).transpose();
            let mean = filt_mean + &gain * (next_mean - next_pred);
            means.set_row(t, &mean.transpose());

            let mut cov = &filtered.covariances[t]
                + &gain
                    * (&covariances[t + 1] - &filtered.predicted_covariances[t + 1])
                    * gain.transpose();
            symmetrize(&mut cov);
            covariances[t] = cov;
            gains[t] = gain;
        }

        let mut pairwise_covariances = Vec::with_capacity(n_timesteps);
        pairwise_covariances.push(DMatrix::zeros(n, n));
        for t in 1..n_timesteps {
            pairwise_covariances.push(&covariances[t] * gains[t - 1].transpose());
        }

        Ok(SmoothResult {
            means,
            covariances,
            pairwise_covariances,
            log_likelihood: filtered.log_likelihood,
        })
    }

    /// Log-likelihood of `z` under the current parameters.
    pub fn log_likelihood(&self, z: &DMatrix<f64>) -> Result<f64> {
        Ok(self.filter(z)?.log_likelihood)
    }

    /// Draw `n_timesteps` states and observations from the model.
    ///
    /// # Returns
    /// `(states, observations)` of shapes (T x n_state) and (T x n_obs).
    pub fn sample<R: Rng + ?Sized>(
        &self,
        n_timesteps: usize,
        rng: &mut R,
    ) -> Result<(DMatrix<f64>, DMatrix<f64>)> {
        let p = &self.params;
        p.b.check_steps(n_timesteps.saturating_sub(1), "b")?;
        p.d.check_steps(n_timesteps, "d")?;

        let mut states = DMatrix::zeros(n_timesteps, self.n_dim_state());
        let mut observations = DMatrix::zeros(n_timesteps, self.n_dim_obs());
        let zero_obs = DVector::zeros(self.n_dim_obs());
        let zero_state = DVector::zeros(self.n_dim_state());

        let mut x = multivariate_normal(&p.x_0, &p.v_0, rng)?;
        for t in 0..n_timesteps {
            if t > 0 {
                let noise = multivariate_normal(&zero_state, &p.q, rng)?;
                x = &p.a * &x + p.b.at(t - 1)? + noise;
            }
            let noise = multivariate_normal(&zero_obs, &p.r, rng)?;
            let z = &p.c * &x + p.d.at(t)? + noise;

            states.set_row(t, &x.transpose());
            observations.set_row(t, &z.transpose());
        }

        Ok((states, observations))
    }

    /// Serialize the model parameters to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.params)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Self::new(serde_json::from_str(json)?)
    }
}

impl Estimator for KalmanFilter {
    type Params = KalmanParams;

    fn params(&self) -> &KalmanParams {
        &self.params
    }

    fn set_params(&mut self, params: KalmanParams) -> Result<()> {
        params.validate()?;
        self.params = params;
        Ok(())
    }
}
