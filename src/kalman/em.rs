//! Expectation-maximization for the model parameters.
//!
//! The E-step is the RTS smoother. The M-step re-estimates the parameters
//! enabled in `EmVars` in closed form; `Q` is updated after `A` and `R` after
//! `C`, so each uses its freshly updated partner.

use log::{debug, info};
use nalgebra::{DMatrix, DVector};

use super::filter::{KalmanFilter, SmoothResult};
use super::params::KalmanParams;
use crate::internal::numpy::row_has_nan;
use crate::internal::scipy::{inv_sym_pos, symmetrize};
use crate::Result;

impl KalmanFilter {
    /// Run `n_iter` EM iterations on `z`, updating the parameters in place.
    ///
    /// # Returns
    /// The log-likelihood of `z` under the parameters at the start of each
    /// iteration.
    pub fn em(&mut self, z: &DMatrix<f64>, n_iter: usize) -> Result<Vec<f64>> {
        self.check_observations(z)?;

        let mut log_likelihoods = Vec::with_capacity(n_iter);
        for iter in 0..n_iter {
            let smoothed = self.smooth(z)?;
            info!(
                "EM iteration {}/{}: log likelihood {:.6}",
                iter + 1,
                n_iter,
                smoothed.log_likelihood
            );
            log_likelihoods.push(smoothed.log_likelihood);

            let next = maximize(&self.params, z, &smoothed)?;
            next.validate()?;
            self.params = next;
        }

        Ok(log_likelihoods)
    }
}

/// `E[x_t x_t^T]` under the smoothed posterior.
fn second_moment(s: &SmoothResult, t: usize) -> DMatrix<f64> {
    let m = mean_at(s, t);
    &s.covariances[t] + &m * m.transpose()
}

fn mean_at(s: &SmoothResult, t: usize) -> DVector<f64> {
    s.means.row(t).transpose()
}

fn maximize(params: &KalmanParams, z: &DMatrix<f64>, s: &SmoothResult) -> Result<KalmanParams> {
    let vars = params.em_vars;
    let mut next = params.clone();
    let n_timesteps = z.nrows();
    let observed: Vec<usize> = (0..n_timesteps).filter(|&t| !row_has_nan(z, t)).collect();

    if observed.is_empty() {
        debug!("no observed time steps, keeping C and R");
    } else {
        if vars.observation_matrix {
            next.c = observation_matrix(params, z, s, &observed)?;
        }
        if vars.observation_covariance {
            next.r = observation_covariance(&next, z, s, &observed)?;
        }
    }

    if n_timesteps < 2 {
        debug!("single time step, keeping A and Q");
    } else {
        if vars.transition_matrix {
            next.a = transition_matrix(params, s)?;
        }
        if vars.transition_covariance {
            next.q = transition_covariance(&next, s)?;
        }
    }

    if vars.initial_mean {
        next.x_0 = mean_at(s, 0);
    }
    if vars.initial_covariance {
        let diff = mean_at(s, 0) - &next.x_0;
        next.v_0 = &s.covariances[0] + &diff * diff.transpose();
        symmetrize(&mut next.v_0);
    }

    Ok(next)
}

fn observation_matrix(
    params: &KalmanParams,
    z: &DMatrix<f64>,
    s: &SmoothResult,
    observed: &[usize],
) -> Result<DMatrix<f64>> {
    let n = params.n_dim_state();
    let mut cross = DMatrix::zeros(params.n_dim_obs(), n);
    let mut moment = DMatrix::zeros(n, n);

    for &t in observed {
        let target: DVector<f64> = z.row(t).transpose() - params.d.at(t)?;
        cross += target * mean_at(s, t).transpose();
        moment += second_moment(s, t);
    }

    Ok(cross * inv_sym_pos(&moment)?)
}

fn observation_covariance(
    params: &KalmanParams,
    z: &DMatrix<f64>,
    s: &SmoothResult,
    observed: &[usize],
) -> Result<DMatrix<f64>> {
    let c = &params.c;
    let mut r = DMatrix::zeros(params.n_dim_obs(), params.n_dim_obs());

    for &t in observed {
        let residual: DVector<f64> =
            z.row(t).transpose() - c * mean_at(s, t) - params.d.at(t)?;
        r += &residual * residual.transpose() + c * &s.covariances[t] * c.transpose();
    }

    r /= observed.len() as f64;
    symmetrize(&mut r);
    Ok(r)
}

fn transition_matrix(params: &KalmanParams, s: &SmoothResult) -> Result<DMatrix<f64>> {
    let n = params.n_dim_state();
    let mut cross = DMatrix::zeros(n, n);
    let mut moment = DMatrix::zeros(n, n);

    for t in 1..s.means.nrows() {
        let shifted = mean_at(s, t) - params.b.at(t - 1)?;
        cross += &s.pairwise_covariances[t] + shifted * mean_at(s, t - 1).transpose();
        moment += second_moment(s, t - 1);
    }

    Ok(cross * inv_sym_pos(&moment)?)
}

fn transition_covariance(params: &KalmanParams, s: &SmoothResult) -> Result<DMatrix<f64>> {
    let a = &params.a;
    let n_timesteps = s.means.nrows();
    let mut q = DMatrix::zeros(params.n_dim_state(), params.n_dim_state());

    for t in 1..n_timesteps {
        let err = mean_at(s, t) - a * mean_at(s, t - 1) - params.b.at(t - 1)?;
        let pairwise = &s.pairwise_covariances[t];
        q += &err * err.transpose()
            + a * &s.covariances[t - 1] * a.transpose()
            + &s.covariances[t]
            - pairwise * a.transpose()
            - a * pairwise.transpose();
    }

    q /= (n_timesteps - 1) as f64;
    symmetrize(&mut q);
    Ok(q)
}
