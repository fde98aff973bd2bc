//! Linear-Gaussian state space models.
//!
//! [`KalmanFilter`] runs the Kalman filter forward pass, the
//! Rauch-Tung-Striebel smoother and EM parameter estimation on an
//! observation sequence stored as a (T x n_obs) matrix.

mod em;
mod filter;
mod params;

pub use filter::{FilterResult, KalmanFilter, SmoothResult};
pub use params::{EmVars, KalmanParams, Offsets};
