//! Parameters of a linear-Gaussian state space model.

use std::fmt;
use std::str::FromStr;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Offset vectors added to the transition (`b`) or observation (`d`) equations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Offsets {
    /// Same offset at every time step.
    Constant(DVector<f64>),
    /// One offset per time step.
    PerStep(Vec<DVector<f64>>),
}

impl Offsets {
    pub fn zeros(dim: usize) -> Self {
        Offsets::Constant(DVector::zeros(dim))
    }

    /// Offset for time step `t`.
    pub fn at(&self, t: usize) -> Result<&DVector<f64>> {
        match self {
            Offsets::Constant(v) => Ok(v),
            Offsets::PerStep(steps) => steps.get(t).ok_or_else(|| {
                Error::InvalidInput(format!(
                    "no offset for time step {} ({} given)",
                    t,
                    steps.len()
                ))
            }),
        }
    }

    fn check_dim(&self, dim: usize, name: &str) -> Result<()> {
        let bad = match self {
            Offsets::Constant(v) => (v.len() != dim).then_some(v.len()),
            Offsets::PerStep(steps) => steps.iter().map(|v| v.len()).find(|&len| len != dim),
        };
        match bad {
            Some(got) => Err(Error::ShapeMismatch {
                expected: format!("{} of length {}", name, dim),
                got: format!("length {}", got),
            }),
            None => Ok(()),
        }
    }

    /// Per-step offsets must cover `n_steps` steps.
    pub(crate) fn check_steps(&self, n_steps: usize, name: &str) -> Result<()> {
        match self {
            Offsets::PerStep(steps) if steps.len() < n_steps => Err(Error::InvalidInput(format!(
                "{} needs {} per-step offsets, got {}",
                name,
                n_steps,
                steps.len()
            ))),
            _ => Ok(()),
        }
    }
}

/// Which parameters the EM algorithm re-estimates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmVars {
    pub transition_matrix: bool,
    pub observation_matrix: bool,
    pub transition_covariance: bool,
    pub observation_covariance: bool,
    pub initial_mean: bool,
    pub initial_covariance: bool,
}

impl EmVars {
    pub fn all() -> Self {
        Self {
            transition_matrix: true,
            observation_matrix: true,
            transition_covariance: true,
            observation_covariance: true,
            initial_mean: true,
            initial_covariance: true,
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::none()
    }
}

impl FromStr for EmVars {
    type Err = Error;

    /// Parse `"all"`, `"none"` or a comma separated list of
    /// `A`, `C`, `Q`, `R`, `x_0`, `V_0`.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "all" => return Ok(Self::all()),
            "none" | "" => return Ok(Self::none()),
            _ => {}
        }

        let mut vars = Self::none();
        for name in s.split(',').map(str::trim) {
            match name {
                "A" => vars.transition_matrix = true,
                "C" => vars.observation_matrix = true,
                "Q" => vars.transition_covariance = true,
                "R" => vars.observation_covariance = true,
                "x_0" => vars.initial_mean = true,
                "V_0" => vars.initial_covariance = true,
                _ => return Err(Error::UnknownMode(format!("EM variable '{}'", name))),
            }
        }
        Ok(vars)
    }
}

impl fmt::Display for EmVars {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::all() {
            return f.write_str("all");
        }
        let names: Vec<&str> = [
            (self.transition_matrix, "A"),
            (self.observation_matrix, "C"),
            (self.transition_covariance, "Q"),
            (self.observation_covariance, "R"),
            (self.initial_mean, "x_0"),
            (self.initial_covariance, "V_0"),
        ]
        .iter()
        .filter(|(on, _)| *on)
        .map(|(_, name)| *name)
        .collect();
        if names.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&names.join(","))
        }
    }
}

/// Model matrices.
///
/// ```text
/// x_{t+1} = A x_t + b_t + N(0, Q)
/// z_t     = C x_t + d_t + N(0, R)
/// x_0    ~ N(x_0, V_0)
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KalmanParams {
    /// Transition matrix (n_state x n_state)
    pub a: DMatrix<f64>,
    /// Observation matrix (n_obs x n_state)
    pub c: DMatrix<f64>,
    /// Transition covariance (n_state x n_state)
    pub q: DMatrix<f64>,
    /// Observation covariance (n_obs x n_obs)
    pub r: DMatrix<f64>,
    /// Transition offsets
    pub b: Offsets,
    /// Observation offsets
    pub d: Offsets,
    /// Initial state mean
    pub x_0: DVector<f64>,
    /// Initial state covariance
    pub v_0: DMatrix<f64>,
    #[serde(default)]
    pub em_vars: EmVars,
}

impl KalmanParams {
    /// Identity matrices and zero offsets; nothing is learned by EM.
    pub fn with_dims(n_dim_state: usize, n_dim_obs: usize) -> Self {
        let mut c = DMatrix::zeros(n_dim_obs, n_dim_state);
        for i in 0..n_dim_obs.min(n_dim_state) {
            c[(i, i)] = 1.0;
        }

        Self {
            a: DMatrix::identity(n_dim_state, n_dim_state),
            c,
            q: DMatrix::identity(n_dim_state, n_dim_state),
            r: DMatrix::identity(n_dim_obs, n_dim_obs),
            b: Offsets::zeros(n_dim_state),
            d: Offsets::zeros(n_dim_obs),
            x_0: DVector::zeros(n_dim_state),
            v_0: DMatrix::identity(n_dim_state, n_dim_state),
            em_vars: EmVars::none(),
        }
    }

    pub fn n_dim_state(&self) -> usize {
        self.a.nrows()
    }

    pub fn n_dim_obs(&self) -> usize {
        self.c.nrows()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let n = self.n_dim_state();
        let m = self.n_dim_obs();
        if n == 0 || m == 0 {
            return Err(Error::InvalidConfig(
                "state and observation dimensions must be at least 1".to_string(),
            ));
        }

        check_shape(&self.a, (n, n), "A")?;
        check_shape(&self.c, (m, n), "C")?;
        check_shape(&self.q, (n, n), "Q")?;
        check_shape(&self.r, (m, m), "R")?;
        check_shape(&self.v_0, (n, n), "V_0")?;
        if self.x_0.len() != n {
            return Err(Error::ShapeMismatch {
                expected: format!("x_0 of length {}", n),
                got: format!("length {}", self.x_0.len()),
            });
        }
        self.b.check_dim(n, "b")?;
        self.d.check_dim(m, "d")?;

        let values = [&self.a, &self.c, &self.q, &self.r, &self.v_0];
        if values.iter().any(|mat| mat.iter().any(|v| !v.is_finite()))
            || self.x_0.iter().any(|v| !v.is_finite())
        {
            return Err(Error::InvalidConfig(
                "model parameters must be finite".to_string(),
            ));
        }

        Ok(())
    }
}

fn check_shape(mat: &DMatrix<f64>, expected: (usize, usize), name: &str) -> Result<()> {
    if mat.shape() != expected {
        return Err(Error::ShapeMismatch {
            expected: format!("{} of shape {:?}", name, expected),
            got: format!("{:?}", mat.shape()),
        });
    }
    Ok(())
}
