//! Synthetic datasets.

use nalgebra::{DMatrix, DVector};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::internal::numpy::{standard_normal, take_rows};
use crate::utils::RandomState;
use crate::{Error, Result};

/// A generated regression problem.
#[derive(Clone, Debug)]
pub struct Regression {
    /// Input samples (n_samples x n_features)
    pub x: DMatrix<f64>,
    /// Targets
    pub y: DVector<f64>,
    /// Coefficients of the underlying linear model
    pub coef: DVector<f64>,
}

/// Generate a random linear regression problem.
///
/// Inputs are standard normal. `n_informative` coefficients are drawn from
/// `100 * U(0, 1)` and the others are zero; rows and feature columns are then
/// shuffled, so the informative features sit at random positions.
///
/// # Arguments
/// * `noise` - Standard deviation of the Gaussian noise added to `y`
/// * `bias` - Constant added to `y`
pub fn make_regression(
    n_samples: usize,
    n_features: usize,
    n_informative: usize,
    noise: f64,
    bias: f64,
    random_state: RandomState,
) -> Result<Regression> {
    if n_samples == 0 || n_features == 0 {
        return Err(Error::InvalidInput(format!(
            "n_samples and n_features must be at least 1, got ({}, {})",
            n_samples, n_features
        )));
    }
    if noise.is_nan() || noise < 0.0 {
        return Err(Error::InvalidInput(format!(
            "noise must be non-negative, got {}",
            noise
        )));
    }

    if n_informative > n_features {
        return Err(Error::InvalidInput(format!(
            "n_informative must be at most n_features ({}), got {}",
            n_features, n_informative
        )));
    }

    let mut rng = random_state.into_rng();

    let x = standard_normal(n_samples, n_features, &mut rng);
    let mut coef = DVector::zeros(n_features);
    for j in 0..n_informative {
        coef[j] = 100.0 * rng.gen::<f64>();
    }

    let mut y = (&x * &coef).add_scalar(bias);
    if noise > 0.0 {
        let normal = Normal::new(0.0, noise).map_err(|e| Error::InvalidInput(e.to_string()))?;
        for v in y.iter_mut() {
            *v += normal.sample(&mut rng);
        }
    }

    // Shuffle samples, then features
    let mut rows: Vec<usize> = (0..n_samples).collect();
    rows.shuffle(&mut rng);
    let x = take_rows(&x, &rows);
    let y = DVector::from_iterator(n_samples, rows.iter().map(|&i| y[i]));

    let mut cols: Vec<usize> = (0..n_features).collect();
    cols.shuffle(&mut rng);
    let x = x.select_columns(cols.iter());
    let coef = DVector::from_iterator(n_features, cols.iter().map(|&j| coef[j]));

    Ok(Regression { x, y, coef })
}
