//! Randomized Lasso: feature selection by stability selection.
//!
//! Reference: N. Meinshausen, P. Buhlmann, "Stability selection",
//! Journal of the Royal Statistical Society B, 72 (2010).

use log::{debug, info};
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::lasso::{Lasso, LassoParams};
use crate::base::{Estimator, Transform};
use crate::internal::numpy::{check_array, check_consistent_length, take, take_rows};
use crate::utils::RandomState;
use crate::{Error, Result};

/// Configuration for [`RandomizedLasso`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomizedLassoParams {
    /// L1 penalty of every randomized fit
    pub alpha: f64,
    /// Features are down-weighted to `1 - scaling` with probability 1/2
    pub scaling: f64,
    /// Fraction of the rows drawn for each fit
    pub sample_fraction: f64,
    pub n_resampling: usize,
    /// Features selected more often than this fraction are kept
    pub selection_threshold: f64,
    pub fit_intercept: bool,
    pub max_iter: usize,
    pub tol: f64,
    /// Log progress of the resampling
    pub verbose: bool,
    pub random_state: RandomState,
}

impl RandomizedLassoParams {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            ..Self::default()
        }
    }

    fn lasso_params(&self) -> LassoParams {
        LassoParams {
            alpha: self.alpha,
            fit_intercept: self.fit_intercept,
            max_iter: self.max_iter,
            tol: self.tol,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        self.lasso_params().validate()?;
        if !(self.scaling > 0.0 && self.scaling < 1.0) {
            return Err(Error::InvalidConfig(format!(
                "scaling must be in (0, 1), got {}",
                self.scaling
            )));
        }
        if !(self.sample_fraction > 0.0 && self.sample_fraction <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "sample_fraction must be in (0, 1], got {}",
                self.sample_fraction
            )));
        }
        if self.n_resampling == 0 {
            return Err(Error::InvalidConfig(
                "n_resampling must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.selection_threshold) {
            return Err(Error::InvalidConfig(format!(
                "selection_threshold must be in [0, 1], got {}",
                self.selection_threshold
            )));
        }
        Ok(())
    }
}

impl Default for RandomizedLassoParams {
    fn default() -> Self {
        let lasso = LassoParams::default();
        Self {
            alpha: 1.0,
            scaling: 0.5,
            sample_fraction: 0.75,
            n_resampling: 200,
            selection_threshold: 0.25,
            fit_intercept: lasso.fit_intercept,
            max_iter: lasso.max_iter,
            tol: lasso.tol,
            verbose: false,
            random_state: RandomState::default(),
        }
    }
}

/// Randomized Lasso.
///
/// Fits a Lasso on many random subsamples of the data, each time with the
/// features randomly rescaled, and scores every feature by how often its
/// coefficient is non-zero.
#[derive(Clone, Debug)]
pub struct RandomizedLasso {
    params: RandomizedLassoParams,
    scores: Option<DVector<f64>>,
}

impl RandomizedLasso {
    pub fn new(params: RandomizedLassoParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            scores: None,
        })
    }

    pub fn fit(&mut self, x: &DMatrix<f64>, y: &DVector<f64>) -> Result<&mut Self> {
        check_array(x)?;
        check_consistent_length(x.nrows(), y.len())?;

        let (n_samples, n_features) = x.shape();
        let n_subsamples = ((self.params.sample_fraction * n_samples as f64).floor() as usize).max(1);
        let n_resampling = self.params.n_resampling;

        // Draw every seed up front so results do not depend on scheduling
        let mut rng = self.params.random_state.into_rng();
        let seeds: Vec<u64> = (0..n_resampling).map(|_| rng.gen()).collect();

        debug!(
            "randomized lasso: {} resamplings of {} out of {} samples",
            n_resampling, n_subsamples, n_samples
        );

        let lasso_params = self.params.lasso_params();
        let scaling = self.params.scaling;
        let verbose = self.params.verbose;

        let selections: Vec<Vec<bool>> = seeds
            .par_iter()
            .enumerate()
            .map(|(k, &seed)| -> Result<Vec<bool>> {
                let mut rng = StdRng::seed_from_u64(seed);
                let rows = sample(&mut rng, n_samples, n_subsamples).into_vec();
                let weights: Vec<f64> = (0..n_features)
                    .map(|_| if rng.gen_bool(0.5) { 1.0 - scaling } else { 1.0 })
                    .collect();

                let mut x_sub = take_rows(x, &rows);
                for (j, &w) in weights.iter().enumerate() {
                    x_sub.column_mut(j).scale_mut(w);
                }
                let y_sub = take(y, &rows);

                let mut lasso = Lasso::new(lasso_params.clone())?;
                lasso.fit(&x_sub, &y_sub)?;
                if verbose {
                    info!("randomized lasso: resampling {}/{} done", k + 1, n_resampling);
                }
                Ok(lasso.coef()?.iter().map(|&c| c != 0.0).collect())
            })
            .collect::<Result<Vec<_>>>()?;

        let mut counts = DVector::zeros(n_features);
        for selected in &selections {
            for (j, &on) in selected.iter().enumerate() {
                if on {
                    counts[j] += 1.0;
                }
            }
        }
        self.scores = Some(counts / n_resampling as f64);
        Ok(self)
    }

    /// Selection frequency of each feature, in [0, 1].
    pub fn scores(&self) -> Result<&DVector<f64>> {
        self.scores.as_ref().ok_or(Error::NotFitted)
    }

    /// Mask of the features scoring above `selection_threshold`.
    pub fn get_support(&self) -> Result<Vec<bool>> {
        let threshold = self.params.selection_threshold;
        Ok(self.scores()?.iter().map(|&s| s > threshold).collect())
    }

    pub fn get_support_indices(&self) -> Result<Vec<usize>> {
        Ok(self
            .get_support()?
            .iter()
            .enumerate()
            .filter(|(_, on)| **on)
            .map(|(j, _)| j)
            .collect())
    }
}

impl Estimator for RandomizedLasso {
    type Params = RandomizedLassoParams;

    fn params(&self) -> &RandomizedLassoParams {
        &self.params
    }

    fn set_params(&mut self, params: RandomizedLassoParams) -> Result<()> {
        params.validate()?;
        self.params = params;
        Ok(())
    }
}

impl Transform for RandomizedLasso {
    /// Keep only the selected columns of `x`.
    fn transform(&self, x: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        let support = self.get_support_indices()?;
        let n_features = self.scores()?.len();
        if x.ncols() != n_features {
            return Err(Error::ShapeMismatch {
                expected: format!("{} features", n_features),
                got: format!("{} features", x.ncols()),
            });
        }
        Ok(x.select_columns(support.iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::make_regression;

    fn params(seed: u64) -> RandomizedLassoParams {
        RandomizedLassoParams {
            n_resampling: 30,
            random_state: RandomState::Seed(seed),
            ..RandomizedLassoParams::new(1.0)
        }
    }

    #[test]
    fn test_params_validation() {
        assert!(RandomizedLassoParams::default().validate().is_ok());

        let bad = [
            RandomizedLassoParams { scaling: 0.0, ..Default::default() },
            RandomizedLassoParams { scaling: 1.0, ..Default::default() },
            RandomizedLassoParams { sample_fraction: 0.0, ..Default::default() },
            RandomizedLassoParams { sample_fraction: 1.5, ..Default::default() },
            RandomizedLassoParams { n_resampling: 0, ..Default::default() },
            RandomizedLassoParams { alpha: -1.0, ..Default::default() },
        ];
        for p in bad {
            assert!(RandomizedLasso::new(p).is_err());
        }
    }

    #[test]
    fn test_selects_informative_features() {
        let data = make_regression(60, 20, 3, 0.0, 0.0, RandomState::Seed(0)).unwrap();

        let mut clf = RandomizedLasso::new(params(1)).unwrap();
        clf.fit(&data.x, &data.y).unwrap();

        let scores = clf.scores().unwrap();
        assert_eq!(scores.len(), 20);
        assert!(scores.iter().all(|&s| (0.0..=1.0).contains(&s)));

        for j in 0..20 {
            if data.coef[j] > 10.0 {
                assert!(scores[j] > 0.8, "informative feature {} scored {}", j, scores[j]);
            }
        }

        let support = clf.get_support().unwrap();
        let informative: Vec<bool> = data.coef.iter().map(|&c| c > 10.0).collect();
        for j in 0..20 {
            if informative[j] {
                assert!(support[j]);
            }
        }
    }

    #[test]
    fn test_seeded_fits_are_reproducible() {
        let data = make_regression(30, 8, 2, 1.0, 0.0, RandomState::Seed(5)).unwrap();

        let mut a = RandomizedLasso::new(params(9)).unwrap();
        let mut b = RandomizedLasso::new(params(9)).unwrap();
        a.fit(&data.x, &data.y).unwrap();
        b.fit(&data.x, &data.y).unwrap();
        assert_eq!(a.scores().unwrap(), b.scores().unwrap());
    }

    #[test]
    fn test_transform_keeps_supported_columns() {
        let data = make_regression(40, 10, 2, 0.0, 0.0, RandomState::Seed(3)).unwrap();
        let mut clf = RandomizedLasso::new(params(4)).unwrap();
        clf.fit(&data.x, &data.y).unwrap();

        let support = clf.get_support_indices().unwrap();
        let reduced = clf.transform(&data.x).unwrap();
        assert_eq!(reduced.shape(), (40, support.len()));
        for (k, &j) in support.iter().enumerate() {
            assert_eq!(reduced.column(k), data.x.column(j));
        }

        assert!(clf.transform(&DMatrix::zeros(2, 3)).is_err());
    }

    #[test]
    fn test_not_fitted() {
        let clf = RandomizedLasso::new(RandomizedLassoParams::default()).unwrap();
        assert!(matches!(clf.scores(), Err(Error::NotFitted)));
        assert!(clf.get_support().is_err());
        assert!(clf.transform(&DMatrix::zeros(1, 1)).is_err());
    }
}
