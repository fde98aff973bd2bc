//! Regression based on k-nearest neighbors and barycenter weights.

use nalgebra::{DMatrix, DVector};

use super::ball_tree::{BallTree, QueryResult};
use super::barycenter::{barycenter_weights, DEFAULT_EPS};
use super::params::{NeighborsModelData, NeighborsParams};
use crate::base::{Estimator, Predict, Regressor};
use crate::internal::numpy::{check_consistent_length, take_rows};
use crate::{Error, Result};

const ALGORITHM: &str = "barycenter";

/// Regression on the k nearest neighbors.
///
/// The target of a query point is the combination of its neighbors' targets
/// weighted by the barycenter weights that best reconstruct the point from
/// those neighbors.
#[derive(Clone, Debug)]
pub struct NeighborsBarycenter {
    params: NeighborsParams,
    ball_tree: Option<BallTree>,
    targets: DVector<f64>,
}

impl NeighborsBarycenter {
    pub fn new(params: NeighborsParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            ball_tree: None,
            targets: DVector::zeros(0),
        })
    }

    /// Fit the model using `x` as training data and `y` as real targets.
    pub fn fit(&mut self, x: &DMatrix<f64>, y: &DVector<f64>) -> Result<&mut Self> {
        check_consistent_length(x.nrows(), y.len())?;
        if y.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidInput(
                "targets must be finite".to_string(),
            ));
        }
        self.ball_tree = Some(BallTree::new(x.clone(), self.params.window_size)?);
        self.targets = y.clone();
        Ok(self)
    }

    pub fn is_fitted(&self) -> bool {
        self.ball_tree.is_some()
    }

    pub fn ball_tree(&self) -> Result<&BallTree> {
        self.ball_tree.as_ref().ok_or(Error::NotFitted)
    }

    pub fn targets(&self) -> &DVector<f64> {
        &self.targets
    }

    pub fn kneighbors(&self, x: &DMatrix<f64>, n_neighbors: Option<usize>) -> Result<QueryResult> {
        let k = self.params.resolve_k(n_neighbors)?;
        self.ball_tree()?.query(x, k)
    }

    /// Predict targets, optionally overriding the number of neighbors and
    /// the Gram matrix regularization (defaults to `DEFAULT_EPS`).
    pub fn predict_with(
        &self,
        x: &DMatrix<f64>,
        n_neighbors: Option<usize>,
        eps: Option<f64>,
    ) -> Result<DVector<f64>> {
        let tree = self.ball_tree()?;
        let neighbors = self.kneighbors(x, n_neighbors)?;

        let neighbor_points: Vec<DMatrix<f64>> = neighbors
            .indices
            .iter()
            .map(|ind| take_rows(tree.data(), ind))
            .collect();
        let weights = barycenter_weights(x, &neighbor_points, eps.unwrap_or(DEFAULT_EPS))?;

        let predicted = neighbors.indices.iter().enumerate().map(|(i, ind)| {
            ind.iter()
                .enumerate()
                .map(|(j, &t)| weights[(i, j)] * self.targets[t])
                .sum::<f64>()
        });

        Ok(DVector::from_iterator(x.nrows(), predicted))
    }

    /// Serialize the fitted model (parameters, training data, targets) to JSON.
    pub fn to_json(&self) -> Result<String> {
        let targets: Vec<f64> = self.targets.iter().cloned().collect();
        let data = NeighborsModelData::new(ALGORITHM, &self.params, self.ball_tree()?, targets);
        Ok(serde_json::to_string_pretty(&data)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let data: NeighborsModelData<f64> = serde_json::from_str(json)?;
        let samples = data.samples_matrix(ALGORITHM)?;

        let mut model = Self::new(data.params)?;
        model.fit(&samples, &DVector::from_vec(data.targets))?;
        Ok(model)
    }
}

impl Estimator for NeighborsBarycenter {
    type Params = NeighborsParams;

    fn params(&self) -> &NeighborsParams {
        &self.params
    }

    fn set_params(&mut self, params: NeighborsParams) -> Result<()> {
        params.validate()?;
        self.params = params;
        Ok(())
    }
}

impl Predict for NeighborsBarycenter {
    type Output = DVector<f64>;

    fn predict(&self, x: &DMatrix<f64>) -> Result<DVector<f64>> {
        self.predict_with(x, None, None)
    }
}

impl Regressor for NeighborsBarycenter {}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn fitted(n_neighbors: usize) -> NeighborsBarycenter {
        let x = DMatrix::from_row_slice(4, 1, &[0.0, 1.0, 2.0, 3.0]);
        let y = DVector::from_vec(vec![0.0, 0.0, 1.0, 1.0]);
        let mut neigh = NeighborsBarycenter::new(NeighborsParams::new(n_neighbors)).unwrap();
        neigh.fit(&x, &y).unwrap();
        neigh
    }

    #[test]
    fn test_predict_midpoint() {
        let neigh = fitted(2);
        let predicted = neigh.predict(&DMatrix::from_row_slice(1, 1, &[1.5])).unwrap();
        assert_relative_eq!(predicted[0], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_predict_several_points() {
        let neigh = fitted(2);
        let predicted = neigh
            .predict(&DMatrix::from_row_slice(2, 1, &[0.5, 1.5]))
            .unwrap();
        assert_eq!(predicted.len(), 2);
        assert_relative_eq!(predicted[0], 0.0, epsilon = 1e-6);
        assert_relative_eq!(predicted[1], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_predict_override_neighbors() {
        let neigh = fitted(2);
        let q = DMatrix::from_row_slice(1, 1, &[2.0]);
        let one = neigh.predict_with(&q, Some(1), None).unwrap();
        assert_relative_eq!(one[0], 1.0, epsilon = 1e-9);

        let bigger_eps = neigh.predict_with(&q, Some(1), Some(1e-3)).unwrap();
        assert_relative_eq!(bigger_eps[0], 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_score_perfect_on_train() {
        let neigh = fitted(1);
        let x = DMatrix::from_row_slice(4, 1, &[0.0, 1.0, 2.0, 3.0]);
        let y = DVector::from_vec(vec![0.0, 0.0, 1.0, 1.0]);
        assert_relative_eq!(neigh.score(&x, &y).unwrap(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_not_fitted() {
        let neigh = NeighborsBarycenter::new(NeighborsParams::default()).unwrap();
        let q = DMatrix::from_row_slice(1, 1, &[0.0]);
        assert!(matches!(neigh.predict(&q), Err(Error::NotFitted)));
    }

    #[test]
    fn test_rejects_non_finite_targets() {
        let x = DMatrix::from_row_slice(2, 1, &[0.0, 1.0]);
        let y = DVector::from_vec(vec![0.0, f64::NAN]);
        let mut neigh = NeighborsBarycenter::new(NeighborsParams::new(1)).unwrap();
        assert!(neigh.fit(&x, &y).is_err());
    }

    #[test]
    fn test_json_restores_predictions() {
        let neigh = fitted(2);
        let restored = NeighborsBarycenter::from_json(&neigh.to_json().unwrap()).unwrap();

        let q = DMatrix::from_row_slice(3, 1, &[0.25, 1.5, 2.75]);
        let expected = neigh.predict(&q).unwrap();
        let got = restored.predict(&q).unwrap();
        for i in 0..3 {
            assert_relative_eq!(got[i], expected[i], epsilon = 1e-12);
        }
    }
}
