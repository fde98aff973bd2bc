//! k-nearest-neighbors classifier.

use nalgebra::DMatrix;

use super::ball_tree::{BallTree, QueryResult};
use super::params::{NeighborsModelData, NeighborsParams};
use crate::base::{Classifier, Estimator, Predict};
use crate::internal::numpy::{atleast_2d, check_consistent_length};
use crate::internal::scipy::mode;
use crate::{Error, Result};

const ALGORITHM: &str = "neighbors";

/// Classifier implementing the k-nearest-neighbor vote.
///
/// Training points are indexed in a ball tree. A query point is assigned the
/// most common label among its k nearest training points; ties go to the
/// smallest label.
#[derive(Clone, Debug)]
pub struct Neighbors {
    params: NeighborsParams,
    ball_tree: Option<BallTree>,
    labels: Vec<i64>,
}

impl Neighbors {
    /// Create an unfitted classifier.
    pub fn new(params: NeighborsParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            ball_tree: None,
            labels: Vec::new(),
        })
    }

    /// Fit the model using `x` as training data and `y` as integer labels.
    pub fn fit(&mut self, x: &DMatrix<f64>, y: &[i64]) -> Result<&mut Self> {
        check_consistent_length(x.nrows(), y.len())?;
        self.ball_tree = Some(BallTree::new(x.clone(), self.params.window_size)?);
        self.labels = y.to_vec();
        Ok(self)
    }

    pub fn is_fitted(&self) -> bool {
        self.ball_tree.is_some()
    }

    /// Ball tree built by `fit`.
    pub fn ball_tree(&self) -> Result<&BallTree> {
        self.ball_tree.as_ref().ok_or(Error::NotFitted)
    }

    /// Training labels.
    pub fn labels(&self) -> &[i64] {
        &self.labels
    }

    /// Find the k nearest training points of every row of `x`.
    ///
    /// # Arguments
    /// * `x` - Query points (n_queries x n_features)
    /// * `n_neighbors` - Overrides the configured number of neighbors
    ///
    /// # Returns
    /// Distances and training indices; take `.indices` alone when distances
    /// are not needed.
    pub fn kneighbors(&self, x: &DMatrix<f64>, n_neighbors: Option<usize>) -> Result<QueryResult> {
        let k = self.params.resolve_k(n_neighbors)?;
        self.ball_tree()?.query(x, k)
    }

    /// `kneighbors` for a single point.
    pub fn kneighbors_point(&self, point: &[f64], n_neighbors: Option<usize>) -> Result<QueryResult> {
        self.kneighbors(&atleast_2d(point), n_neighbors)
    }

    /// Predict class labels, optionally overriding the number of neighbors.
    pub fn predict_with(&self, x: &DMatrix<f64>, n_neighbors: Option<usize>) -> Result<Vec<i64>> {
        let neighbors = self.kneighbors(x, n_neighbors)?;

        let mut predicted = Vec::with_capacity(neighbors.indices.len());
        for ind in &neighbors.indices {
            let votes: Vec<i64> = ind.iter().map(|&j| self.labels[j]).collect();
            let (label, _) = mode(&votes).ok_or_else(|| {
                Error::InvalidInput("no neighbors to vote".to_string())
            })?;
            predicted.push(label);
        }

        Ok(predicted)
    }

    /// Serialize the fitted model (parameters, training data, labels) to JSON.
    pub fn to_json(&self) -> Result<String> {
        let data = NeighborsModelData::new(ALGORITHM, &self.params, self.ball_tree()?, self.labels.clone());
        Ok(serde_json::to_string_pretty(&data)?)
    }

    /// Restore a model saved with `to_json`; the ball tree is rebuilt.
    pub fn from_json(json: &str) -> Result<Self> {
        let data: NeighborsModelData<i64> = serde_json::from_str(json)?;
        let samples = data.samples_matrix(ALGORITHM)?;

        let mut model = Self::new(data.params)?;
        model.fit(&samples, &data.targets)?;
        Ok(model)
    }
}

impl Estimator for Neighbors {
    type Params = NeighborsParams;

    fn params(&self) -> &NeighborsParams {
        &self.params
    }

    fn set_params(&mut self, params: NeighborsParams) -> Result<()> {
        params.validate()?;
        // A new leaf size only matters for the next fit
        self.params = params;
        Ok(())
    }
}

impl Predict for Neighbors {
    type Output = Vec<i64>;

    fn predict(&self, x: &DMatrix<f64>) -> Result<Vec<i64>> {
        self.predict_with(x, None)
    }
}

impl Classifier for Neighbors {}
