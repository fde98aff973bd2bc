//! Parameters and persisted state shared by the neighbors estimators.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use super::ball_tree::BallTree;
use crate::internal::numpy::rows_to_vecs;
use crate::{Error, Result};

/// Configuration for the k-nearest-neighbors estimators.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeighborsParams {
    /// Default number of neighbors used by queries and predictions.
    pub n_neighbors: usize,

    /// Leaf size of the underlying ball tree.
    pub window_size: usize,
}

impl NeighborsParams {
    /// Create parameters with the given number of neighbors.
    pub fn new(n_neighbors: usize) -> Self {
        Self {
            n_neighbors,
            ..Self::default()
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.n_neighbors == 0 {
            return Err(Error::InvalidConfig(
                "n_neighbors must be at least 1".to_string(),
            ));
        }
        if self.window_size == 0 {
            return Err(Error::InvalidConfig(
                "window_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve a per-call override against the configured default.
    pub(crate) fn resolve_k(&self, n_neighbors: Option<usize>) -> Result<usize> {
        match n_neighbors {
            Some(0) => Err(Error::InvalidInput(
                "n_neighbors must be at least 1".to_string(),
            )),
            Some(k) => Ok(k),
            None => Ok(self.n_neighbors),
        }
    }
}

impl Default for NeighborsParams {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            window_size: 1,
        }
    }
}

/// JSON form of a fitted neighbors model.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct NeighborsModelData<T> {
    pub algorithm: String,
    pub params: NeighborsParams,
    pub samples: Vec<Vec<f64>>,
    pub targets: Vec<T>,
}

impl<T> NeighborsModelData<T> {
    pub fn new(algorithm: &str, params: &NeighborsParams, tree: &BallTree, targets: Vec<T>) -> Self {
        Self {
            algorithm: algorithm.to_string(),
            params: params.clone(),
            samples: rows_to_vecs(tree.data()),
            targets,
        }
    }

    /// Check the algorithm tag and rebuild the sample matrix.
    pub fn samples_matrix(&self, algorithm: &str) -> Result<DMatrix<f64>> {
        if self.algorithm != algorithm {
            return Err(Error::InvalidInput(format!(
                "expected a '{}' model, got '{}'",
                algorithm, self.algorithm
            )));
        }

        let n = self.samples.len();
        let dim = self.samples.first().map(|r| r.len()).unwrap_or(0);
        if self.samples.iter().any(|r| r.len() != dim) {
            return Err(Error::InvalidInput(
                "samples have inconsistent lengths".to_string(),
            ));
        }

        let flat: Vec<f64> = self.samples.iter().flatten().cloned().collect();
        Ok(DMatrix::from_row_slice(n, dim, &flat))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_default() {
        let params = NeighborsParams::default();
        assert_eq!(params.n_neighbors, 5);
        assert_eq!(params.window_size, 1);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_params_validation() {
        assert!(NeighborsParams::new(0).validate().is_err());

        let mut params = NeighborsParams::new(3);
        params.window_size = 0;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_params_from_partial_json() {
        let params: NeighborsParams = serde_json::from_str(r#"{"n_neighbors": 2}"#).unwrap();
        assert_eq!(params, NeighborsParams::new(2));
    }

    #[test]
    fn test_resolve_k() {
        let params = NeighborsParams::new(4);
        assert_eq!(params.resolve_k(None).unwrap(), 4);
        assert_eq!(params.resolve_k(Some(2)).unwrap(), 2);
        assert!(params.resolve_k(Some(0)).is_err());
    }
}
