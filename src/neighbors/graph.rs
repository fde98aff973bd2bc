//! Sparse k-neighbors graphs.

use std::fmt;
use std::str::FromStr;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use sprs::CsMat;

use super::ball_tree::{BallTree, QueryResult};
use super::barycenter::barycenter_weights;
use crate::internal::numpy::take_rows;
use crate::{Error, Result};

/// Kind of edge weights stored in a k-neighbors graph.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphMode {
    /// Ones for each of the k nearest points, the point itself included.
    #[default]
    Adjacency,
    /// Euclidean distances to the k nearest other points.
    Distance,
    /// Barycenter weights reconstructing each point from its k nearest other points.
    Barycenter,
}

impl FromStr for GraphMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "adjacency" => Ok(GraphMode::Adjacency),
            "distance" => Ok(GraphMode::Distance),
            "barycenter" => Ok(GraphMode::Barycenter),
            _ => Err(Error::UnknownMode(format!("graph mode '{}'", s))),
        }
    }
}

impl fmt::Display for GraphMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GraphMode::Adjacency => "adjacency",
            GraphMode::Distance => "distance",
            GraphMode::Barycenter => "barycenter",
        };
        f.write_str(name)
    }
}

/// Drop each point from its own neighbor list.
///
/// `result` must come from querying the tree's own data with k + 1. The point
/// itself is normally first; with duplicates it may appear later or be pushed
/// out entirely, in which case the farthest neighbor is dropped instead.
fn exclude_self(result: &QueryResult, k: usize) -> (Vec<Vec<usize>>, Vec<Vec<f64>>) {
    let mut indices = Vec::with_capacity(result.indices.len());
    let mut distances = Vec::with_capacity(result.indices.len());

    for (i, row) in result.indices.iter().enumerate() {
        let skip = row.iter().position(|&j| j == i).unwrap_or(k);
        let mut ind = Vec::with_capacity(k);
        let mut dist = Vec::with_capacity(k);
        for (pos, &j) in row.iter().enumerate() {
            if pos != skip && ind.len() < k {
                ind.push(j);
                dist.push(result.distances[(i, pos)]);
            }
        }
        indices.push(ind);
        distances.push(dist);
    }

    (indices, distances)
}

/// Compute the (weighted) graph of k-neighbors for the points in `x`.
///
/// # Arguments
/// * `x` - Coordinates of samples, one per row
/// * `n_neighbors` - Number of neighbors for each sample
/// * `mode` - Edge weights to store
/// * `eps` - Gram matrix regularization used by `GraphMode::Barycenter`
///
/// # Returns
/// CSR matrix of shape (n_samples, n_samples) with exactly `n_neighbors`
/// stored entries per row; `A[i, j]` is the weight of the edge from i to j.
pub fn kneighbors_graph(
    x: &DMatrix<f64>,
    n_neighbors: usize,
    mode: GraphMode,
    eps: f64,
) -> Result<CsMat<f64>> {
    let n_samples = x.nrows();
    if n_neighbors == 0 {
        return Err(Error::InvalidInput(
            "n_neighbors must be at least 1".to_string(),
        ));
    }
    if mode != GraphMode::Adjacency && n_neighbors + 1 > n_samples {
        return Err(Error::InvalidInput(format!(
            "{} mode needs n_neighbors + 1 <= n_samples, got n_neighbors = {} for {} samples",
            mode, n_neighbors, n_samples
        )));
    }

    let ball_tree = BallTree::new(x.clone(), 1)?;

    let (indices, weights): (Vec<Vec<usize>>, Vec<Vec<f64>>) = match mode {
        GraphMode::Adjacency => {
            let result = ball_tree.query(x, n_neighbors)?;
            let ones = vec![vec![1.0; n_neighbors]; n_samples];
            (result.indices, ones)
        }
        GraphMode::Distance => {
            let result = ball_tree.query(x, n_neighbors + 1)?;
            exclude_self(&result, n_neighbors)
        }
        GraphMode::Barycenter => {
            let result = ball_tree.query(x, n_neighbors + 1)?;
            let (indices, _) = exclude_self(&result, n_neighbors);
            let neighbors: Vec<DMatrix<f64>> =
                indices.iter().map(|ind| take_rows(x, ind)).collect();
            let b = barycenter_weights(x, &neighbors, eps)?;
            let rows = b
                .row_iter()
                .map(|row| row.iter().cloned().collect())
                .collect();
            (indices, rows)
        }
    };

    // CSR rows must list their columns in increasing order
    let nnz = n_samples * n_neighbors;
    let indptr: Vec<usize> = (0..=n_samples).map(|i| i * n_neighbors).collect();
    let mut col_inds = Vec::with_capacity(nnz);
    let mut data = Vec::with_capacity(nnz);
    for (ind, w) in indices.iter().zip(&weights) {
        let mut row: Vec<(usize, f64)> = ind.iter().cloned().zip(w.iter().cloned()).collect();
        row.sort_unstable_by_key(|&(j, _)| j);
        for (j, v) in row {
            col_inds.push(j);
            data.push(v);
        }
    }

    Ok(CsMat::new((n_samples, n_samples), indptr, col_inds, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_graph_mode_from_str() {
        assert_eq!("adjacency".parse::<GraphMode>().unwrap(), GraphMode::Adjacency);
        assert_eq!("distance".parse::<GraphMode>().unwrap(), GraphMode::Distance);
        assert_eq!("barycenter".parse::<GraphMode>().unwrap(), GraphMode::Barycenter);
        assert!(matches!("connectivity".parse::<GraphMode>(), Err(Error::UnknownMode(_))));
    }

    #[test]
    fn test_adjacency_graph() {
        let x = DMatrix::from_row_slice(3, 1, &[0.0, 3.0, 1.0]);
        let a = kneighbors_graph(&x, 2, GraphMode::Adjacency, 1e-6).unwrap();

        assert_eq!(a.shape(), (3, 3));
        assert_eq!(a.nnz(), 6);
        assert!(a.is_csr());
        assert!(a.outer_iterator().all(|row| row.nnz() == 2));

        let dense = a.to_dense();
        let expected = [
            [1.0, 0.0, 1.0],
            [0.0, 1.0, 1.0],
            [1.0, 0.0, 1.0],
        ];
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(dense[[i, j]], expected[i][j]);
            }
        }
    }

    #[test]
    fn test_distance_graph_excludes_self() {
        let x = DMatrix::from_row_slice(4, 1, &[0.0, 1.0, 3.0, 7.0]);
        let a = kneighbors_graph(&x, 1, GraphMode::Distance, 1e-6).unwrap();

        assert_eq!(a.nnz(), 4);
        assert_eq!(a.get(0, 1), Some(&1.0));
        assert_eq!(a.get(1, 0), Some(&1.0));
        assert_eq!(a.get(2, 1), Some(&2.0));
        assert_eq!(a.get(3, 2), Some(&4.0));
        for i in 0..4 {
            assert_eq!(a.get(i, i), None);
        }
    }

    #[test]
    fn test_distance_graph_with_duplicates() {
        // Points 0 and 1 coincide: each must list the other, never itself
        let x = DMatrix::from_row_slice(3, 1, &[2.0, 2.0, 5.0]);
        let a = kneighbors_graph(&x, 1, GraphMode::Distance, 1e-6).unwrap();

        assert_eq!(a.nnz(), 3);
        assert_eq!(a.get(0, 1), Some(&0.0));
        assert_eq!(a.get(1, 0), Some(&0.0));
        assert_eq!(a.get(2, 1), None);
        assert_eq!(a.get(2, 0), Some(&3.0));
    }

    #[test]
    fn test_barycenter_graph_rows_sum_to_one() {
        let x = DMatrix::from_row_slice(6, 2, &[
            0.0, 0.0,
            1.0, 0.0,
            0.0, 1.0,
            1.0, 1.0,
            2.0, 0.5,
            0.5, 2.0,
        ]);
        let a = kneighbors_graph(&x, 3, GraphMode::Barycenter, 1e-6).unwrap();

        assert_eq!(a.nnz(), 18);
        for (i, row) in a.outer_iterator().enumerate() {
            assert_eq!(row.nnz(), 3);
            assert!(row.get(i).is_none(), "row {} contains itself", i);
            let total: f64 = row.iter().map(|(_, &v)| v).sum();
            assert_relative_eq!(total, 1.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_graph_too_many_neighbors() {
        let x = DMatrix::from_row_slice(3, 1, &[0.0, 1.0, 2.0]);
        assert!(kneighbors_graph(&x, 3, GraphMode::Adjacency, 1e-6).is_ok());
        assert!(kneighbors_graph(&x, 3, GraphMode::Distance, 1e-6).is_err());
        assert!(kneighbors_graph(&x, 4, GraphMode::Adjacency, 1e-6).is_err());
        assert!(kneighbors_graph(&x, 0, GraphMode::Adjacency, 1e-6).is_err());
    }
}
