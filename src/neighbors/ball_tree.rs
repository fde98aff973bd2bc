//! Ball tree spatial index.
//!
//! Points are partitioned into nested balls (centroid + radius). A node is
//! split at the median of its dimension of greatest spread until it holds at
//! most `leaf_size` points. Nodes are stored in a flat arena and refer to a
//! contiguous range of a shared index permutation.
//!
//! Node bounds carry a small relative slack, so a node holding a point at
//! exactly the current k-th distance is never pruned and ties resolve by
//! index as under brute force.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use log::debug;
use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::internal::numpy::{check_array, to_row_major_vec};
use crate::internal::scipy::squared_euclidean;
use crate::{Error, Result};

/// Relative padding on node radii and pruning thresholds.
const BOUND_SLACK: f64 = 1e-9;

/// Result of a k-nearest-neighbor query.
///
/// Row `i` describes query point `i`: neighbors sorted by ascending distance,
/// ties broken by ascending training index.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryResult {
    /// Distances to the neighbors (n_queries x k).
    pub distances: DMatrix<f64>,
    /// Training-set indices of the neighbors, one row of length k per query.
    pub indices: Vec<Vec<usize>>,
}

/// Result of a radius query. Rows have variable length.
#[derive(Clone, Debug, PartialEq)]
pub struct RadiusResult {
    pub distances: Vec<Vec<f64>>,
    pub indices: Vec<Vec<usize>>,
}

#[derive(Clone, Debug)]
struct Node {
    start: usize,
    end: usize,
    centroid: Vec<f64>,
    radius: f64,
    children: Option<(usize, usize)>,
}

/// A neighbor candidate ordered by (distance, index).
#[derive(Clone, Copy, Debug)]
struct Candidate {
    dist: f64,
    index: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist
            .total_cmp(&other.dist)
            .then(self.index.cmp(&other.index))
    }
}

/// Bounded max-heap keeping the k best candidates seen so far.
struct NeighborHeap {
    k: usize,
    heap: BinaryHeap<Candidate>,
}

impl NeighborHeap {
    fn new(k: usize) -> Self {
        Self {
            k,
            heap: BinaryHeap::with_capacity(k + 1),
        }
    }

    fn is_full(&self) -> bool {
        self.heap.len() >= self.k
    }

    /// Distance of the current k-th best candidate.
    fn worst(&self) -> f64 {
        self.heap.peek().map(|c| c.dist).unwrap_or(f64::INFINITY)
    }

    fn push(&mut self, candidate: Candidate) {
        if !self.is_full() {
            self.heap.push(candidate);
        } else if let Some(top) = self.heap.peek() {
            if candidate < *top {
                self.heap.pop();
                self.heap.push(candidate);
            }
        }
    }

    fn into_sorted(self) -> Vec<Candidate> {
        self.heap.into_sorted_vec()
    }
}

/// Ball tree over the rows of a sample matrix, using Euclidean distance.
#[derive(Clone, Debug)]
pub struct BallTree {
    data: DMatrix<f64>,
    /// Row-major copy of the data for contiguous point access.
    points: Vec<f64>,
    n_features: usize,
    idx_array: Vec<usize>,
    nodes: Vec<Node>,
    leaf_size: usize,
    depth: usize,
}

impl BallTree {
    /// Build a ball tree.
    ///
    /// # Arguments
    /// * `data` - Points to index (n_samples x n_features)
    /// * `leaf_size` - Maximum number of points in a leaf node (>= 1)
    pub fn new(data: DMatrix<f64>, leaf_size: usize) -> Result<Self> {
        check_array(&data)?;
        if leaf_size == 0 {
            return Err(Error::InvalidConfig(
                "leaf_size must be at least 1".to_string(),
            ));
        }

        let n_samples = data.nrows();
        let n_features = data.ncols();
        let points = to_row_major_vec(&data);

        let mut tree = Self {
            data,
            points,
            n_features,
            idx_array: (0..n_samples).collect(),
            nodes: Vec::new(),
            leaf_size,
            depth: 0,
        };
        tree.build_node(0, n_samples, 0);

        debug!(
            "built ball tree: {} samples, {} features, {} nodes, depth {}",
            n_samples,
            n_features,
            tree.nodes.len(),
            tree.depth
        );

        Ok(tree)
    }

    /// Indexed data (n_samples x n_features).
    pub fn data(&self) -> &DMatrix<f64> {
        &self.data
    }

    pub fn n_samples(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn leaf_size(&self) -> usize {
        self.leaf_size
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Depth of the deepest node (the root is at depth 0).
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[inline]
    fn point(&self, i: usize) -> &[f64] {
        &self.points[i * self.n_features..(i + 1) * self.n_features]
    }

    fn build_node(&mut self, start: usize, end: usize, depth: usize) -> usize {
        let centroid = self.centroid(start, end);
        let radius = self.idx_array[start..end]
            .iter()
            .map(|&i| squared_euclidean(self.point(i), &centroid))
            .fold(0.0, f64::max)
            .sqrt();
        let scale = centroid.iter().fold(radius, |m, c| m.max(c.abs()));
        let radius = radius + BOUND_SLACK * scale;

        let node_id = self.nodes.len();
        self.nodes.push(Node {
            start,
            end,
            centroid,
            radius,
            children: None,
        });
        self.depth = self.depth.max(depth);

        if end - start > self.leaf_size {
            let dim = self.max_spread_dim(start, end);
            let mid = start + (end - start) / 2;

            let points = &self.points;
            let stride = self.n_features;
            self.idx_array[start..end].select_nth_unstable_by(mid - start, |&a, &b| {
                points[a * stride + dim].total_cmp(&points[b * stride + dim])
            });

            let left = self.build_node(start, mid, depth + 1);
            let right = self.build_node(mid, end, depth + 1);
            self.nodes[node_id].children = Some((left, right));
        }

        node_id
    }

    fn centroid(&self, start: usize, end: usize) -> Vec<f64> {
        let mut centroid = vec![0.0; self.n_features];
        for &i in &self.idx_array[start..end] {
            for (c, v) in centroid.iter_mut().zip(self.point(i)) {
                *c += v;
            }
        }
        let n = (end - start) as f64;
        centroid.iter_mut().for_each(|c| *c /= n);
        centroid
    }

    fn max_spread_dim(&self, start: usize, end: usize) -> usize {
        let mut best_dim = 0;
        let mut best_spread = f64::NEG_INFINITY;
        for dim in 0..self.n_features {
            let (lo, hi) = self.idx_array[start..end].iter().fold(
                (f64::INFINITY, f64::NEG_INFINITY),
                |(lo, hi), &i| {
                    let v = self.points[i * self.n_features + dim];
                    (lo.min(v), hi.max(v))
                },
            );
            if hi - lo > best_spread {
                best_spread = hi - lo;
                best_dim = dim;
            }
        }
        best_dim
    }

    /// Lower bound on the distance from `q` to any point inside node `node_id`.
    #[inline]
    fn min_dist(&self, node_id: usize, q: &[f64]) -> f64 {
        let node = &self.nodes[node_id];
        (squared_euclidean(q, &node.centroid).sqrt() - node.radius).max(0.0)
    }

    fn check_query(&self, x: &DMatrix<f64>) -> Result<()> {
        check_array(x)?;
        if x.ncols() != self.n_features {
            return Err(Error::ShapeMismatch {
                expected: format!("{} features", self.n_features),
                got: format!("{} features", x.ncols()),
            });
        }
        Ok(())
    }

    /// Find the k nearest neighbors of every row of `x`.
    ///
    /// # Arguments
    /// * `x` - Query points (n_queries x n_features)
    /// * `k` - Number of neighbors, 1 <= k <= n_samples
    pub fn query(&self, x: &DMatrix<f64>, k: usize) -> Result<QueryResult> {
        self.check_query(x)?;
        if k == 0 || k > self.n_samples() {
            return Err(Error::InvalidInput(format!(
                "k must be in [1, {}], got {}",
                self.n_samples(),
                k
            )));
        }

        let queries = to_row_major_vec(x);
        let rows: Vec<Vec<Candidate>> = queries
            .par_chunks(self.n_features)
            .map(|q| self.query_one(q, k))
            .collect();

        let mut distances = DMatrix::zeros(rows.len(), k);
        let mut indices = Vec::with_capacity(rows.len());
        for (i, row) in rows.into_iter().enumerate() {
            for (j, c) in row.iter().enumerate() {
                distances[(i, j)] = c.dist;
            }
            indices.push(row.into_iter().map(|c| c.index).collect());
        }

        Ok(QueryResult { distances, indices })
    }

    /// k nearest neighbors of a single point given as a slice.
    pub fn query_point(&self, point: &[f64], k: usize) -> Result<QueryResult> {
        self.query(&DMatrix::from_row_slice(1, point.len(), point), k)
    }

    fn query_one(&self, q: &[f64], k: usize) -> Vec<Candidate> {
        let mut heap = NeighborHeap::new(k);
        self.query_node(0, q, self.min_dist(0, q), &mut heap);
        heap.into_sorted()
    }

    fn query_node(&self, node_id: usize, q: &[f64], lower_bound: f64, heap: &mut NeighborHeap) {
        // Only prune past the slack: a tie may carry a smaller index
        if heap.is_full() && lower_bound > heap.worst() * (1.0 + BOUND_SLACK) {
            return;
        }

        let node = &self.nodes[node_id];
        match node.children {
            None => {
                for &i in &self.idx_array[node.start..node.end] {
                    heap.push(Candidate {
                        dist: squared_euclidean(q, self.point(i)).sqrt(),
                        index: i,
                    });
                }
            }
            Some((left, right)) => {
                let lb_left = self.min_dist(left, q);
                let lb_right = self.min_dist(right, q);
                if lb_left <= lb_right {
                    self.query_node(left, q, lb_left, heap);
                    self.query_node(right, q, lb_right, heap);
                } else {
                    self.query_node(right, q, lb_right, heap);
                    self.query_node(left, q, lb_left, heap);
                }
            }
        }
    }

    /// Find all training points within distance `radius` of every row of `x`.
    pub fn query_radius(&self, x: &DMatrix<f64>, radius: f64) -> Result<RadiusResult> {
        self.check_query(x)?;
        if radius.is_nan() || radius < 0.0 {
            return Err(Error::InvalidInput(format!(
                "radius must be non-negative, got {}",
                radius
            )));
        }

        let queries = to_row_major_vec(x);
        let rows: Vec<Vec<Candidate>> = queries
            .par_chunks(self.n_features)
            .map(|q| {
                let mut found = Vec::new();
                self.radius_node(0, q, radius, &mut found);
                found.sort_unstable();
                found
            })
            .collect();

        let mut distances = Vec::with_capacity(rows.len());
        let mut indices = Vec::with_capacity(rows.len());
        for row in rows {
            distances.push(row.iter().map(|c| c.dist).collect());
            indices.push(row.iter().map(|c| c.index).collect());
        }

        Ok(RadiusResult { distances, indices })
    }

    fn radius_node(&self, node_id: usize, q: &[f64], radius: f64, found: &mut Vec<Candidate>) {
        if self.min_dist(node_id, q) > radius * (1.0 + BOUND_SLACK) {
            return;
        }

        let node = &self.nodes[node_id];
        match node.children {
            None => {
                for &i in &self.idx_array[node.start..node.end] {
                    let dist = squared_euclidean(q, self.point(i)).sqrt();
                    if dist <= radius {
                        found.push(Candidate { dist, index: i });
                    }
                }
            }
            Some((left, right)) => {
                self.radius_node(left, q, radius, found);
                self.radius_node(right, q, radius, found);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::internal::scipy::cdist;
    use crate::metrics::Metric;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_data(n: usize, d: usize, seed: u64) -> DMatrix<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        DMatrix::from_fn(n, d, |_, _| rng.gen_range(-10.0..10.0))
    }

    /// Brute-force k-NN sorted by (distance, index).
    fn brute_force(data: &DMatrix<f64>, x: &DMatrix<f64>, k: usize) -> Vec<Vec<(f64, usize)>> {
        let d = cdist(x, data, Metric::Euclidean);
        (0..x.nrows())
            .map(|i| {
                let mut row: Vec<(f64, usize)> = (0..data.nrows()).map(|j| (d[(i, j)], j)).collect();
                row.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
                row.truncate(k);
                row
            })
            .collect()
    }

    // ===== Construction tests =====

    #[test]
    fn test_ball_tree_structure() {
        let data = random_data(100, 3, 0);
        let tree = BallTree::new(data, 5).unwrap();

        assert_eq!(tree.n_samples(), 100);
        assert_eq!(tree.n_features(), 3);
        assert_eq!(tree.leaf_size(), 5);

        // Every leaf holds at most leaf_size points and leaves partition the data
        let mut covered = vec![0; 100];
        for node in &tree.nodes {
            if node.children.is_none() {
                assert!(node.end - node.start <= 5);
                for &i in &tree.idx_array[node.start..node.end] {
                    covered[i] += 1;
                }
            }
        }
        assert!(covered.iter().all(|&c| c == 1));
    }

    #[test]
    fn test_ball_tree_balls_contain_their_points() {
        let data = random_data(64, 4, 1);
        let tree = BallTree::new(data, 1).unwrap();

        for node in &tree.nodes {
            for &i in &tree.idx_array[node.start..node.end] {
                let d = squared_euclidean(tree.point(i), &node.centroid).sqrt();
                assert!(d <= node.radius + 1e-9);
            }
        }
        // Balanced median splits: depth is ceil(log2(64)) = 6 with leaf_size 1
        assert_eq!(tree.depth(), 6);
        assert_eq!(tree.n_nodes(), 127);
    }

    #[test]
    fn test_ball_tree_invalid_input() {
        assert!(BallTree::new(DMatrix::zeros(0, 2), 1).is_err());
        assert!(BallTree::new(DMatrix::zeros(3, 2), 0).is_err());
        let nan = DMatrix::from_row_slice(1, 2, &[f64::NAN, 0.0]);
        assert!(BallTree::new(nan, 1).is_err());
    }

    // ===== Query tests =====

    #[test]
    fn test_query_matches_brute_force() {
        let data = random_data(200, 5, 2);
        let queries = random_data(30, 5, 3);

        for &leaf_size in &[1, 7, 40, 500] {
            let tree = BallTree::new(data.clone(), leaf_size).unwrap();
            let result = tree.query(&queries, 8).unwrap();
            let expected = brute_force(&data, &queries, 8);

            for i in 0..queries.nrows() {
                for j in 0..8 {
                    assert_eq!(result.indices[i][j], expected[i][j].1, "leaf_size {} row {}", leaf_size, i);
                    assert_relative_eq!(result.distances[(i, j)], expected[i][j].0, epsilon = 1e-10);
                }
            }
        }
    }

    #[test]
    fn test_query_grid_ties_match_brute_force() {
        // Coarse 0.1-step grid: many duplicates and equal distances, so tied
        // candidates sit exactly on pruning bounds
        let mut rng = StdRng::seed_from_u64(11);
        let grid = |rng: &mut StdRng, n: usize| {
            DMatrix::from_fn(n, 2, |_, _| rng.gen_range(0..4) as f64 * 0.1)
        };

        for round in 0..4 {
            let data = grid(&mut rng, 40);
            let queries = grid(&mut rng, 5);
            for &leaf_size in &[1, 2, 3, 8] {
                let tree = BallTree::new(data.clone(), leaf_size).unwrap();
                for &k in &[1, 3, 7, 15, 40] {
                    let result = tree.query(&queries, k).unwrap();
                    let expected = brute_force(&data, &queries, k);
                    for i in 0..queries.nrows() {
                        let indices: Vec<usize> = expected[i].iter().map(|&(_, j)| j).collect();
                        assert_eq!(
                            result.indices[i], indices,
                            "round {} leaf_size {} k {} row {}", round, leaf_size, k, i
                        );
                        for j in 0..k {
                            assert_eq!(result.distances[(i, j)], expected[i][j].0);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_query_integer_lattice_ties() {
        // Every point of a 5x5 lattice, queried at lattice points and cell centers
        let data = DMatrix::from_fn(25, 2, |i, j| if j == 0 { (i / 5) as f64 } else { (i % 5) as f64 });
        let queries = DMatrix::from_row_slice(4, 2, &[
            2.0, 2.0,
            0.5, 0.5,
            1.5, 3.5,
            4.0, 0.0,
        ]);

        for &leaf_size in &[1, 2, 4] {
            let tree = BallTree::new(data.clone(), leaf_size).unwrap();
            for &k in &[4, 5, 9, 13] {
                let result = tree.query(&queries, k).unwrap();
                let expected = brute_force(&data, &queries, k);
                for i in 0..queries.nrows() {
                    let indices: Vec<usize> = expected[i].iter().map(|&(_, j)| j).collect();
                    assert_eq!(result.indices[i], indices, "leaf_size {} k {} row {}", leaf_size, k, i);
                }
            }
        }
    }

    #[test]
    fn test_query_single_point() {
        // Distance 0.5 to the third sample
        let data = DMatrix::from_row_slice(3, 3, &[
            0.0, 0.0, 0.0,
            0.0, 0.5, 0.0,
            1.0, 1.0, 0.5,
        ]);
        let tree = BallTree::new(data, 1).unwrap();

        let result = tree.query_point(&[1.0, 1.0, 1.0], 1).unwrap();
        assert_relative_eq!(result.distances[(0, 0)], 0.5, epsilon = 1e-12);
        assert_eq!(result.indices, vec![vec![2]]);
    }

    #[test]
    fn test_query_ties_ordered_by_index() {
        // 1.5 is equidistant from 1 and 2
        let data = DMatrix::from_row_slice(4, 1, &[0.0, 1.0, 2.0, 3.0]);
        let tree = BallTree::new(data, 1).unwrap();

        let result = tree.query_point(&[1.5], 2).unwrap();
        assert_eq!(result.indices, vec![vec![1, 2]]);

        let result = tree.query_point(&[1.5], 4).unwrap();
        assert_eq!(result.indices, vec![vec![1, 2, 0, 3]]);
    }

    #[test]
    fn test_query_duplicate_points() {
        let data = DMatrix::from_row_slice(5, 2, &[
            1.0, 1.0,
            1.0, 1.0,
            1.0, 1.0,
            5.0, 5.0,
            1.0, 1.0,
        ]);
        let tree = BallTree::new(data, 1).unwrap();

        let result = tree.query_point(&[1.0, 1.0], 4).unwrap();
        assert_eq!(result.indices, vec![vec![0, 1, 2, 4]]);
        for j in 0..4 {
            assert_relative_eq!(result.distances[(0, j)], 0.0);
        }
    }

    #[test]
    fn test_query_invalid_k() {
        let tree = BallTree::new(random_data(5, 2, 4), 1).unwrap();
        let q = DMatrix::from_row_slice(1, 2, &[0.0, 0.0]);

        assert!(matches!(tree.query(&q, 0), Err(Error::InvalidInput(_))));
        assert!(matches!(tree.query(&q, 6), Err(Error::InvalidInput(_))));
        assert!(tree.query(&q, 5).is_ok());
    }

    #[test]
    fn test_query_dimension_mismatch() {
        let tree = BallTree::new(random_data(5, 2, 5), 1).unwrap();
        let q = DMatrix::from_row_slice(1, 3, &[0.0, 0.0, 0.0]);
        assert!(matches!(tree.query(&q, 1), Err(Error::ShapeMismatch { .. })));
    }

    // ===== Radius query tests =====

    #[test]
    fn test_query_radius_matches_brute_force() {
        let data = random_data(150, 3, 6);
        let queries = random_data(10, 3, 7);
        let tree = BallTree::new(data.clone(), 4).unwrap();
        let radius = 6.0;

        let result = tree.query_radius(&queries, radius).unwrap();
        let all = brute_force(&data, &queries, data.nrows());

        for i in 0..queries.nrows() {
            let expected: Vec<usize> = all[i]
                .iter()
                .filter(|(d, _)| *d <= radius)
                .map(|(_, j)| *j)
                .collect();
            assert_eq!(result.indices[i], expected);
            assert!(result.distances[i].windows(2).all(|w| w[0] <= w[1]));
        }
    }

    #[test]
    fn test_query_radius_includes_points_on_the_boundary() {
        let mut rng = StdRng::seed_from_u64(12);
        let data = DMatrix::from_fn(60, 2, |_, _| rng.gen_range(0..5) as f64 * 0.1);
        let queries = DMatrix::from_fn(6, 2, |_, _| rng.gen_range(0..5) as f64 * 0.1);
        let all = brute_force(&data, &queries, data.nrows());

        for &leaf_size in &[1, 3] {
            let tree = BallTree::new(data.clone(), leaf_size).unwrap();
            for i in 0..queries.nrows() {
                // The radius is an exact distance from the query to some point
                for &(radius, _) in all[i].iter().step_by(7) {
                    let q = DMatrix::from_row_slice(1, 2, &[queries[(i, 0)], queries[(i, 1)]]);
                    let result = tree.query_radius(&q, radius).unwrap();
                    let expected: Vec<usize> = all[i]
                        .iter()
                        .filter(|(d, _)| *d <= radius)
                        .map(|(_, j)| *j)
                        .collect();
                    assert_eq!(result.indices[0], expected, "leaf_size {} radius {}", leaf_size, radius);
                }
            }
        }
    }

    #[test]
    fn test_query_radius_negative() {
        let tree = BallTree::new(random_data(5, 2, 8), 1).unwrap();
        let q = DMatrix::from_row_slice(1, 2, &[0.0, 0.0]);
        assert!(tree.query_radius(&q, -1.0).is_err());
    }
}
