//! Port of scipy.spatial.distance (`cdist` and the metrics it dispatches to).

use nalgebra::DMatrix;

use crate::internal::numpy::rows_to_vecs;
use crate::metrics::Metric;

/// Distance between two points given as equal-length slices.
#[inline]
pub fn point_distance(a: &[f64], b: &[f64], metric: Metric) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    match metric {
        Metric::Euclidean => squared_euclidean(a, b).sqrt(),
        Metric::SquaredEuclidean => squared_euclidean(a, b),
        Metric::Manhattan => a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum(),
        Metric::Chebyshev => a
            .iter()
            .zip(b)
            .map(|(x, y)| (x - y).abs())
            .fold(0.0, f64::max),
        Metric::Cosine => {
            let (dot, aa, bb) = a.iter().zip(b).fold((0.0, 0.0, 0.0), |(dot, aa, bb), (x, y)| {
                (dot + x * y, aa + x * x, bb + y * y)
            });
            let denom = (aa * bb).sqrt();
            if denom == 0.0 {
                1.0
            } else {
                1.0 - dot / denom
            }
        }
    }
}

#[inline]
pub fn squared_euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Distances between every row of `xa` and every row of `xb`.
///
/// Callers check that both matrices have the same number of columns.
///
/// # Returns
/// (n_a x n_b) matrix with `d(xa[i], xb[j])` at (i, j).
pub fn cdist(xa: &DMatrix<f64>, xb: &DMatrix<f64>, metric: Metric) -> DMatrix<f64> {
    debug_assert_eq!(xa.ncols(), xb.ncols());

    let rows_a = rows_to_vecs(xa);
    let rows_b = rows_to_vecs(xb);

    DMatrix::from_fn(rows_a.len(), rows_b.len(), |i, j| {
        point_distance(&rows_a[i], &rows_b[j], metric)
    })
}
