//! NumPy-like array operations.

use nalgebra::{DMatrix, DVector};
use crate::{Error, Result};

/// Validate a sample matrix: at least one row and one column, finite values.
pub fn check_array(x: &DMatrix<f64>) -> Result<()> {
    let (rows, cols) = x.shape();

    if rows == 0 || cols == 0 {
        return Err(Error::ShapeMismatch {
            expected: "(n_samples, n_features) with n_samples, n_features >= 1".to_string(),
            got: format!("({}, {})", rows, cols),
        });
    }

    if x.iter().any(|v| !v.is_finite()) {
        return Err(Error::InvalidInput(
            "input contains NaN or infinity".to_string(),
        ));
    }

    Ok(())
}

/// Treat a flat slice as a single sample: `[x, y, ...]` -> `[[x, y, ...]]`.
pub fn atleast_2d(point: &[f64]) -> DMatrix<f64> {
    DMatrix::from_row_slice(1, point.len(), point)
}

/// Copy each row of a matrix into its own contiguous vector.
pub fn rows_to_vecs(matrix: &DMatrix<f64>) -> Vec<Vec<f64>> {
    matrix
        .row_iter()
        .map(|row| row.iter().cloned().collect())
        .collect()
}

/// Flatten a matrix in row-major order.
pub fn to_row_major_vec(matrix: &DMatrix<f64>) -> Vec<f64> {
    matrix.transpose().as_slice().to_vec()
}

/// Gather rows by index (`X[indices]`).
pub fn take_rows(matrix: &DMatrix<f64>, indices: &[usize]) -> DMatrix<f64> {
    DMatrix::from_fn(indices.len(), matrix.ncols(), |i, j| matrix[(indices[i], j)])
}

/// Gather entries by index (`y[indices]`).
pub fn take(values: &DVector<f64>, indices: &[usize]) -> DVector<f64> {
    DVector::from_iterator(indices.len(), indices.iter().map(|&i| values[i]))
}

/// Whether row `i` contains a NaN (used as a missing-value marker).
pub fn row_has_nan(matrix: &DMatrix<f64>, i: usize) -> bool {
    matrix.row(i).iter().any(|v| v.is_nan())
}

/// Check that two inputs agree on their number of samples.
pub fn check_consistent_length(n_x: usize, n_y: usize) -> Result<()> {
    if n_x != n_y {
        return Err(Error::ShapeMismatch {
            expected: format!("{} samples", n_x),
            got: format!("{} samples", n_y),
        });
    }
    Ok(())
}
