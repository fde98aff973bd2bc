//! Barycenter weights.
//!
//! Reference: "An introduction to Locally Linear Embedding", Saul & Roweis.

use nalgebra::{DMatrix, DVector};

use crate::internal::scipy::solve_sym_pos;
use crate::{Error, Result};

/// Default amount of regularization added to the Gram matrix diagonal.
pub const DEFAULT_EPS: f64 = 1e-6;

/// Compute barycenter weights of `x` from `neighbors`.
///
/// For each sample `x[i]` this finds the weights `w` (summing to 1) that best
/// reconstruct it from the rows of `neighbors[i]`, minimizing
/// `|x_i - sum_j w_j y_j|^2`. The local Gram matrix is regularized by
/// `eps * trace(G)` on its diagonal (`eps` alone when the trace is zero).
///
/// # Arguments
/// * `x` - Samples (n_samples x n_dim)
/// * `neighbors` - One (n_neighbors x n_dim) matrix per sample
/// * `eps` - Regularization amount
///
/// # Returns
/// Weight matrix (n_samples x n_neighbors); every row sums to 1.
pub fn barycenter_weights(
    x: &DMatrix<f64>,
    neighbors: &[DMatrix<f64>],
    eps: f64,
) -> Result<DMatrix<f64>> {
    let n_samples = x.nrows();
    let n_dim = x.ncols();

    if neighbors.len() != n_samples {
        return Err(Error::ShapeMismatch {
            expected: format!("{} neighbor sets", n_samples),
            got: format!("{} neighbor sets", neighbors.len()),
        });
    }
    if eps.is_nan() || eps < 0.0 {
        return Err(Error::InvalidConfig(format!(
            "eps must be non-negative, got {}",
            eps
        )));
    }

    let n_neighbors = neighbors.first().map(|y| y.nrows()).unwrap_or(0);
    if n_samples > 0 && n_neighbors == 0 {
        return Err(Error::InvalidInput(
            "at least one neighbor per sample is required".to_string(),
        ));
    }

    let mut weights = DMatrix::zeros(n_samples, n_neighbors);
    let ones = DVector::from_element(n_neighbors, 1.0);

    for (i, y) in neighbors.iter().enumerate() {
        if y.shape() != (n_neighbors, n_dim) {
            return Err(Error::ShapeMismatch {
                expected: format!("({}, {})", n_neighbors, n_dim),
                got: format!("({}, {})", y.nrows(), y.ncols()),
            });
        }

        // Z[j] = x_i - y_j
        let xi = x.row(i);
        let mut z = -y.clone();
        for mut row in z.row_iter_mut() {
            row += &xi;
        }

        let mut gram = &z * z.transpose();
        let trace = gram.trace();
        let reg = if trace > 0.0 { eps * trace } else { eps };
        for j in 0..n_neighbors {
            gram[(j, j)] += reg;
        }

        let w = solve_sym_pos(&gram, &ones)?;
        let total = w.sum();
        if total == 0.0 || !total.is_finite() {
            return Err(Error::LinAlg(format!(
                "degenerate barycenter weights for sample {}",
                i
            )));
        }
        weights.set_row(i, &(w / total).transpose());
    }

    Ok(weights)
}
