//! Dense linear solves ported from scipy.linalg.
//!
//! `solve_sym_pos` mirrors `scipy.linalg.solve(a, b, sym_pos=True)`: a Cholesky
//! solve, with an LU fallback for matrices that lost positive definiteness to
//! rounding.

use log::warn;
use nalgebra::{DMatrix, DVector};

use crate::{Error, Result};

/// Solve `a @ x = b` for a symmetric positive definite `a`.
pub fn solve_sym_pos(a: &DMatrix<f64>, b: &DVector<f64>) -> Result<DVector<f64>> {
    check_square(a, b.len())?;

    if let Some(chol) = a.clone().cholesky() {
        return Ok(chol.solve(b));
    }

    warn!(
        "matrix of size {} is not positive definite, falling back to LU solve",
        a.nrows()
    );
    a.clone()
        .lu()
        .solve(b)
        .ok_or_else(|| Error::LinAlg(format!("singular matrix of size {}", a.nrows())))
}

/// Inverse of a symmetric positive definite matrix.
pub fn inv_sym_pos(a: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    check_square(a, a.nrows())?;

    match a.clone().cholesky() {
        Some(chol) => Ok(chol.inverse()),
        None => a
            .clone()
            .try_inverse()
            .ok_or_else(|| Error::LinAlg(format!("singular matrix of size {}", a.nrows()))),
    }
}

/// Log density of a zero-mean multivariate normal with covariance `cov` at `residual`.
pub fn gaussian_log_pdf(residual: &DVector<f64>, cov: &DMatrix<f64>) -> Result<f64> {
    check_square(cov, residual.len())?;

    let chol = cov.clone().cholesky().ok_or_else(|| {
        Error::LinAlg("covariance matrix is not positive definite".to_string())
    })?;

    let l = chol.l();
    let log_det: f64 = 2.0 * l.diagonal().iter().map(|v| v.ln()).sum::<f64>();
    let mahalanobis = residual.dot(&chol.solve(residual));
    let n = residual.len() as f64;

    Ok(-0.5 * (n * (2.0 * std::f64::consts::PI).ln() + log_det + mahalanobis))
}

/// Symmetrize a matrix in place: `(a + a.T) / 2`.
pub fn symmetrize(a: &mut DMatrix<f64>) {
    let t = a.transpose();
    *a += t;
    *a *= 0.5;
}

fn check_square(a: &DMatrix<f64>, n: usize) -> Result<()> {
    if a.nrows() != a.ncols() || a.nrows() != n {
        return Err(Error::ShapeMismatch {
            expected: format!("square matrix of size {}", n),
            got: format!("({}, {})", a.nrows(), a.ncols()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_solve_sym_pos() {
        let a = DMatrix::from_row_slice(2, 2, &[
            4.0, 1.0,
            1.0, 3.0,
        ]);
        let b = DVector::from_vec(vec![1.0, 2.0]);

        let x = solve_sym_pos(&a, &b).unwrap();

        let back = &a * &x;
        assert_relative_eq!(back[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(back[1], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_solve_indefinite_falls_back_to_lu() {
        // Symmetric but indefinite: Cholesky fails, LU succeeds
        let a = DMatrix::from_row_slice(2, 2, &[
            0.0, 1.0,
            1.0, 0.0,
        ]);
        let b = DVector::from_vec(vec![2.0, 3.0]);

        let x = solve_sym_pos(&a, &b).unwrap();
        assert_relative_eq!(x[0], 3.0, epsilon = 1e-12);
        assert_relative_eq!(x[1], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_solve_singular_is_error() {
        let a = DMatrix::zeros(2, 2);
        let b = DVector::from_vec(vec![1.0, 1.0]);
        assert!(matches!(solve_sym_pos(&a, &b), Err(Error::LinAlg(_))));
    }

    #[test]
    fn test_solve_shape_mismatch() {
        let a = DMatrix::identity(3, 3);
        let b = DVector::from_vec(vec![1.0, 1.0]);
        assert!(matches!(solve_sym_pos(&a, &b), Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_gaussian_log_pdf_standard_normal() {
        // 1-D standard normal at 0: -0.5 * ln(2 pi)
        let r = DVector::from_vec(vec![0.0]);
        let cov = DMatrix::identity(1, 1);
        let expected = -0.5 * (2.0 * std::f64::consts::PI).ln();
        assert_relative_eq!(gaussian_log_pdf(&r, &cov).unwrap(), expected, epsilon = 1e-12);

        // 2-D diagonal covariance, residual [1, 2], variances [1, 4]
        let r = DVector::from_vec(vec![1.0, 2.0]);
        let cov = DMatrix::from_diagonal(&DVector::from_vec(vec![1.0, 4.0]));
        let expected = -0.5 * (2.0 * (2.0 * std::f64::consts::PI).ln() + 4.0_f64.ln() + 2.0);
        assert_relative_eq!(gaussian_log_pdf(&r, &cov).unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_inv_sym_pos() {
        let a = DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 4.0]);
        let inv = inv_sym_pos(&a).unwrap();
        assert_relative_eq!(inv[(0, 0)], 0.5, epsilon = 1e-12);
        assert_relative_eq!(inv[(1, 1)], 0.25, epsilon = 1e-12);
    }
}
