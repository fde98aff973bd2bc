//! Random draws mirroring numpy.random.

use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rand_distr::StandardNormal;

use crate::{Error, Result};

/// Matrix of independent standard normal draws.
pub fn standard_normal<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> DMatrix<f64> {
    DMatrix::from_fn(rows, cols, |_, _| rng.sample(StandardNormal))
}

/// One draw from `N(mean, cov)`.
///
/// `cov` only needs to be positive semidefinite: when the Cholesky
/// factorization fails the square root comes from an eigendecomposition with
/// negative rounding noise clipped to zero.
pub fn multivariate_normal<R: Rng + ?Sized>(
    mean: &DVector<f64>,
    cov: &DMatrix<f64>,
    rng: &mut R,
) -> Result<DVector<f64>> {
    let n = mean.len();
    if cov.shape() != (n, n) {
        return Err(Error::ShapeMismatch {
            expected: format!("({}, {})", n, n),
            got: format!("({}, {})", cov.nrows(), cov.ncols()),
        });
    }

    let factor = match cov.clone().cholesky() {
        Some(chol) => chol.l(),
        None => {
            let eig = cov.clone().symmetric_eigen();
            let scale = eig.eigenvalues.iter().fold(0.0f64, |m, v| m.max(v.abs()));
            if eig.eigenvalues.iter().any(|&v| v < -1e-8 * scale.max(1.0)) {
                return Err(Error::InvalidInput(
                    "covariance matrix is not positive semidefinite".to_string(),
                ));
            }
            let roots = eig.eigenvalues.map(|v| v.max(0.0).sqrt());
            &eig.eigenvectors * DMatrix::from_diagonal(&roots)
        }
    };

    let noise: DVector<f64> = DVector::from_fn(n, |_, _| rng.sample(StandardNormal));
    Ok(mean + factor * noise)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_standard_normal_shape_and_moments() {
        let mut rng = StdRng::seed_from_u64(0);
        let m = standard_normal(2000, 2, &mut rng);
        assert_eq!(m.shape(), (2000, 2));

        let mean = m.column(0).mean();
        let var = m.column(0).variance();
        assert!(mean.abs() < 0.1, "mean {}", mean);
        assert!((var - 1.0).abs() < 0.1, "variance {}", var);
    }

    #[test]
    fn test_multivariate_normal_degenerate_covariance() {
        // Zero covariance collapses the draw onto the mean
        let mut rng = StdRng::seed_from_u64(1);
        let mean = DVector::from_vec(vec![1.0, -2.0]);
        let draw = multivariate_normal(&mean, &DMatrix::zeros(2, 2), &mut rng).unwrap();
        assert_relative_eq!(draw[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(draw[1], -2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_multivariate_normal_rejects_indefinite() {
        let mut rng = StdRng::seed_from_u64(2);
        let cov = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, -1.0]);
        assert!(multivariate_normal(&DVector::zeros(2), &cov, &mut rng).is_err());
        assert!(multivariate_normal(&DVector::zeros(3), &cov, &mut rng).is_err());
    }
}
