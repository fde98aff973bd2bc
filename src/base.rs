//! Estimator traits shared by all models.

use nalgebra::{DMatrix, DVector};

use crate::metrics::{accuracy_score, r2_score};
use crate::Result;

/// Trait for configurable estimators.
///
/// Every estimator is built from a plain parameter struct. Parameters can be
/// replaced after construction; they are validated the same way the
/// constructor validates them.
pub trait Estimator {
    /// Parameter struct for this estimator.
    type Params: Clone;

    /// Current parameters.
    fn params(&self) -> &Self::Params;

    /// Replace the parameters.
    ///
    /// A fitted model keeps its learned state; only the knobs change.
    fn set_params(&mut self, params: Self::Params) -> Result<()>;
}

/// Trait for models that map samples to predictions.
pub trait Predict {
    /// Prediction type (labels or targets).
    type Output;

    /// Predict for each row of `x` (n_samples x n_features).
    fn predict(&self, x: &DMatrix<f64>) -> Result<Self::Output>;
}

/// Trait for models that map samples to a new feature space.
pub trait Transform {
    /// Transform each row of `x`.
    fn transform(&self, x: &DMatrix<f64>) -> Result<DMatrix<f64>>;
}

/// Classifiers predict one integer label per sample.
pub trait Classifier: Predict<Output = Vec<i64>> {
    /// Mean accuracy on the given test data and labels.
    fn score(&self, x: &DMatrix<f64>, y: &[i64]) -> Result<f64> {
        let predicted = self.predict(x)?;
        accuracy_score(y, &predicted)
    }
}

/// Regressors predict one real target per sample.
pub trait Regressor: Predict<Output = DVector<f64>> {
    /// Coefficient of determination R^2 of the prediction.
    fn score(&self, x: &DMatrix<f64>, y: &DVector<f64>) -> Result<f64> {
        let predicted = self.predict(x)?;
        r2_score(y, &predicted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Labels every sample by the sign of its first feature.
    struct SignClassifier;

    impl Predict for SignClassifier {
        type Output = Vec<i64>;

        fn predict(&self, x: &DMatrix<f64>) -> Result<Vec<i64>> {
            Ok(x.column(0).iter().map(|&v| if v >= 0.0 { 1 } else { 0 }).collect())
        }
    }

    impl Classifier for SignClassifier {}

    /// Predicts twice the first feature.
    struct DoubleRegressor;

    impl Predict for DoubleRegressor {
        type Output = DVector<f64>;

        fn predict(&self, x: &DMatrix<f64>) -> Result<DVector<f64>> {
            Ok(x.column(0) * 2.0)
        }
    }

    impl Regressor for DoubleRegressor {}

    #[test]
    fn test_classifier_default_score() {
        let x = DMatrix::from_column_slice(4, 1, &[-1.0, 2.0, 3.0, -4.0]);
        let score = SignClassifier.score(&x, &[0, 1, 0, 0]).unwrap();
        assert_relative_eq!(score, 0.75);
        assert!(SignClassifier.score(&x, &[0, 1]).is_err());
    }

    #[test]
    fn test_regressor_default_score() {
        let x = DMatrix::from_column_slice(3, 1, &[1.0, 2.0, 3.0]);
        let y = DVector::from_vec(vec![2.0, 4.0, 6.0]);
        assert_relative_eq!(DoubleRegressor.score(&x, &y).unwrap(), 1.0);

        let off = DVector::from_vec(vec![2.0, 4.0, 7.0]);
        assert!(DoubleRegressor.score(&x, &off).unwrap() < 1.0);
    }
}
