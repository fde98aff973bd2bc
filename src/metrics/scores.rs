//! Classification and regression scores.

use nalgebra::{DMatrix, DVector};

use crate::internal::numpy::check_consistent_length;
use crate::{Error, Result};

fn check_targets(n_true: usize, n_pred: usize) -> Result<()> {
    check_consistent_length(n_true, n_pred)?;
    if n_true == 0 {
        return Err(Error::InvalidInput("empty target arrays".to_string()));
    }
    Ok(())
}

/// Fraction of predictions equal to the true labels.
pub fn accuracy_score(y_true: &[i64], y_pred: &[i64]) -> Result<f64> {
    check_targets(y_true.len(), y_pred.len())?;
    let correct = y_true.iter().zip(y_pred).filter(|(a, b)| a == b).count();
    Ok(correct as f64 / y_true.len() as f64)
}

/// Confusion matrix over the sorted union of labels.
///
/// # Returns
/// `(labels, counts)` where `counts[(i, j)]` is the number of samples with
/// true label `labels[i]` predicted as `labels[j]`.
pub fn confusion_matrix(y_true: &[i64], y_pred: &[i64]) -> Result<(Vec<i64>, DMatrix<usize>)> {
    check_targets(y_true.len(), y_pred.len())?;

    let mut labels: Vec<i64> = y_true.iter().chain(y_pred).cloned().collect();
    labels.sort_unstable();
    labels.dedup();

    let position = |label: i64| labels.binary_search(&label).unwrap_or_default();

    let mut counts = DMatrix::<usize>::zeros(labels.len(), labels.len());
    for (&t, &p) in y_true.iter().zip(y_pred) {
        counts[(position(t), position(p))] += 1;
    }

    Ok((labels, counts))
}

/// Mean of squared residuals.
pub fn mean_squared_error(y_true: &DVector<f64>, y_pred: &DVector<f64>) -> Result<f64> {
    check_targets(y_true.len(), y_pred.len())?;
    Ok((y_true - y_pred).norm_squared() / y_true.len() as f64)
}

/// Coefficient of determination R^2.
///
/// A constant `y_true` scores 1.0 for perfect predictions and 0.0 otherwise.
pub fn r2_score(y_true: &DVector<f64>, y_pred: &DVector<f64>) -> Result<f64> {
    check_targets(y_true.len(), y_pred.len())?;

    let mean = y_true.mean();
    let ss_res = (y_true - y_pred).norm_squared();
    let ss_tot: f64 = y_true.iter().map(|v| (v - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }
    Ok(1.0 - ss_res / ss_tot)
}
