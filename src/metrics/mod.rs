//! Evaluation metrics and pairwise distances.
//!
//! This module provides:
//! - `Metric` and `pairwise_distances` - scipy-style distance matrices
//! - Classification scores (`accuracy_score`, `confusion_matrix`)
//! - Regression scores (`r2_score`, `mean_squared_error`)

mod pairwise;
mod scores;

pub use pairwise::{pairwise_distances, Metric};
pub use scores::{accuracy_score, confusion_matrix, mean_squared_error, r2_score};
