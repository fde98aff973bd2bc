//! # sklearn-rs - Machine learning estimators
//!
//! Rust port of a slice of the early scikits.learn toolkit.
//!
//! Every estimator follows the same convention: build it from a plain
//! parameter struct, `fit` it on training data, then `predict`.
//!
//! ## Features
//!
//! - Ball tree spatial index with k-nearest-neighbor and radius queries
//! - k-NN classification (majority vote) and barycenter regression
//! - Sparse k-neighbors graphs (adjacency, distance, barycenter weights)
//! - Linear-Gaussian Kalman filter with RTS smoothing and EM learning
//! - Lasso and randomized Lasso (stability selection)
//!
//! ## Example
//!
//! ```rust,ignore
//! use sklearn_rs::{Neighbors, NeighborsParams, Predict};
//! use nalgebra::DMatrix;
//!
//! let samples = DMatrix::from_row_slice(4, 3, &[
//!     0.0, 0.0, 1.0,
//!     1.0, 0.0, 0.0,
//!     2.0, 2.0, 2.0,
//!     2.0, 5.0, 4.0,
//! ]);
//! let mut neigh = Neighbors::new(NeighborsParams::new(3)).unwrap();
//! neigh.fit(&samples, &[0, 0, 1, 1]).unwrap();
//! let labels = neigh.predict(&DMatrix::from_row_slice(1, 3, &[0.0, 0.0, 0.0])).unwrap();
//! assert_eq!(labels, vec![0]);
//! ```

// Internal modules (ports of scipy and numpy helpers)
pub(crate) mod internal;

// Public modules
pub mod base;
pub mod neighbors;
pub mod kalman;
pub mod linear_model;
pub mod metrics;
pub mod datasets;
pub mod utils;

// Re-exports for convenience
pub use base::{Classifier, Estimator, Predict, Regressor, Transform};
pub use neighbors::{
    barycenter_weights, kneighbors_graph, BallTree, GraphMode, Neighbors, NeighborsBarycenter,
    NeighborsParams, QueryResult, RadiusResult,
};
pub use kalman::{EmVars, FilterResult, KalmanFilter, KalmanParams, Offsets, SmoothResult};
pub use linear_model::{Lasso, LassoParams, RandomizedLasso, RandomizedLassoParams};
pub use metrics::Metric;
pub use utils::RandomState;

// Error types
pub use crate::error::{Error, Result};

mod error {
    use thiserror::Error;

    /// Errors that can occur in the sklearn-rs library
    #[derive(Error, Debug)]
    pub enum Error {
        #[error("Invalid configuration: {0}")]
        InvalidConfig(String),

        #[error("Invalid input: {0}")]
        InvalidInput(String),

        #[error("Invalid shape: expected {expected}, got {got}")]
        ShapeMismatch { expected: String, got: String },

        #[error("Estimator is not fitted yet: call fit() first")]
        NotFitted,

        #[error("Linear algebra error: {0}")]
        LinAlg(String),

        #[error("Unknown mode: {0}")]
        UnknownMode(String),

        #[error("Serialization error: {0}")]
        Serialization(#[from] serde_json::Error),

        #[error("IO error: {0}")]
        IoError(#[from] std::io::Error),
    }

    /// Result type for sklearn-rs operations
    pub type Result<T> = std::result::Result<T, Error>;
}
