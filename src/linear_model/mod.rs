//! Generalized linear models.
//!
//! - [`Lasso`]: L1-penalized least squares by coordinate descent
//! - [`RandomizedLasso`]: stability selection on randomized Lasso fits

mod lasso;
mod randomized_lasso;

pub use lasso::{Lasso, LassoParams};
pub use randomized_lasso::{RandomizedLasso, RandomizedLassoParams};
