//! SciPy functions port.
//!
//! Ported from:
//! - scipy.spatial.distance
//! - scipy.linalg
//! - scipy.stats
//!
//! License: BSD 3-Clause (SciPy Developers)

mod distance;
mod linalg;
mod stats;

pub use distance::*;
pub use linalg::*;
pub use stats::*;
