//! Internal modules ported from external libraries.
//!
//! These modules contain code adapted from:
//! - scipy: Distance metrics, dense linear solves, mode
//! - numpy: Array utilities

pub mod scipy;
pub mod numpy;
