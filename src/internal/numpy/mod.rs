//! NumPy-like helpers.

mod array;
mod random;

pub use array::*;
pub use random::*;
