//! Nearest-neighbor search and estimators built on top of it.
//!
//! - [`BallTree`]: space-partitioning index for exact k-nearest-neighbor queries
//! - [`Neighbors`]: k-nearest-neighbor vote classifier
//! - [`NeighborsBarycenter`]: regression with barycenter weights
//! - [`kneighbors_graph`]: sparse k-neighbors graph in adjacency, distance or
//!   barycenter mode

mod ball_tree;
mod barycenter;
mod classifier;
mod graph;
mod params;
mod regression;

pub use ball_tree::{BallTree, QueryResult, RadiusResult};
pub use barycenter::{barycenter_weights, DEFAULT_EPS};
pub use classifier::Neighbors;
pub use graph::{kneighbors_graph, GraphMode};
pub use params::NeighborsParams;
pub use regression::NeighborsBarycenter;
