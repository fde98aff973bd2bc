//! Pairwise distance matrices.

use std::fmt;
use std::str::FromStr;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::internal::scipy::cdist;
use crate::{Error, Result};

/// Distance metrics understood by `pairwise_distances`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    #[default]
    Euclidean,
    SquaredEuclidean,
    Manhattan,
    Chebyshev,
    Cosine,
}

impl Metric {
    /// Look up a metric by its scipy name.
    ///
    /// Supported names:
    /// - "euclidean"
    /// - "sqeuclidean", "squared_euclidean"
    /// - "manhattan", "cityblock"
    /// - "chebyshev"
    /// - "cosine"
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "euclidean" => Ok(Metric::Euclidean),
            "sqeuclidean" | "squared_euclidean" => Ok(Metric::SquaredEuclidean),
            "manhattan" | "cityblock" => Ok(Metric::Manhattan),
            "chebyshev" => Ok(Metric::Chebyshev),
            "cosine" => Ok(Metric::Cosine),
            _ => Err(Error::UnknownMode(format!("metric '{}'", name))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Metric::Euclidean => "euclidean",
            Metric::SquaredEuclidean => "sqeuclidean",
            Metric::Manhattan => "manhattan",
            Metric::Chebyshev => "chebyshev",
            Metric::Cosine => "cosine",
        }
    }
}

impl FromStr for Metric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Metric::from_name(s)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Distance matrix between the rows of `xa` and the rows of `xb`.
///
/// # Returns
/// Matrix of shape (n_samples_a, n_samples_b); entry (i, j) is the distance
/// between row i of `xa` and row j of `xb`.
pub fn pairwise_distances(
    xa: &DMatrix<f64>,
    xb: &DMatrix<f64>,
    metric: Metric,
) -> Result<DMatrix<f64>> {
    if xa.ncols() != xb.ncols() {
        return Err(Error::ShapeMismatch {
            expected: format!("{} features", xa.ncols()),
            got: format!("{} features", xb.ncols()),
        });
    }
    Ok(cdist(xa, xb, metric))
}
