//! Utility functions shared by the estimators.

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::{Mutex, OnceLock};

use log::warn;
use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use sprs::{CsMat, TriMat};

use crate::internal::numpy::take_rows;
use crate::{Error, Result};

/// Source of randomness for an estimator.
///
/// `Entropy` seeds a fresh generator from the operating system; `Seed`
/// always produces the same stream. Code that already owns a generator
/// passes it directly instead.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RandomState {
    #[default]
    Entropy,
    Seed(u64),
}

impl RandomState {
    pub fn into_rng(self) -> StdRng {
        match self {
            RandomState::Entropy => StdRng::from_entropy(),
            RandomState::Seed(seed) => StdRng::seed_from_u64(seed),
        }
    }
}

impl From<u64> for RandomState {
    fn from(seed: u64) -> Self {
        RandomState::Seed(seed)
    }
}

impl From<Option<u64>> for RandomState {
    fn from(seed: Option<u64>) -> Self {
        seed.map_or(RandomState::Entropy, RandomState::Seed)
    }
}

impl FromStr for RandomState {
    type Err = Error;

    /// `"none"` for entropy, otherwise an integer seed.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("none") {
            return Ok(RandomState::Entropy);
        }
        s.parse::<u64>()
            .map(RandomState::Seed)
            .map_err(|_| Error::InvalidConfig(format!("'{}' cannot be used to seed a random state", s)))
    }
}

/// Resample arrays in a consistent way.
///
/// All arrays are indexed by the same rows: a permutation when `replace` is
/// false, a bootstrap sample otherwise.
///
/// # Arguments
/// * `arrays` - Matrices sharing their number of rows
/// * `replace` - Sample with replacement
/// * `n_samples` - Number of rows to draw (defaults to all rows)
/// * `random_state` - Seed for the row draw
///
/// # Returns
/// One resampled matrix per input, in order; an empty vector for no inputs.
pub fn resample(
    arrays: &[&DMatrix<f64>],
    replace: bool,
    n_samples: Option<usize>,
    random_state: RandomState,
) -> Result<Vec<DMatrix<f64>>> {
    let first = match arrays.first() {
        Some(first) => first,
        None => return Ok(Vec::new()),
    };

    let n_rows = first.nrows();
    if let Some(other) = arrays.iter().find(|a| a.nrows() != n_rows) {
        return Err(Error::ShapeMismatch {
            expected: format!("{} rows in every array", n_rows),
            got: format!("{} rows", other.nrows()),
        });
    }

    let max_n_samples = n_samples.unwrap_or(n_rows);
    if max_n_samples > n_rows {
        return Err(Error::InvalidInput(format!(
            "cannot sample {} out of arrays with {} rows",
            max_n_samples, n_rows
        )));
    }

    let mut rng = random_state.into_rng();
    let indices: Vec<usize> = if replace {
        (0..max_n_samples).map(|_| rng.gen_range(0..n_rows)).collect()
    } else {
        let mut perm: Vec<usize> = (0..n_rows).collect();
        perm.shuffle(&mut rng);
        perm.truncate(max_n_samples);
        perm
    };

    Ok(arrays.iter().map(|a| take_rows(a, &indices)).collect())
}

/// Turn a boolean row mask into row indices usable on dense and sparse data.
pub fn safe_mask(mask: &[bool]) -> Vec<usize> {
    mask.iter()
        .enumerate()
        .filter(|(_, keep)| **keep)
        .map(|(i, _)| i)
        .collect()
}

/// Dense or sparse two-dimensional data.
#[derive(Clone, Debug, PartialEq)]
pub enum Data {
    Dense(DMatrix<f64>),
    Sparse(CsMat<f64>),
}

impl Data {
    pub fn shape(&self) -> (usize, usize) {
        match self {
            Data::Dense(m) => m.shape(),
            Data::Sparse(m) => m.shape(),
        }
    }

    pub fn nrows(&self) -> usize {
        self.shape().0
    }

    pub fn ncols(&self) -> usize {
        self.shape().1
    }

    pub fn is_sparse(&self) -> bool {
        matches!(self, Data::Sparse(_))
    }

    pub fn to_dense(&self) -> DMatrix<f64> {
        match self {
            Data::Dense(m) => m.clone(),
            Data::Sparse(m) => sparse_to_dense(m),
        }
    }

    /// CSR copy with the zero entries dropped.
    pub fn to_sparse(&self) -> CsMat<f64> {
        match self {
            Data::Sparse(m) => m.to_csr(),
            Data::Dense(m) => {
                let mut triplets = TriMat::new(m.shape());
                for j in 0..m.ncols() {
                    for i in 0..m.nrows() {
                        if m[(i, j)] != 0.0 {
                            triplets.add_triplet(i, j, m[(i, j)]);
                        }
                    }
                }
                triplets.to_csr()
            }
        }
    }

    /// Gather rows by index, keeping the storage kind.
    pub fn select_rows(&self, indices: &[usize]) -> Result<Data> {
        let n_rows = self.nrows();
        if let Some(&bad) = indices.iter().find(|&&i| i >= n_rows) {
            return Err(Error::InvalidInput(format!(
                "row index {} out of bounds for {} rows",
                bad, n_rows
            )));
        }

        match self {
            Data::Dense(m) => Ok(Data::Dense(take_rows(m, indices))),
            Data::Sparse(m) => {
                let csr = m.to_csr();
                let mut indptr = Vec::with_capacity(indices.len() + 1);
                let mut col_inds = Vec::new();
                let mut data = Vec::new();
                indptr.push(0);
                for &i in indices {
                    if let Some(row) = csr.outer_view(i) {
                        for (j, &v) in row.iter() {
                            col_inds.push(j);
                            data.push(v);
                        }
                    }
                    indptr.push(col_inds.len());
                }
                Ok(Data::Sparse(CsMat::new(
                    (indices.len(), csr.cols()),
                    indptr,
                    col_inds,
                    data,
                )))
            }
        }
    }
}

fn sparse_to_dense(m: &CsMat<f64>) -> DMatrix<f64> {
    let mut dense = DMatrix::zeros(m.rows(), m.cols());
    for (&v, (i, j)) in m.iter() {
        dense[(i, j)] += v;
    }
    dense
}

/// `a @ b` for any mix of dense and sparse operands.
///
/// The product of two sparse operands stays sparse unless `dense_output` is
/// set; any dense operand gives a dense result.
pub fn safe_sparse_dot(a: &Data, b: &Data, dense_output: bool) -> Result<Data> {
    if a.ncols() != b.nrows() {
        return Err(Error::ShapeMismatch {
            expected: format!("right operand with {} rows", a.ncols()),
            got: format!("{:?}", b.shape()),
        });
    }

    let product = match (a, b) {
        (Data::Dense(a), Data::Dense(b)) => Data::Dense(a * b),
        (Data::Sparse(a), Data::Sparse(b)) => {
            let product: CsMat<f64> = &a.to_csr() * &b.to_csr();
            if dense_output {
                Data::Dense(sparse_to_dense(&product))
            } else {
                Data::Sparse(product)
            }
        }
        (Data::Sparse(a), Data::Dense(b)) => {
            // Row i of the result accumulates a[i, k] * b[k, :]
            let mut out = DMatrix::zeros(a.rows(), b.ncols());
            for (&v, (i, k)) in a.iter() {
                for j in 0..b.ncols() {
                    out[(i, j)] += v * b[(k, j)];
                }
            }
            Data::Dense(out)
        }
        (Data::Dense(a), Data::Sparse(b)) => {
            let mut out = DMatrix::zeros(a.nrows(), b.cols());
            for (&v, (k, j)) in b.iter() {
                for i in 0..a.nrows() {
                    out[(i, j)] += a[(i, k)] * v;
                }
            }
            Data::Dense(out)
        }
    };

    Ok(product)
}

/// Global set of warned messages (for warn_once).
static WARNED_MESSAGES: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();

/// Log a warning only the first time a given message is seen.
///
/// Returns whether the message was logged.
pub fn warn_once(message: &str) -> bool {
    let warned = WARNED_MESSAGES.get_or_init(|| Mutex::new(HashSet::new()));
    let first_time = match warned.lock() {
        Ok(mut guard) => guard.insert(message.to_string()),
        Err(_) => false,
    };
    if first_time {
        warn!("{}", message);
    }
    first_time
}
