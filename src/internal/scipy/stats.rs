//! Port of scipy.stats.mode for integer labels.

use std::collections::BTreeMap;

/// Most frequent value and its count.
///
/// Ties resolve to the smallest value, matching `scipy.stats.mode`.
/// Returns `None` for an empty slice.
pub fn mode(values: &[i64]) -> Option<(i64, usize)> {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for &v in values {
        *counts.entry(v).or_insert(0) += 1;
    }

    // BTreeMap iterates in ascending key order, so the first maximum wins
    let mut best: Option<(i64, usize)> = None;
    for (value, count) in counts {
        match best {
            Some((_, best_count)) if count <= best_count => {}
            _ => best = Some((value, count)),
        }
    }
    best
}
