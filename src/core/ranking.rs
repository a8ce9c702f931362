//! Deterministic descending ordering of match results.

use std::cmp::Ordering;

/// Sort `records` by `key` from highest to lowest.
///
/// Runs a stable ascending sort and then reverses the whole list, so records
/// with equal keys come out in the reverse of their input order. Callers
/// relying on reproducible output depend on that tie-break.
pub fn sort_descending<T, K, F>(mut records: Vec<T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> K,
    K: PartialOrd,
{
    records.sort_by(|a, b| key(a).partial_cmp(&key(b)).unwrap_or(Ordering::Equal));
    records.reverse();
    records
}
