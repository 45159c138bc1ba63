//! Elbow heuristic for choosing the number of clusters
//!
//! The rule picks the K just before the first WCSS reduction that falls
//! below half of the average reduction. It is a heuristic: noisy or
//! non-convex WCSS curves can push it towards a very low or very high K.

use crate::model::{evaluate_wcss, ClusteringEngine};
use std::collections::BTreeMap;
use tracing::info;

/// Upper bound of the K sweep
pub const DEFAULT_MAX_K: usize = 8;

/// K used when the curve has no usable elbow
pub const DEFAULT_K: usize = 3;

/// WCSS per K; `None` marks a failed evaluation
pub type WcssSweep = BTreeMap<usize, Option<f64>>;

/// Evaluate WCSS for every K in `1..=max_k`
pub fn sweep<E: ClusteringEngine + ?Sized>(
    engine: &E,
    features: &[Vec<f64>],
    max_k: usize,
) -> WcssSweep {
    (1..=max_k)
        .map(|k| {
            info!("Computing K = {}...", k);
            let wcss = evaluate_wcss(engine, k, features);
            match wcss {
                Some(value) => info!("K = {} -> WCSS = {}", k, value),
                None => info!("K = {} -> WCSS = ERROR", k),
            }
            (k, wcss)
        })
        .collect()
}

/// A WCSS value counts only when present and non-zero
fn usable(sweep: &WcssSweep, k: usize) -> Option<f64> {
    sweep.get(&k).copied().flatten().filter(|value| *value != 0.0)
}

/// Successive reductions `WCSS(K-1) - WCSS(K)`, keyed by K
pub fn reductions(sweep: &WcssSweep) -> BTreeMap<usize, f64> {
    sweep
        .keys()
        .filter(|&&k| k >= 2)
        .filter_map(|&k| {
            let previous = usable(sweep, k - 1)?;
            let current = usable(sweep, k)?;
            Some((k, previous - current))
        })
        .collect()
}

/// Choose the best K from a WCSS sweep
///
/// # Arguments
/// * `sweep` - WCSS per K as produced by [`sweep`]
/// * `default_k` - Returned when fewer than three values are usable or no elbow is found
pub fn select_best_k(sweep: &WcssSweep, default_k: usize) -> usize {
    let usable_count = sweep.keys().filter(|&&k| usable(sweep, k).is_some()).count();
    if usable_count < 3 {
        return default_k;
    }

    let reductions = reductions(sweep);
    if reductions.is_empty() {
        return default_k;
    }

    let average = reductions.values().sum::<f64>() / reductions.len() as f64;
    reductions
        .iter()
        .find(|&(_, &reduction)| reduction < average * 0.5)
        .map(|(&k, _)| k - 1)
        .unwrap_or(default_k)
}
