//! Bootstrap cluster stability.
//!
//! Resample the documents with replacement, refit the same clusterer on each
//! resample, and score every original cluster by its best Jaccard match among
//! the resampled clusters. A cluster that keeps its members across resamples
//! scores near 1; one that dissolves into others scores low.
//!
//! Comparisons use the *distinct* original documents drawn into a resample.
//! A document drawn more than once takes the label of its first draw. An
//! original cluster none of whose members were drawn scores 0 for that
//! resample.
//!
//! Resamples are independent and seeded from the root seed and their index,
//! so results are identical with or without the `parallel` feature.

use std::collections::BTreeMap;

use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cluster::{distinct_count, Reseed};
use crate::error::{Error, Result};
use crate::metrics::jaccard;
use crate::seed::derive_seed;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Jaccard below this counts the cluster as dissolved in that resample.
pub const DISSOLVED_BELOW: f64 = 0.5;

/// Jaccard at or above this counts the cluster as recovered in that resample.
pub const RECOVERED_FROM: f64 = 0.75;

/// Stability of one original cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterStability {
    /// Cluster label in the original assignment.
    pub cluster: usize,
    /// Documents in the original cluster.
    pub size: usize,
    /// Mean best-match Jaccard over completed resamples.
    pub mean_jaccard: f64,
    /// Resamples with Jaccard below [`DISSOLVED_BELOW`].
    pub dissolved: usize,
    /// Resamples with Jaccard at or above [`RECOVERED_FROM`].
    pub recovered: usize,
}

/// Per-cluster stability of one assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityReport {
    /// Resamples requested.
    pub n_resamples: usize,
    /// Resamples whose refit succeeded and were scored.
    pub n_completed: usize,
    /// One entry per non-empty original cluster, ascending by label.
    pub per_cluster: Vec<ClusterStability>,
}

impl StabilityReport {
    /// Mean of the per-cluster scores.
    pub fn mean(&self) -> f64 {
        if self.per_cluster.is_empty() {
            return 0.0;
        }
        self.per_cluster.iter().map(|c| c.mean_jaccard).sum::<f64>() / self.per_cluster.len() as f64
    }

    /// Least stable cluster.
    pub fn min(&self) -> Option<&ClusterStability> {
        self.per_cluster
            .iter()
            .min_by(|a, b| a.mean_jaccard.total_cmp(&b.mean_jaccard))
    }

    /// Per-cluster scores in label order.
    pub fn scores(&self) -> Vec<f64> {
        self.per_cluster.iter().map(|c| c.mean_jaccard).collect()
    }
}

/// Fit `method` on `data`, then measure the stability of that fit.
pub fn bootstrap_stability<C>(
    data: &[Vec<f32>],
    method: &C,
    n_resamples: usize,
    seed: u64,
) -> Result<StabilityReport>
where
    C: Reseed + Sync,
{
    let labels = method.reseed(derive_seed(seed, u64::MAX)).fit_predict(data)?;
    bootstrap_stability_of(data, &labels, method, n_resamples, seed)
}

/// Stability of an existing assignment `labels` under refits of `method`.
///
/// Resamples whose refit fails (too few distinct vectors drawn, numerical
/// breakdown) are skipped; an error is returned only if none complete.
pub fn bootstrap_stability_of<C>(
    data: &[Vec<f32>],
    labels: &[usize],
    method: &C,
    n_resamples: usize,
    seed: u64,
) -> Result<StabilityReport>
where
    C: Reseed + Sync,
{
    if data.is_empty() {
        return Err(Error::EmptyInput);
    }
    if data.len() != labels.len() {
        return Err(Error::DimensionMismatch {
            expected: data.len(),
            found: labels.len(),
        });
    }
    if n_resamples == 0 {
        return Err(Error::InvalidParameter {
            name: "n_resamples",
            message: "must be at least 1",
        });
    }

    let original = groups(labels.iter().copied().enumerate());

    let run = |b: usize| resample_scores(data, &original, method, derive_seed(seed, b as u64));

    #[cfg(feature = "parallel")]
    let outcomes: Vec<Option<Vec<f64>>> = (0..n_resamples).into_par_iter().map(run).collect();

    #[cfg(not(feature = "parallel"))]
    let outcomes: Vec<Option<Vec<f64>>> = (0..n_resamples).map(run).collect();

    let completed: Vec<Vec<f64>> = outcomes.into_iter().flatten().collect();
    if completed.is_empty() {
        return Err(Error::Other(format!(
            "all {n_resamples} bootstrap refits failed"
        )));
    }

    let per_cluster = original
        .iter()
        .enumerate()
        .map(|(pos, (&cluster, members))| {
            let scores = completed.iter().map(|s| s[pos]);
            ClusterStability {
                cluster,
                size: members.len(),
                mean_jaccard: scores.clone().sum::<f64>() / completed.len() as f64,
                dissolved: scores.clone().filter(|&j| j < DISSOLVED_BELOW).count(),
                recovered: scores.filter(|&j| j >= RECOVERED_FROM).count(),
            }
        })
        .collect();

    tracing::debug!(
        requested = n_resamples,
        completed = completed.len(),
        "bootstrap stability"
    );

    Ok(StabilityReport {
        n_resamples,
        n_completed: completed.len(),
        per_cluster,
    })
}

fn groups(pairs: impl Iterator<Item = (usize, usize)>) -> BTreeMap<usize, Vec<usize>> {
    let mut out: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (doc, label) in pairs {
        out.entry(label).or_default().push(doc);
    }
    out
}

/// Best-match Jaccard per original cluster for one resample, or `None` if the
/// refit failed.
fn resample_scores<C: Reseed>(
    data: &[Vec<f32>],
    original: &BTreeMap<usize, Vec<usize>>,
    method: &C,
    seed: u64,
) -> Option<Vec<f64>> {
    let n = data.len();
    let mut rng = StdRng::seed_from_u64(seed);
    let draws: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();
    let sample: Vec<Vec<f32>> = draws.iter().map(|&i| data[i].clone()).collect();

    if distinct_count(&sample) < method.n_clusters() {
        tracing::debug!(seed, "resample has too few distinct vectors");
        return None;
    }

    let fitted = match method.reseed(seed).fit_predict(&sample) {
        Ok(l) => l,
        Err(e) => {
            tracing::debug!(seed, error = %e, "bootstrap refit failed");
            return None;
        }
    };

    // First draw of each original document decides its resampled label.
    let mut seen = vec![None; n];
    for (&doc, &label) in draws.iter().zip(&fitted) {
        if seen[doc].is_none() {
            seen[doc] = Some(label);
        }
    }
    let resampled = groups(
        seen.iter()
            .enumerate()
            .filter_map(|(doc, l)| l.map(|l| (doc, l))),
    );

    let scores = original
        .values()
        .map(|members| {
            let present: Vec<usize> =
                members.iter().copied().filter(|&d| seen[d].is_some()).collect();
            if present.is_empty() {
                return 0.0;
            }
            resampled
                .values()
                .map(|other| jaccard(&present, other))
                .fold(0.0, f64::max)
        })
        .collect();
    Some(scores)
}
