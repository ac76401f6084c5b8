//! Cluster assignments and the periphery rule.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Label carried by documents relabeled out of degenerate clusters.
pub const PERIPHERY: usize = usize::MAX;

/// Which engine produced an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// Lloyd's K-means.
    Kmeans,
    /// Gaussian mixture via EM.
    Gmm,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Kmeans => f.write_str("kmeans"),
            Method::Gmm => f.write_str("gmm"),
        }
    }
}

/// Flags clusters smaller than `fraction · n / k`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeripheryRule {
    /// Fraction of the equal-share cluster size.
    pub fraction: f64,
}

impl Default for PeripheryRule {
    fn default() -> Self {
        Self { fraction: 0.25 }
    }
}

impl PeripheryRule {
    /// Rule with the given fraction.
    pub fn new(fraction: f64) -> Self {
        Self { fraction }
    }

    /// Size threshold for `n` documents in `k` clusters.
    pub fn threshold(&self, n: usize, k: usize) -> f64 {
        if k == 0 {
            return 0.0;
        }
        self.fraction * n as f64 / k as f64
    }
}

/// A cluster that fell below the periphery threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegenerateCluster {
    /// Cluster label.
    pub cluster: usize,
    /// Documents in the cluster.
    pub size: usize,
    /// Threshold it fell below.
    pub threshold: f64,
}

/// Labels for `labels` after moving every cluster below the threshold to [`PERIPHERY`].
///
/// `k` is the number of clusters the labels were drawn from.
pub fn relabel_periphery(labels: &[usize], k: usize, rule: &PeripheryRule) -> Vec<usize> {
    let degenerate = degenerate(labels, k, rule);
    labels
        .iter()
        .map(|&l| {
            if degenerate.iter().any(|d| d.cluster == l) {
                PERIPHERY
            } else {
                l
            }
        })
        .collect()
}

fn sizes_of(labels: &[usize], k: usize) -> Vec<usize> {
    let mut sizes = vec![0; k];
    for &l in labels {
        if l < k {
            sizes[l] += 1;
        }
    }
    sizes
}

fn degenerate(labels: &[usize], k: usize, rule: &PeripheryRule) -> Vec<DegenerateCluster> {
    let threshold = rule.threshold(labels.len(), k);
    sizes_of(labels, k)
        .into_iter()
        .enumerate()
        .filter(|&(_, size)| (size as f64) < threshold)
        .map(|(cluster, size)| DegenerateCluster {
            cluster,
            size,
            threshold,
        })
        .collect()
}

/// Document-to-cluster labels from one (method, k) run.
///
/// Never mutated after construction; [`ClusterAssignment::with_periphery`]
/// returns a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    method: Method,
    k: usize,
    doc_ids: Vec<usize>,
    labels: Vec<usize>,
}

impl ClusterAssignment {
    /// Assignment of `labels[i]` to document `doc_ids[i]`.
    ///
    /// Labels must be in `0..k` or [`PERIPHERY`].
    pub fn new(method: Method, k: usize, doc_ids: Vec<usize>, labels: Vec<usize>) -> Result<Self> {
        if doc_ids.len() != labels.len() {
            return Err(Error::DimensionMismatch {
                expected: doc_ids.len(),
                found: labels.len(),
            });
        }
        if labels.iter().any(|&l| l >= k && l != PERIPHERY) {
            return Err(Error::InvalidParameter {
                name: "labels",
                message: "label outside 0..k",
            });
        }
        Ok(Self {
            method,
            k,
            doc_ids,
            labels,
        })
    }

    /// Engine that produced this assignment.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Requested cluster count.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Document ids, parallel to [`labels`](Self::labels).
    pub fn doc_ids(&self) -> &[usize] {
        &self.doc_ids
    }

    /// Labels, parallel to [`doc_ids`](Self::doc_ids).
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Number of assigned documents.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether no documents are assigned.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Label of a document.
    pub fn label_of(&self, doc_id: usize) -> Option<usize> {
        self.doc_ids
            .iter()
            .position(|&d| d == doc_id)
            .map(|pos| self.labels[pos])
    }

    /// Documents per cluster `0..k`; periphery documents are not counted.
    pub fn sizes(&self) -> Vec<usize> {
        sizes_of(&self.labels, self.k)
    }

    /// Documents carrying the [`PERIPHERY`] label.
    pub fn periphery_count(&self) -> usize {
        self.labels.iter().filter(|&&l| l == PERIPHERY).count()
    }

    /// Document ids grouped by label, labels ascending ([`PERIPHERY`] last).
    pub fn members(&self) -> BTreeMap<usize, Vec<usize>> {
        let mut out: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (&doc, &label) in self.doc_ids.iter().zip(&self.labels) {
            out.entry(label).or_default().push(doc);
        }
        out
    }

    /// Clusters below the periphery threshold, empty clusters included.
    pub fn degenerate_clusters(&self, rule: &PeripheryRule) -> Vec<DegenerateCluster> {
        degenerate(&self.labels, self.k, rule)
    }

    /// New assignment with degenerate clusters moved to [`PERIPHERY`].
    pub fn with_periphery(&self, rule: &PeripheryRule) -> ClusterAssignment {
        ClusterAssignment {
            method: self.method,
            k: self.k,
            doc_ids: self.doc_ids.clone(),
            labels: relabel_periphery(&self.labels, self.k, rule),
        }
    }

    /// Label such as `"gmm k=10"` for logs and errors.
    pub fn config_label(&self) -> String {
        format!("{} k={}", self.method, self.k)
    }
}
