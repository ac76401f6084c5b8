//! Cluster engines over document vectors.
//!
//! ## Hard vs Soft Clustering
//!
//! **Hard clustering** ([`Kmeans`]) assigns each document to exactly one
//! cluster and, by construction, favours roughly balanced spherical clusters.
//!
//! **Soft clustering** ([`Gmm`]) gives each document a probability for every
//! component; the hard label is the most probable one. Component sizes and
//! shapes are free, so a GMM partition can be heavily skewed, with a few large
//! clusters and several nearly empty ones.
//!
//! Both engines refuse a `k` larger than the number of distinct input vectors
//! ([`Error::InsufficientData`]).
//!
//! ## Periphery
//!
//! Tiny clusters are valid output but low-confidence. [`PeripheryRule`] flags
//! every cluster smaller than a fraction of the equal-share size `n / k`, and
//! [`ClusterAssignment::with_periphery`] derives a new assignment in which
//! those documents carry the [`PERIPHERY`] label.
//!
//! ## Usage
//!
//! ```rust
//! use textclust::cluster::{Clustering, Gmm, Kmeans, SoftClustering};
//!
//! let data = vec![
//!     vec![0.0, 0.0],
//!     vec![0.1, 0.1],
//!     vec![10.0, 10.0],
//!     vec![10.1, 10.1],
//! ];
//!
//! let labels = Kmeans::new(2).with_seed(1).fit_predict(&data).unwrap();
//! assert_eq!(labels[0], labels[1]);
//! assert_ne!(labels[0], labels[2]);
//!
//! let probs = Gmm::new()
//!     .with_n_components(2)
//!     .with_seed(1)
//!     .fit_predict_proba(&data)
//!     .unwrap();
//! assert_eq!(probs[0].len(), 2);
//! ```

mod assignment;
mod gmm;
mod kmeans;
mod traits;

pub use assignment::{
    relabel_periphery, ClusterAssignment, DegenerateCluster, Method, PeripheryRule, PERIPHERY,
};
pub use gmm::{CovarianceSelection, CovarianceType, Gmm, GmmFit};
pub use kmeans::{Kmeans, KmeansFit};
pub use traits::{Clustering, Reseed, SoftClustering};

use std::collections::HashSet;

use ndarray::Array2;

use crate::embedding::DocumentVectors;
use crate::error::{Error, Result};

/// K-Means assignment of `vectors` with `n_init` restarts of at most `max_iter` iterations.
pub fn kmeans(
    vectors: &DocumentVectors,
    k: usize,
    n_init: usize,
    max_iter: usize,
    seed: u64,
) -> Result<ClusterAssignment> {
    let fit = Kmeans::new(k)
        .with_restarts(n_init)
        .with_max_iter(max_iter)
        .with_seed(seed)
        .fit(&vectors.rows)?;
    ClusterAssignment::new(Method::Kmeans, k, vectors.ids.clone(), fit.labels)
}

/// Gaussian mixture assignment of `vectors`, covariance structure chosen by BIC.
pub fn gmm(vectors: &DocumentVectors, k: usize, seed: u64) -> Result<ClusterAssignment> {
    let fit = Gmm::new().with_n_components(k).with_seed(seed).fit(&vectors.rows)?;
    ClusterAssignment::new(Method::Gmm, k, vectors.ids.clone(), fit.labels)
}

/// Number of distinct vectors (bitwise comparison).
pub fn distinct_count(data: &[Vec<f32>]) -> usize {
    data.iter()
        .map(|v| v.iter().map(|x| x.to_bits()).collect::<Vec<u32>>())
        .collect::<HashSet<_>>()
        .len()
}

/// Validate `k` against the input before fitting.
pub(crate) fn check_k(data: &[Vec<f32>], k: usize) -> Result<()> {
    if data.is_empty() {
        return Err(Error::EmptyInput);
    }
    if k == 0 {
        return Err(Error::InvalidParameter {
            name: "k",
            message: "must be > 0",
        });
    }
    let distinct = distinct_count(data);
    if k > distinct {
        return Err(Error::InsufficientData {
            requested: k,
            distinct,
        });
    }
    Ok(())
}

/// Row-major copy of `data`, rejecting ragged rows.
pub(crate) fn to_matrix(data: &[Vec<f32>]) -> Result<Array2<f32>> {
    let n = data.len();
    let d = data.first().map_or(0, Vec::len);
    let mut flat: Vec<f32> = Vec::with_capacity(n * d);
    for point in data {
        if point.len() != d {
            return Err(Error::DimensionMismatch {
                expected: d,
                found: point.len(),
            });
        }
        flat.extend(point);
    }
    Array2::from_shape_vec((n, d), flat).map_err(|e| Error::Other(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ragged_rows_are_rejected() {
        let data = vec![vec![0.0, 1.0], vec![2.0]];
        assert_eq!(
            to_matrix(&data).unwrap_err(),
            Error::DimensionMismatch {
                expected: 2,
                found: 1
            }
        );
    }

    fn vectors() -> DocumentVectors {
        DocumentVectors {
            ids: vec![10, 11, 12, 13, 14, 15],
            rows: vec![
                vec![0.0, 0.0],
                vec![0.2, 0.1],
                vec![0.1, 0.3],
                vec![8.0, 8.0],
                vec![8.3, 7.9],
                vec![7.8, 8.2],
            ],
            missing: vec![3],
        }
    }

    #[test]
    fn engines_label_document_ids() {
        let v = vectors();
        for a in [kmeans(&v, 2, 5, 30, 1).unwrap(), gmm(&v, 2, 1).unwrap()] {
            assert_eq!(a.doc_ids(), &[10, 11, 12, 13, 14, 15]);
            assert_eq!(a.label_of(10), a.label_of(12));
            assert_ne!(a.label_of(10), a.label_of(14));
            assert_eq!(a.label_of(3), None);
        }
    }

    #[test]
    fn distinct_count_ignores_duplicates() {
        let data = vec![vec![1.0], vec![1.0], vec![2.0]];
        assert_eq!(distinct_count(&data), 2);
        assert!(check_k(&data, 2).is_ok());
        assert!(check_k(&data, 0).is_err());
    }
}
