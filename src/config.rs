//! Pipeline configuration.
//!
//! All options have defaults, and deserialization fills in anything a partial
//! document leaves out:
//!
//! ```rust
//! use textclust::PipelineConfig;
//!
//! let config = PipelineConfig::default()
//!     .with_min_term_count(2)
//!     .with_embedding_rank(10);
//! assert_eq!(config.cooccurrence_window, 5);
//! assert!(config.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};

use crate::cluster::CovarianceSelection;
use crate::embedding::VectorSource;
use crate::error::{Error, Result};

/// Bootstrap resample budget per cluster engine.
///
/// GMM refits are far more expensive than K-Means, so its default budget is
/// much smaller. Fewer resamples give a noisier stability estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapBudget {
    /// Resamples for K-Means runs.
    pub kmeans: usize,
    /// Resamples for GMM runs.
    pub gmm: usize,
}

impl Default for BootstrapBudget {
    fn default() -> Self {
        Self { kmeans: 100, gmm: 5 }
    }
}

/// Options recognized by [`crate::Pipeline`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Minimum corpus frequency for a term to enter the vocabulary.
    pub min_term_count: usize,
    /// Context window (tokens to the right of each center token).
    pub cooccurrence_window: usize,
    /// Embedding dimension.
    pub embedding_rank: usize,
    /// Co-occurrence weight cap.
    pub embedding_x_max: f64,
    /// Training passes over the co-occurrence entries.
    pub embedding_iterations: usize,
    /// AdaGrad initial learning rate.
    pub embedding_learning_rate: f64,
    /// Relative cost change below which training stops early. `0.0` disables.
    pub embedding_convergence_tol: f64,
    /// Which token sequence document vectors are built from.
    pub vector_source: VectorSource,
    /// Cluster counts for K-Means.
    pub kmeans_k: Vec<usize>,
    /// K-Means random restarts.
    pub kmeans_restarts: usize,
    /// K-Means Lloyd iterations per restart.
    pub kmeans_max_iter: usize,
    /// Cluster counts for GMM.
    pub gmm_k: Vec<usize>,
    /// GMM covariance structure, or `Auto` for BIC selection.
    pub gmm_covariance: CovarianceSelection,
    /// GMM EM iterations.
    pub gmm_max_iter: usize,
    /// Bootstrap resamples per engine.
    pub bootstrap: BootstrapBudget,
    /// Clusters smaller than this fraction of `n / k` are periphery.
    pub periphery_fraction: f64,
    /// Terms reported per cluster.
    pub top_terms: usize,
    /// Root seed; every stage derives its own seed from it.
    pub seed: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_term_count: 5,
            cooccurrence_window: 5,
            embedding_rank: 50,
            embedding_x_max: 10.0,
            embedding_iterations: 20,
            embedding_learning_rate: 0.15,
            embedding_convergence_tol: 0.0,
            vector_source: VectorSource::Cleaned,
            kmeans_k: vec![5, 10],
            kmeans_restarts: 25,
            kmeans_max_iter: 30,
            gmm_k: vec![5, 10],
            gmm_covariance: CovarianceSelection::Auto,
            gmm_max_iter: 100,
            bootstrap: BootstrapBudget::default(),
            periphery_fraction: 0.25,
            top_terms: 10,
            seed: 42,
        }
    }
}

impl PipelineConfig {
    /// Set minimum term count.
    pub fn with_min_term_count(mut self, n: usize) -> Self {
        self.min_term_count = n;
        self
    }

    /// Set embedding dimension.
    pub fn with_embedding_rank(mut self, rank: usize) -> Self {
        self.embedding_rank = rank;
        self
    }

    /// Set K-Means cluster counts.
    pub fn with_kmeans_k(mut self, ks: impl Into<Vec<usize>>) -> Self {
        self.kmeans_k = ks.into();
        self
    }

    /// Set GMM cluster counts.
    pub fn with_gmm_k(mut self, ks: impl Into<Vec<usize>>) -> Self {
        self.gmm_k = ks.into();
        self
    }

    /// Set bootstrap budgets.
    pub fn with_bootstrap(mut self, kmeans: usize, gmm: usize) -> Self {
        self.bootstrap = BootstrapBudget { kmeans, gmm };
        self
    }

    /// Set the root seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if self.min_term_count == 0 {
            return Err(Error::InvalidParameter {
                name: "min_term_count",
                message: "must be > 0",
            });
        }
        if self.cooccurrence_window == 0 {
            return Err(Error::InvalidParameter {
                name: "cooccurrence_window",
                message: "must be > 0",
            });
        }
        if self.embedding_rank == 0 {
            return Err(Error::InvalidParameter {
                name: "embedding_rank",
                message: "must be > 0",
            });
        }
        if self.embedding_x_max.is_nan() || self.embedding_x_max <= 0.0 {
            return Err(Error::InvalidParameter {
                name: "embedding_x_max",
                message: "must be > 0",
            });
        }
        if self.embedding_iterations == 0 {
            return Err(Error::InvalidParameter {
                name: "embedding_iterations",
                message: "must be > 0",
            });
        }
        if self.kmeans_restarts == 0 {
            return Err(Error::InvalidParameter {
                name: "kmeans_restarts",
                message: "must be > 0",
            });
        }
        if !(0.0..1.0).contains(&self.periphery_fraction) {
            return Err(Error::InvalidParameter {
                name: "periphery_fraction",
                message: "must be in [0, 1)",
            });
        }
        Ok(())
    }
}
