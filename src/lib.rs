//! # textclust
//!
//! Document clustering from co-occurrence embeddings, with internal validity,
//! bootstrap stability, and label/term interpretation of every partition.
//!
//! Stages, each usable on its own:
//!
//! 1. [`text`]: vocabulary pruning and windowed co-occurrence counts over
//!    already-cleaned tokens.
//! 2. [`embedding`]: GloVe word vectors, averaged into document vectors.
//!    Documents with no known token are reported as missing, never zero-filled.
//! 3. [`cluster`]: K-Means and Gaussian mixtures at any `k`, with periphery
//!    flagging of tiny clusters.
//! 4. [`validity`] and [`stability`]: Davies–Bouldin, Silhouette, bootstrap
//!    Jaccard per cluster.
//! 5. [`interpret`]: external labels and frequent terms per cluster.
//!
//! [`Pipeline`] runs them end to end from a [`PipelineConfig`].
//!
//! Every stochastic step takes a seed; the same corpus, configuration and seed
//! give the same report with or without the `parallel` feature.

pub mod cluster;
pub mod config;
pub mod corpus;
pub mod embedding;
/// Error types used across `textclust`.
pub mod error;
pub mod interpret;
pub mod metrics;
pub mod pipeline;
pub mod seed;
pub mod stability;
pub mod text;
pub mod validity;

pub use config::{BootstrapBudget, PipelineConfig};
pub use corpus::{Corpus, Document};
pub use error::{Error, Result, Stage};
pub use pipeline::{ClusterRun, FitSummary, Pipeline, PipelineReport, RunOutcome};
pub use text::{BasicCleaner, TextCleaner};

pub use cluster::{ClusterAssignment, Clustering, Gmm, Kmeans, Method, SoftClustering, PERIPHERY};
pub use embedding::{DocumentVector, EmbeddingTable, Glove, VectorSource};
pub use metrics::{ari, nmi, purity};
pub use stability::{bootstrap_stability, StabilityReport};
pub use validity::{davies_bouldin, silhouette};
