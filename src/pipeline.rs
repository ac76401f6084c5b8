//! End-to-end run: vocabulary, co-occurrence, embeddings, document vectors,
//! then every configured (method, k) clustering with its evaluation.
//!
//! Shared artifacts are built once and only read afterwards. A failure before
//! clustering aborts the run; an engine failure inside one (method, k)
//! configuration is recorded in that configuration's [`RunOutcome`] and the
//! others proceed. Validity and stability failures leave the assignment in
//! place: the affected score is `None` and the cause goes to
//! [`ClusterRun::evaluation_errors`].
//!
//! ```rust,no_run
//! use textclust::{BasicCleaner, Corpus, Pipeline, PipelineConfig};
//!
//! let corpus = Corpus::from_labeled_texts(
//!     [("a gripping thriller", 1u8), ("dull and slow", 0u8)],
//!     &BasicCleaner::new(),
//! );
//! let report = Pipeline::new(PipelineConfig::default()).run(&corpus)?;
//! for run in &report.runs {
//!     match &run.result {
//!         Ok(r) => println!("{} k={}: silhouette {:?}", run.method, run.k, r.silhouette),
//!         Err(e) => println!("{e}"),
//!     }
//! }
//! # Ok::<(), textclust::Error>(())
//! ```

use serde::{Deserialize, Serialize};

use crate::cluster::{
    ClusterAssignment, CovarianceSelection, CovarianceType, DegenerateCluster, Gmm, Kmeans, Method,
    PeripheryRule,
};
use crate::config::PipelineConfig;
use crate::corpus::Corpus;
use crate::embedding::{vectorize_corpus, DocumentVectors, Glove, GloveFit};
use crate::error::{Error, Result, Stage};
use crate::interpret::{crosstab, top_terms, ClusterTerms, CrossTab};
use crate::seed::derive_seed;
use crate::stability::{bootstrap_stability_of, StabilityReport};
use crate::text::{build_cooccurrence, Vocabulary};
use crate::validity::{davies_bouldin, davies_bouldin_with_periphery, silhouette};

const STREAM_EMBEDDING: u64 = 0;
const STREAM_KMEANS: u64 = 1;
const STREAM_GMM: u64 = 2;

/// Engine-specific fit diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum FitSummary {
    /// Best K-Means restart.
    Kmeans {
        /// Within-cluster sum of squares.
        inertia: f64,
        /// Lloyd iterations of the kept restart.
        n_iter: usize,
        /// Whether assignments stabilized before `max_iter`.
        converged: bool,
    },
    /// Selected Gaussian mixture.
    Gmm {
        /// Covariance structure chosen (or fixed).
        covariance: CovarianceType,
        /// Bayesian information criterion; lower is better.
        bic: f64,
        /// Total log-likelihood.
        log_likelihood: f64,
        /// EM iterations.
        n_iter: usize,
        /// Whether EM met its tolerance before `max_iter`.
        converged: bool,
    },
}

impl FitSummary {
    /// Whether the engine converged.
    pub fn converged(&self) -> bool {
        match self {
            FitSummary::Kmeans { converged, .. } | FitSummary::Gmm { converged, .. } => *converged,
        }
    }
}

/// Assignment and evaluation of one (method, k) configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterRun {
    /// Engine output.
    pub assignment: ClusterAssignment,
    /// Same assignment with degenerate clusters moved to the periphery label.
    pub periphery: ClusterAssignment,
    /// Clusters below the periphery threshold.
    pub degenerate: Vec<DegenerateCluster>,
    /// Engine diagnostics.
    pub fit: FitSummary,
    /// Davies–Bouldin index of the raw assignment; `None` when it could not be
    /// computed (fewer than two non-empty clusters).
    pub davies_bouldin: Option<f64>,
    /// Davies–Bouldin after the periphery pre-pass; `None` when nothing was
    /// degenerate or fewer than two groups remain.
    pub davies_bouldin_periphery: Option<f64>,
    /// Mean silhouette of the raw assignment; `None` when it could not be
    /// computed.
    pub silhouette: Option<f64>,
    /// Per-cluster bootstrap stability; `None` when the budget is 0 or every
    /// resample failed to refit.
    pub stability: Option<StabilityReport>,
    /// Evaluation steps that failed without invalidating the assignment,
    /// rendered as `[stage] method k=K: cause`.
    pub evaluation_errors: Vec<String>,
    /// External labels per cluster (periphery applied).
    pub crosstab: CrossTab,
    /// Frequent terms per cluster (periphery applied).
    pub top_terms: Vec<ClusterTerms>,
}

/// Result of one (method, k) configuration.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Engine.
    pub method: Method,
    /// Requested cluster count.
    pub k: usize,
    /// The run, or the error that stopped it.
    pub result: Result<ClusterRun>,
}

/// Everything a pipeline run produced.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Pruned vocabulary.
    pub vocabulary: Vocabulary,
    /// Stored co-occurrence cells.
    pub cooccurrence_nnz: usize,
    /// Trained embeddings with their cost history.
    pub embedding: GloveFit,
    /// Document vectors fed to the engines, and the missing ids left out.
    pub vectors: DocumentVectors,
    /// One outcome per configured (method, k), K-Means first.
    pub runs: Vec<RunOutcome>,
}

impl PipelineReport {
    /// Successful run for `(method, k)`.
    pub fn run(&self, method: Method, k: usize) -> Option<&ClusterRun> {
        self.runs
            .iter()
            .find(|r| r.method == method && r.k == k)
            .and_then(|r| r.result.as_ref().ok())
    }

    /// Configurations that failed, with their errors.
    pub fn failures(&self) -> impl Iterator<Item = &RunOutcome> {
        self.runs.iter().filter(|r| r.result.is_err())
    }
}

/// Configured pipeline.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Pipeline with `config`.
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// The configuration in use.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage over `corpus`.
    pub fn run(&self, corpus: &Corpus) -> Result<PipelineReport> {
        let cfg = &self.config;
        cfg.validate().map_err(|e| e.at(Stage::Config))?;
        if corpus.is_empty() {
            return Err(Error::EmptyInput.at(Stage::Vocabulary));
        }

        let vocabulary = Vocabulary::from_token_sequences(
            corpus.documents().iter().map(|d| &d.tokens),
            cfg.min_term_count,
        )
        .map_err(|e| e.at(Stage::Vocabulary))?;
        tracing::info!(
            documents = corpus.len(),
            terms = vocabulary.len(),
            min_count = cfg.min_term_count,
            "vocabulary built"
        );

        let cooccurrence =
            build_cooccurrence(&corpus.token_sequences(), &vocabulary, cfg.cooccurrence_window)
                .map_err(|e| e.at(Stage::Cooccurrence))?;
        tracing::info!(
            nnz = cooccurrence.nnz(),
            window = cfg.cooccurrence_window,
            "co-occurrence counted"
        );

        let embedding = Glove::new(cfg.embedding_rank)
            .with_x_max(cfg.embedding_x_max)
            .with_n_iter(cfg.embedding_iterations)
            .with_learning_rate(cfg.embedding_learning_rate)
            .with_convergence_tol(cfg.embedding_convergence_tol)
            .with_seed(derive_seed(cfg.seed, STREAM_EMBEDDING))
            .fit(&cooccurrence, &vocabulary)
            .map_err(|e| e.at(Stage::Embedding))?;
        tracing::info!(
            rank = cfg.embedding_rank,
            n_iter = embedding.n_iter,
            final_cost = embedding.cost_history.last().copied().unwrap_or(f64::NAN),
            "embeddings trained"
        );

        let vectors = vectorize_corpus(corpus, &embedding.embeddings, cfg.vector_source);
        if vectors.is_empty() {
            return Err(Error::EmptyInput.at(Stage::Vectorize));
        }
        tracing::info!(
            present = vectors.len(),
            missing = vectors.missing.len(),
            "documents vectorized"
        );

        let mut runs = Vec::with_capacity(cfg.kmeans_k.len() + cfg.gmm_k.len());
        for &k in &cfg.kmeans_k {
            runs.push(self.outcome(Method::Kmeans, k, &vectors, corpus));
        }
        for &k in &cfg.gmm_k {
            runs.push(self.outcome(Method::Gmm, k, &vectors, corpus));
        }

        Ok(PipelineReport {
            vocabulary,
            cooccurrence_nnz: cooccurrence.nnz(),
            embedding,
            vectors,
            runs,
        })
    }

    fn outcome(
        &self,
        method: Method,
        k: usize,
        vectors: &DocumentVectors,
        corpus: &Corpus,
    ) -> RunOutcome {
        let result = self.cluster_run(method, k, vectors, corpus);
        match &result {
            Ok(run) => tracing::info!(
                %method,
                k,
                silhouette = run.silhouette,
                davies_bouldin = run.davies_bouldin,
                degenerate = run.degenerate.len(),
                stability = run.stability.as_ref().map(StabilityReport::mean),
                evaluation_errors = run.evaluation_errors.len(),
                "configuration evaluated"
            ),
            Err(e) => tracing::warn!(%method, k, error = %e, "configuration failed"),
        }
        RunOutcome { method, k, result }
    }

    fn cluster_run(
        &self,
        method: Method,
        k: usize,
        vectors: &DocumentVectors,
        corpus: &Corpus,
    ) -> Result<ClusterRun> {
        let cfg = &self.config;
        let label = format!("{method} k={k}");
        let data = &vectors.rows;

        let stream = match method {
            Method::Kmeans => STREAM_KMEANS,
            Method::Gmm => STREAM_GMM,
        };
        let fit_seed = derive_seed(derive_seed(cfg.seed, stream), k as u64);
        let boot_seed = derive_seed(fit_seed, 1);
        let mut evaluation_errors = Vec::new();

        let (labels, fit, stability) = match method {
            Method::Kmeans => {
                let engine = Kmeans::new(k)
                    .with_restarts(cfg.kmeans_restarts)
                    .with_max_iter(cfg.kmeans_max_iter)
                    .with_seed(fit_seed);
                let fit = engine
                    .fit(data)
                    .map_err(|e| e.at_config(Stage::Cluster, &label))?;
                let stability = match cfg.bootstrap.kmeans {
                    0 => None,
                    b => kept(
                        bootstrap_stability_of(data, &fit.labels, &engine, b, boot_seed),
                        Stage::Stability,
                        &label,
                        &mut evaluation_errors,
                    ),
                };
                let summary = FitSummary::Kmeans {
                    inertia: fit.inertia,
                    n_iter: fit.n_iter,
                    converged: fit.converged,
                };
                (fit.labels, summary, stability)
            }
            Method::Gmm => {
                let engine = Gmm::new()
                    .with_n_components(k)
                    .with_max_iter(cfg.gmm_max_iter)
                    .with_covariance(cfg.gmm_covariance)
                    .with_seed(fit_seed);
                let fit = engine
                    .fit(data)
                    .map_err(|e| e.at_config(Stage::Cluster, &label))?;
                // Refits keep the selected structure instead of re-running selection.
                let refit = engine.with_covariance(CovarianceSelection::Fixed(fit.covariance_type));
                let stability = match cfg.bootstrap.gmm {
                    0 => None,
                    b => kept(
                        bootstrap_stability_of(data, &fit.labels, &refit, b, boot_seed),
                        Stage::Stability,
                        &label,
                        &mut evaluation_errors,
                    ),
                };
                let summary = FitSummary::Gmm {
                    covariance: fit.covariance_type,
                    bic: fit.bic,
                    log_likelihood: fit.log_likelihood,
                    n_iter: fit.n_iter,
                    converged: fit.converged,
                };
                (fit.labels, summary, stability)
            }
        };

        if !fit.converged() {
            tracing::warn!(%method, k, "engine stopped at max_iter without converging");
        }

        let assignment = ClusterAssignment::new(method, k, vectors.ids.clone(), labels)
            .map_err(|e| e.at_config(Stage::Cluster, &label))?;

        let rule = PeripheryRule::new(cfg.periphery_fraction);
        let degenerate = assignment.degenerate_clusters(&rule);
        let periphery = assignment.with_periphery(&rule);
        for d in &degenerate {
            tracing::warn!(
                %method,
                k,
                cluster = d.cluster,
                size = d.size,
                threshold = d.threshold,
                "degenerate cluster moved to periphery"
            );
        }

        let davies_bouldin = kept(
            davies_bouldin(data, assignment.labels()),
            Stage::Validity,
            &label,
            &mut evaluation_errors,
        );
        let silhouette = kept(
            silhouette(data, assignment.labels()),
            Stage::Validity,
            &label,
            &mut evaluation_errors,
        );
        let davies_bouldin_periphery = if degenerate.is_empty() {
            None
        } else {
            davies_bouldin_with_periphery(data, assignment.labels(), k, &rule).ok()
        };

        Ok(ClusterRun {
            crosstab: crosstab(&periphery, corpus),
            top_terms: top_terms(&periphery, corpus, cfg.top_terms),
            assignment,
            periphery,
            degenerate,
            fit,
            davies_bouldin,
            davies_bouldin_periphery,
            silhouette,
            stability,
            evaluation_errors,
        })
    }
}

/// `Some` on success; otherwise log the tagged error, record it and yield `None`.
fn kept<T>(result: Result<T>, stage: Stage, label: &str, errors: &mut Vec<String>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            let e = e.at_config(stage, label);
            tracing::warn!(error = %e, "evaluation step failed; assignment kept");
            errors.push(e.to_string());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Document;

    fn tiny_corpus() -> Corpus {
        let topics = [
            ["apple", "banana", "cherry", "grape"],
            ["engine", "piston", "gear", "clutch"],
        ];
        let mut docs = Vec::new();
        for i in 0..20 {
            let words = topics[i % 2];
            let tokens: Vec<String> = (0..5).map(|j| words[(i / 2 + j) % 4].to_string()).collect();
            docs.push(Document::new(i, tokens.join(" "), tokens).with_label((i % 2) as u8));
        }
        Corpus::new(docs)
    }

    fn small_config() -> PipelineConfig {
        PipelineConfig::default()
            .with_min_term_count(1)
            .with_embedding_rank(4)
            .with_kmeans_k(vec![2])
            .with_gmm_k(vec![2])
            .with_bootstrap(3, 2)
            .with_seed(5)
    }

    #[test]
    fn empty_corpus_is_fatal() {
        let err = Pipeline::new(small_config()).run(&Corpus::default()).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn empty_vocabulary_is_fatal_and_tagged() {
        let cfg = small_config().with_min_term_count(1000);
        let err = Pipeline::new(cfg).run(&tiny_corpus()).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, Error::Stage { stage: Stage::Vocabulary, .. }));
    }

    #[test]
    fn oversized_k_fails_only_its_configuration() {
        let cfg = small_config().with_kmeans_k(vec![2, 500]).with_gmm_k(Vec::new());
        let report = Pipeline::new(cfg).run(&tiny_corpus()).unwrap();
        assert_eq!(report.runs.len(), 2);
        assert!(report.run(Method::Kmeans, 2).is_some());

        let failed: Vec<&RunOutcome> = report.failures().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].k, 500);
        let err = failed[0].result.as_ref().unwrap_err();
        assert!(matches!(err.root(), Error::InsufficientData { requested: 500, .. }));
        assert!(err.to_string().contains("kmeans k=500"));
    }

    #[test]
    fn report_is_reproducible() {
        let corpus = tiny_corpus();
        let a = Pipeline::new(small_config()).run(&corpus).unwrap();
        let b = Pipeline::new(small_config()).run(&corpus).unwrap();
        assert_eq!(a.embedding.cost_history, b.embedding.cost_history);
        for (x, y) in a.runs.iter().zip(&b.runs) {
            assert_eq!(x.result.as_ref().ok(), y.result.as_ref().ok());
        }
    }

    #[test]
    fn runs_cover_every_present_document() {
        let corpus = tiny_corpus();
        let report = Pipeline::new(small_config()).run(&corpus).unwrap();
        let run = report.run(Method::Kmeans, 2).unwrap();
        assert_eq!(run.assignment.len(), corpus.len() - report.vectors.missing.len());
        assert_eq!(run.stability.as_ref().map(|s| s.n_resamples), Some(3));
        assert!(run.fit.converged());
        assert!(run.silhouette.is_some());
        assert!(run.evaluation_errors.is_empty());
    }

    #[test]
    fn invalid_config_is_fatal_and_tagged() {
        let cfg = small_config().with_embedding_rank(0);
        let err = Pipeline::new(cfg).run(&tiny_corpus()).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, Error::Stage { stage: Stage::Config, .. }));
        assert!(matches!(err.root(), Error::InvalidParameter { name: "embedding_rank", .. }));
        assert!(err.to_string().starts_with("[config]"));
    }

    #[test]
    fn single_cluster_keeps_assignment_without_validity_scores() {
        let cfg = small_config().with_kmeans_k(vec![1]).with_gmm_k(Vec::new());
        let corpus = tiny_corpus();
        let report = Pipeline::new(cfg).run(&corpus).unwrap();
        let run = report.run(Method::Kmeans, 1).unwrap();
        assert_eq!(run.assignment.len(), corpus.len());
        assert_eq!(run.davies_bouldin, None);
        assert_eq!(run.silhouette, None);
        assert_eq!(run.evaluation_errors.len(), 2);
        assert!(run.evaluation_errors[0].starts_with("[validity] kmeans k=1"));
    }

    #[test]
    fn failed_stability_keeps_assignment() {
        // Three documents, three distinct vectors, k = 3: a resample refits only
        // when it draws all three, so most seeds lose every resample.
        let docs = ["alpha alpha", "beta beta", "gamma gamma"]
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let tokens: Vec<String> = t.split(' ').map(str::to_string).collect();
                Document::new(i, t.to_string(), tokens)
            })
            .collect();
        let corpus = Corpus::new(docs);

        let mut lost = 0;
        for seed in 0..16 {
            let cfg = PipelineConfig::default()
                .with_min_term_count(1)
                .with_embedding_rank(2)
                .with_kmeans_k(vec![3])
                .with_gmm_k(Vec::new())
                .with_bootstrap(1, 0)
                .with_seed(seed);
            let report = Pipeline::new(cfg).run(&corpus).unwrap();
            assert_eq!(report.failures().count(), 0);
            let run = report.run(Method::Kmeans, 3).unwrap();
            assert_eq!(run.assignment.len(), 3);
            if run.stability.is_none() {
                lost += 1;
                assert!(run
                    .evaluation_errors
                    .iter()
                    .any(|e| e.starts_with("[stability] kmeans k=3")));
            }
        }
        assert!(lost > 0);
    }
}
