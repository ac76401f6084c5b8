//! GloVe word embeddings from a co-occurrence matrix.
//!
//! Learns word vectors `wᵢ`, context vectors `w̃ⱼ` and biases `bᵢ`, `b̃ⱼ`
//! minimizing
//!
//! ```text
//! J = Σ_{Xᵢⱼ > 0} f(Xᵢⱼ) (wᵢ·w̃ⱼ + bᵢ + b̃ⱼ - log Xᵢⱼ)²
//! f(x) = min(1, (x / x_max)^α)
//! ```
//!
//! Only stored (nonzero) cells are visited. Each pass shuffles the visiting
//! order with the seeded RNG and applies AdaGrad updates. The returned
//! embedding for term `i` is `wᵢ + w̃ᵢ`.
//!
//! # Failure Modes
//!
//! - **rank ≥ vocabulary size**: trains fine but the vectors are
//!   overparameterized and unstable across seeds
//! - **Large learning rate**: cost can blow up; a non-finite cost is an error
//!
//! # References
//!
//! Pennington, Socher & Manning (2014). "GloVe: Global Vectors for Word
//! Representation." EMNLP.

use std::collections::HashMap;

use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;

use crate::error::{Error, Result};
use crate::text::{CooccurrenceMatrix, Vocabulary};

/// Dense `V × D` lookup table from term to vector.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingTable {
    index: HashMap<String, usize>,
    vectors: Array2<f32>,
}

impl EmbeddingTable {
    /// Table from terms in row order and a matching matrix.
    pub fn new(terms: &[String], vectors: Array2<f32>) -> Result<Self> {
        if terms.len() != vectors.nrows() {
            return Err(Error::DimensionMismatch {
                expected: terms.len(),
                found: vectors.nrows(),
            });
        }
        let index = terms
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();
        Ok(Self { index, vectors })
    }

    /// Vector for a term, `None` when the term has no row.
    pub fn get(&self, term: &str) -> Option<ArrayView1<'_, f32>> {
        self.index.get(term).map(|&i| self.vectors.row(i))
    }

    /// Embedding dimension.
    pub fn dim(&self) -> usize {
        self.vectors.ncols()
    }

    /// Number of terms.
    pub fn len(&self) -> usize {
        self.vectors.nrows()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.vectors.nrows() == 0
    }

    /// The underlying matrix, rows in vocabulary id order.
    pub fn vectors(&self) -> &Array2<f32> {
        &self.vectors
    }
}

/// Outcome of a training run.
#[derive(Debug, Clone)]
pub struct GloveFit {
    /// Learned word vectors.
    pub embeddings: EmbeddingTable,
    /// Mean weighted cost after each pass.
    pub cost_history: Vec<f64>,
    /// Passes performed.
    pub n_iter: usize,
    /// Whether the relative cost change fell below the tolerance.
    pub converged: bool,
}

/// GloVe trainer.
#[derive(Debug, Clone)]
pub struct Glove {
    rank: usize,
    x_max: f64,
    alpha: f64,
    learning_rate: f64,
    n_iter: usize,
    convergence_tol: f64,
    seed: Option<u64>,
}

/// Train embeddings with default hyperparameters apart from `rank`, `x_max`, `n_iter`.
pub fn train_embeddings(
    cooccurrence: &CooccurrenceMatrix,
    vocabulary: &Vocabulary,
    rank: usize,
    x_max: f64,
    n_iter: usize,
) -> Result<GloveFit> {
    Glove::new(rank)
        .with_x_max(x_max)
        .with_n_iter(n_iter)
        .fit(cooccurrence, vocabulary)
}

/// Weighting function `f(x) = min(1, (x / x_max)^alpha)`.
#[inline]
pub fn glove_weight(x: f64, x_max: f64, alpha: f64) -> f64 {
    if x < x_max {
        (x / x_max).powf(alpha)
    } else {
        1.0
    }
}

impl Glove {
    /// Trainer for `rank`-dimensional vectors.
    pub fn new(rank: usize) -> Self {
        Self {
            rank,
            x_max: 10.0,
            alpha: 0.75,
            learning_rate: 0.15,
            n_iter: 20,
            convergence_tol: 0.0,
            seed: None,
        }
    }

    /// Set weighting cap.
    pub fn with_x_max(mut self, x_max: f64) -> Self {
        self.x_max = x_max;
        self
    }

    /// Set weighting exponent.
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set AdaGrad learning rate.
    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Set number of passes.
    pub fn with_n_iter(mut self, n_iter: usize) -> Self {
        self.n_iter = n_iter;
        self
    }

    /// Stop early once `|Δcost| / cost` drops below `tol`. `0.0` disables.
    pub fn with_convergence_tol(mut self, tol: f64) -> Self {
        self.convergence_tol = tol;
        self
    }

    /// Set random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Train on `cooccurrence`, labelling rows with `vocabulary` terms.
    pub fn fit(
        &self,
        cooccurrence: &CooccurrenceMatrix,
        vocabulary: &Vocabulary,
    ) -> Result<GloveFit> {
        let v = cooccurrence.dim();
        if v != vocabulary.len() {
            return Err(Error::DimensionMismatch {
                expected: vocabulary.len(),
                found: v,
            });
        }
        if cooccurrence.nnz() == 0 {
            return Err(Error::EmptyInput);
        }
        if self.rank == 0 {
            return Err(Error::InvalidParameter {
                name: "rank",
                message: "must be > 0",
            });
        }
        if self.x_max.is_nan() || self.x_max <= 0.0 {
            return Err(Error::InvalidParameter {
                name: "x_max",
                message: "must be > 0",
            });
        }
        if self.rank >= v {
            tracing::warn!(
                rank = self.rank,
                vocabulary = v,
                "embedding rank is not smaller than the vocabulary; vectors will be unstable"
            );
        }

        let mut rng: Box<dyn RngCore> = match self.seed {
            Some(s) => Box::new(StdRng::seed_from_u64(s)),
            None => Box::new(rand::rng()),
        };

        let d = self.rank;
        let scale = 1.0 / d as f64;
        let mut init = |rows: usize| -> Array2<f64> {
            Array2::from_shape_fn((rows, d), |_| (rng.random::<f64>() - 0.5) * scale)
        };
        let mut w = init(v);
        let mut wc = init(v);
        let mut b = Array1::from_shape_fn(v, |_| (rng.random::<f64>() - 0.5) * scale);
        let mut bc = Array1::from_shape_fn(v, |_| (rng.random::<f64>() - 0.5) * scale);

        // AdaGrad accumulators start at 1 so the first step is the raw learning rate.
        let mut gw = Array2::<f64>::ones((v, d));
        let mut gwc = Array2::<f64>::ones((v, d));
        let mut gb = Array1::<f64>::ones(v);
        let mut gbc = Array1::<f64>::ones(v);

        let entries = cooccurrence.entries();
        let mut order: Vec<usize> = (0..entries.len()).collect();
        let lr = self.learning_rate;

        let mut cost_history = Vec::with_capacity(self.n_iter);
        let mut converged = false;
        let mut n_iter = 0;

        for epoch in 0..self.n_iter {
            order.shuffle(&mut rng);
            let mut cost = 0.0;

            for &e in &order {
                let (i, j, x) = entries[e];
                let diff = w.row(i).dot(&wc.row(j)) + b[i] + bc[j] - x.ln();
                let fdiff = glove_weight(x, self.x_max, self.alpha) * diff;
                cost += 0.5 * fdiff * diff;

                for k in 0..d {
                    let gi = fdiff * wc[[j, k]];
                    let gj = fdiff * w[[i, k]];
                    w[[i, k]] -= lr * gi / gw[[i, k]].sqrt();
                    wc[[j, k]] -= lr * gj / gwc[[j, k]].sqrt();
                    gw[[i, k]] += gi * gi;
                    gwc[[j, k]] += gj * gj;
                }

                b[i] -= lr * fdiff / gb[i].sqrt();
                bc[j] -= lr * fdiff / gbc[j].sqrt();
                gb[i] += fdiff * fdiff;
                gbc[j] += fdiff * fdiff;
            }

            cost /= entries.len() as f64;
            n_iter = epoch + 1;

            if !cost.is_finite() {
                return Err(Error::Other(format!(
                    "embedding cost diverged at pass {n_iter}"
                )));
            }
            tracing::debug!(pass = n_iter, cost, "glove pass");

            let prev = cost_history.last().copied();
            cost_history.push(cost);

            if self.convergence_tol > 0.0 {
                if let Some(prev) = prev {
                    if (prev - cost).abs() / cost.max(f64::EPSILON) < self.convergence_tol {
                        converged = true;
                        break;
                    }
                }
            }
        }

        let vectors = (&w + &wc).mapv(|x| x as f32);
        let embeddings = EmbeddingTable::new(vocabulary.terms(), vectors)?;

        tracing::info!(
            terms = v,
            rank = d,
            passes = n_iter,
            converged,
            final_cost = cost_history.last().copied().unwrap_or(f64::NAN),
            "embeddings trained"
        );

        Ok(GloveFit {
            embeddings,
            cost_history,
            n_iter,
            converged,
        })
    }
}
