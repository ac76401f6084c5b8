//! Distance-weighted term-term co-occurrence counts.
//!
//! For a center token at position `p` and a context token at `q` with
//! `p < q <= p + window`, both cells `(i, j)` and `(j, i)` receive `1 / (q - p)`.
//! Positions are those of the original token sequence: out-of-vocabulary
//! tokens are skipped as center and as context but still occupy a position.
//! A term co-occurring with itself lands on the diagonal twice, so the matrix
//! equals `C + Cᵀ` for the one-sided count matrix `C`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::Vocabulary;
use crate::error::{Error, Result};

/// Sparse symmetric `V × V` matrix in row-major coordinate form.
///
/// Entries are sorted by `(row, col)`; pairs that never co-occur have no entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CooccurrenceMatrix {
    dim: usize,
    entries: Vec<(usize, usize, f64)>,
}

/// Build the co-occurrence matrix for `token_sequences` over `vocabulary`.
///
/// Deterministic given input order: every cell accumulates its weights in
/// corpus order.
pub fn build_cooccurrence<D, T>(
    token_sequences: &[D],
    vocabulary: &Vocabulary,
    window: usize,
) -> Result<CooccurrenceMatrix>
where
    D: AsRef<[T]>,
    T: AsRef<str>,
{
    if window == 0 {
        return Err(Error::InvalidParameter {
            name: "window",
            message: "must be > 0",
        });
    }

    let mut cells: HashMap<(usize, usize), f64> = HashMap::new();

    for doc in token_sequences {
        let ids = vocabulary.encode(doc.as_ref());
        for (p, center) in ids.iter().enumerate() {
            let Some(i) = *center else { continue };
            let end = (p + window).min(ids.len() - 1);
            for q in (p + 1)..=end {
                let Some(j) = ids[q] else { continue };
                let w = 1.0 / (q - p) as f64;
                *cells.entry((i, j)).or_insert(0.0) += w;
                *cells.entry((j, i)).or_insert(0.0) += w;
            }
        }
    }

    let mut entries: Vec<(usize, usize, f64)> =
        cells.into_iter().map(|((i, j), w)| (i, j, w)).collect();
    entries.sort_unstable_by_key(|&(i, j, _)| (i, j));

    tracing::debug!(
        dim = vocabulary.len(),
        nnz = entries.len(),
        window,
        "co-occurrence matrix built"
    );

    Ok(CooccurrenceMatrix {
        dim: vocabulary.len(),
        entries,
    })
}

impl CooccurrenceMatrix {
    /// Matrix dimension (vocabulary size).
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of stored (nonzero) cells.
    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    /// Stored cells as `(row, col, weight)`, sorted by `(row, col)`.
    pub fn entries(&self) -> &[(usize, usize, f64)] {
        &self.entries
    }

    /// Weight at `(i, j)`, zero when absent.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.entries
            .binary_search_by_key(&(i, j), |&(r, c, _)| (r, c))
            .map(|idx| self.entries[idx].2)
            .unwrap_or(0.0)
    }

    /// Whether `M[i][j]` and `M[j][i]` agree within `tol` for every stored cell.
    pub fn is_symmetric(&self, tol: f64) -> bool {
        self.entries
            .iter()
            .all(|&(i, j, w)| (self.get(j, i) - w).abs() <= tol)
    }
}
