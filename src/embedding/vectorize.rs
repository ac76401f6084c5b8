//! Mean-of-embeddings document vectors.

use serde::{Deserialize, Serialize};

use super::EmbeddingTable;
use crate::corpus::Corpus;
use crate::error::Error;
use crate::text::tokenize;

/// Which token sequence a document vector is averaged from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorSource {
    /// The cleaned tokens the vocabulary was built from.
    #[default]
    Cleaned,
    /// The raw text, lower-cased and split on non-word characters.
    ///
    /// Tokens that cleaning would have removed or rewritten simply miss the
    /// table, so raw vectors average over fewer words.
    Raw,
}

/// A document's vector, or the marker that none of its tokens were found.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentVector {
    /// Elementwise mean of the found embedding rows.
    Present(Vec<f32>),
    /// No token had an embedding row.
    Missing,
}

impl DocumentVector {
    /// Whether this is [`DocumentVector::Missing`].
    pub fn is_missing(&self) -> bool {
        matches!(self, DocumentVector::Missing)
    }

    /// The vector, if present.
    pub fn as_slice(&self) -> Option<&[f32]> {
        match self {
            DocumentVector::Present(v) => Some(v),
            DocumentVector::Missing => None,
        }
    }
}

/// Average the embeddings of `tokens` found in `table`.
pub fn vectorize<T: AsRef<str>>(tokens: &[T], table: &EmbeddingTable) -> DocumentVector {
    let mut sum = vec![0.0f64; table.dim()];
    let mut found = 0usize;

    for tok in tokens {
        if let Some(row) = table.get(tok.as_ref()) {
            for (s, &x) in sum.iter_mut().zip(row.iter()) {
                *s += x as f64;
            }
            found += 1;
        }
    }

    if found == 0 {
        return DocumentVector::Missing;
    }
    let n = found as f64;
    DocumentVector::Present(sum.into_iter().map(|s| (s / n) as f32).collect())
}

/// Vectorize raw text: lower-case, split on non-word characters, then [`vectorize`].
pub fn vectorize_raw(raw: &str, table: &EmbeddingTable) -> DocumentVector {
    let lowered = raw.to_lowercase();
    vectorize(&tokenize(&lowered), table)
}

/// Vectors for every document that has one, and the ids of those that do not.
///
/// `rows[i]` belongs to document `ids[i]`. This is the input handed to the
/// cluster engines; missing documents are never in it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentVectors {
    /// Document ids, parallel to `rows`.
    pub ids: Vec<usize>,
    /// One vector per present document.
    pub rows: Vec<Vec<f32>>,
    /// Ids of documents with no in-vocabulary token.
    pub missing: Vec<usize>,
}

impl DocumentVectors {
    /// Number of present vectors.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no document produced a vector.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// One [`Error::MissingDocumentVector`] per excluded document.
    pub fn missing_errors(&self) -> Vec<Error> {
        self.missing
            .iter()
            .map(|&doc_id| Error::MissingDocumentVector { doc_id })
            .collect()
    }
}

/// Vectorize every document of `corpus`.
pub fn vectorize_corpus(
    corpus: &Corpus,
    table: &EmbeddingTable,
    source: VectorSource,
) -> DocumentVectors {
    let mut out = DocumentVectors::default();

    for doc in corpus.documents() {
        let v = match source {
            VectorSource::Cleaned => vectorize(&doc.tokens, table),
            VectorSource::Raw => vectorize_raw(&doc.raw, table),
        };
        match v {
            DocumentVector::Present(row) => {
                out.ids.push(doc.id);
                out.rows.push(row);
            }
            DocumentVector::Missing => {
                tracing::debug!(doc_id = doc.id, "document has no in-vocabulary tokens");
                out.missing.push(doc.id);
            }
        }
    }

    if !out.missing.is_empty() {
        tracing::warn!(
            missing = out.missing.len(),
            total = corpus.len(),
            "documents without vectors excluded from clustering"
        );
    }
    out
}
