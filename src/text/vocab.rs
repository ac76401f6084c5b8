//! Tokenizer-backed vocabulary with frequency pruning.
//!
//! Term ids are assigned in lexicographic order of the surviving terms, so the
//! mapping depends only on the multiset of tokens in the corpus, never on
//! document order or hash iteration order.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::tokenize;
use crate::error::{Error, Result};

/// Terms with corpus frequency at least `min_count`, densely indexed `0..len`.
///
/// Serialized without the term index; deserializing rebuilds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "VocabularyRepr")]
pub struct Vocabulary {
    terms: Vec<String>,
    counts: Vec<usize>,
    #[serde(skip)]
    index: HashMap<String, usize>,
    min_count: usize,
}

#[derive(Deserialize)]
struct VocabularyRepr {
    terms: Vec<String>,
    counts: Vec<usize>,
    min_count: usize,
}

impl From<VocabularyRepr> for Vocabulary {
    fn from(repr: VocabularyRepr) -> Self {
        let mut vocabulary = Self {
            terms: repr.terms,
            counts: repr.counts,
            index: HashMap::new(),
            min_count: repr.min_count,
        };
        vocabulary.reindex();
        vocabulary
    }
}

/// Build a vocabulary from cleaned documents.
///
/// Each document is split with [`tokenize`]. Fails with
/// [`Error::EmptyVocabulary`] when nothing reaches `min_count`.
pub fn build_vocabulary<S: AsRef<str>>(cleaned_docs: &[S], min_count: usize) -> Result<Vocabulary> {
    Vocabulary::from_token_sequences(
        cleaned_docs.iter().map(|d| tokenize(d.as_ref())),
        min_count,
    )
}

impl Vocabulary {
    /// Build from already-tokenized documents.
    pub fn from_token_sequences<I, D, T>(docs: I, min_count: usize) -> Result<Self>
    where
        I: IntoIterator<Item = D>,
        D: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut freq: BTreeMap<String, usize> = BTreeMap::new();
        for doc in docs {
            for tok in doc {
                let tok = tok.as_ref();
                match freq.get_mut(tok) {
                    Some(c) => *c += 1,
                    None => {
                        freq.insert(tok.to_owned(), 1);
                    }
                }
            }
        }

        let (terms, counts): (Vec<String>, Vec<usize>) =
            freq.into_iter().filter(|(_, c)| *c >= min_count).unzip();

        if terms.is_empty() {
            return Err(Error::EmptyVocabulary { min_count });
        }

        tracing::debug!(terms = terms.len(), min_count, "vocabulary pruned");

        Ok(VocabularyRepr {
            terms,
            counts,
            min_count,
        }
        .into())
    }

    /// Number of terms.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Whether there are no terms (never true for a built vocabulary).
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Id of a term.
    pub fn id(&self, term: &str) -> Option<usize> {
        self.index.get(term).copied()
    }

    /// Term for an id.
    pub fn term(&self, id: usize) -> Option<&str> {
        self.terms.get(id).map(String::as_str)
    }

    /// Corpus frequency for an id.
    pub fn count(&self, id: usize) -> Option<usize> {
        self.counts.get(id).copied()
    }

    /// Pruning threshold this vocabulary was built with.
    pub fn min_count(&self) -> usize {
        self.min_count
    }

    /// Terms in id order.
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Map tokens to ids, `None` for out-of-vocabulary tokens.
    pub fn encode<T: AsRef<str>>(&self, tokens: &[T]) -> Vec<Option<usize>> {
        tokens.iter().map(|t| self.id(t.as_ref())).collect()
    }

    fn reindex(&mut self) {
        self.index = self
            .terms
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();
    }
}
