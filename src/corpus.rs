//! Documents and the corpus they form.
//!
//! Documents are cleaned once at construction and never mutated afterwards.
//! Derived data (vectors, cluster labels) lives in separate values keyed by
//! document id.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::text::TextCleaner;

/// One document: raw text, its cleaned tokens, and an optional external label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Unique id.
    pub id: usize,
    /// Raw text as ingested.
    pub raw: String,
    /// Cleaned token sequence.
    pub tokens: Vec<String>,
    /// External label, e.g. sentiment in `{0, 1}`.
    pub label: Option<u8>,
}

impl Document {
    /// Document with already-cleaned tokens and no label.
    pub fn new(id: usize, raw: impl Into<String>, tokens: Vec<String>) -> Self {
        Self {
            id,
            raw: raw.into(),
            tokens,
            label: None,
        }
    }

    /// Attach an external label.
    pub fn with_label(mut self, label: u8) -> Self {
        self.label = Some(label);
        self
    }
}

/// An immutable collection of documents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
    documents: Vec<Document>,
    by_id: HashMap<usize, usize>,
}

impl Corpus {
    /// Corpus from prepared documents.
    pub fn new(documents: Vec<Document>) -> Self {
        let by_id = documents
            .iter()
            .enumerate()
            .map(|(pos, d)| (d.id, pos))
            .collect();
        Self { documents, by_id }
    }

    /// Clean raw texts; ids are positions.
    pub fn from_texts<I, S, C>(texts: I, cleaner: &C) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        C: TextCleaner + ?Sized,
    {
        Self::new(
            texts
                .into_iter()
                .enumerate()
                .map(|(id, raw)| {
                    let raw = raw.into();
                    let tokens = cleaner.clean(&raw);
                    Document::new(id, raw, tokens)
                })
                .collect(),
        )
    }

    /// Clean `(raw text, label)` pairs; ids are positions.
    pub fn from_labeled_texts<I, S, C>(pairs: I, cleaner: &C) -> Self
    where
        I: IntoIterator<Item = (S, u8)>,
        S: Into<String>,
        C: TextCleaner + ?Sized,
    {
        Self::new(
            pairs
                .into_iter()
                .enumerate()
                .map(|(id, (raw, label))| {
                    let raw = raw.into();
                    let tokens = cleaner.clean(&raw);
                    Document::new(id, raw, tokens).with_label(label)
                })
                .collect(),
        )
    }

    /// All documents in ingestion order.
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Document by id.
    pub fn get(&self, id: usize) -> Option<&Document> {
        self.by_id.get(&id).map(|&pos| &self.documents[pos])
    }

    /// Cleaned token sequences in ingestion order.
    pub fn token_sequences(&self) -> Vec<&[String]> {
        self.documents.iter().map(|d| d.tokens.as_slice()).collect()
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the corpus has no documents.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::BasicCleaner;

    #[test]
    fn from_labeled_texts_cleans_and_labels() {
        let corpus = Corpus::from_labeled_texts(
            [("Loved it!", 1u8), ("Hated it.", 0u8)],
            &BasicCleaner::new(),
        );
        assert_eq!(corpus.len(), 2);
        let d = corpus.get(1).unwrap();
        assert_eq!(d.tokens, vec!["hated", "it"]);
        assert_eq!(d.label, Some(0));
        assert_eq!(d.raw, "Hated it.");
    }

    #[test]
    fn lookup_by_id_uses_document_ids() {
        let corpus = Corpus::new(vec![Document::new(7, "x", vec![])]);
        assert!(corpus.get(0).is_none());
        assert_eq!(corpus.get(7).map(|d| d.id), Some(7));
    }
}
