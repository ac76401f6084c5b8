//! Text stages: cleaning contract, tokenizer & vocabulary, co-occurrence counts.
//!
//! Cleaning (case folding, punctuation and stopword removal, stemming) happens
//! before anything here sees the text. The only requirement is that it maps a
//! raw string to a token sequence deterministically; see [`TextCleaner`].
//!
//! ```rust
//! use textclust::text::{build_cooccurrence, build_vocabulary, tokenize};
//!
//! let docs = ["good film good cast", "bad film bad plot"];
//! let vocab = build_vocabulary(&docs, 2).unwrap();
//! assert_eq!(vocab.len(), 3); // bad, film, good
//!
//! let tokens: Vec<Vec<&str>> = docs.iter().map(|d| tokenize(d)).collect();
//! let m = build_cooccurrence(&tokens, &vocab, 5).unwrap();
//! assert!(m.is_symmetric(0.0));
//! ```

mod clean;
mod cooccurrence;
mod vocab;

pub use clean::{BasicCleaner, TextCleaner};
pub use cooccurrence::{build_cooccurrence, CooccurrenceMatrix};
pub use vocab::{build_vocabulary, Vocabulary};

/// Split text on non-word characters.
///
/// A word character is alphanumeric or `_`. Empty pieces are dropped.
pub fn tokenize(text: &str) -> Vec<&str> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_splits_on_punctuation_and_whitespace() {
        assert_eq!(
            tokenize("it's  a film--really_good!"),
            vec!["it", "s", "a", "film", "really_good"]
        );
        assert!(tokenize(" ... ").is_empty());
    }
}
