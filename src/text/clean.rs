//! Document cleaning contract.

use std::collections::HashSet;

/// Maps a raw document to its cleaned token sequence.
///
/// Implementations must be deterministic: the same input always yields the
/// same tokens.
pub trait TextCleaner {
    /// Clean one raw document.
    fn clean(&self, raw: &str) -> Vec<String>;
}

impl<F> TextCleaner for F
where
    F: Fn(&str) -> Vec<String>,
{
    fn clean(&self, raw: &str) -> Vec<String> {
        self(raw)
    }
}

/// Lower-cases, splits on anything non-alphabetic, drops short tokens and stopwords.
///
/// Numbers and punctuation disappear because they are treated as separators.
/// No stemming or lemmatization.
#[derive(Debug, Clone)]
pub struct BasicCleaner {
    stopwords: HashSet<String>,
    min_len: usize,
}

impl BasicCleaner {
    /// Cleaner with no stopwords and a minimum token length of 2.
    pub fn new() -> Self {
        Self {
            stopwords: HashSet::new(),
            min_len: 2,
        }
    }

    /// Drop these words (compared after lower-casing).
    pub fn with_stopwords<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.stopwords = words
            .into_iter()
            .map(|w| w.as_ref().to_lowercase())
            .collect();
        self
    }

    /// Set minimum token length in characters.
    pub fn with_min_len(mut self, min_len: usize) -> Self {
        self.min_len = min_len;
        self
    }
}

impl Default for BasicCleaner {
    fn default() -> Self {
        Self::new()
    }
}

impl TextCleaner for BasicCleaner {
    fn clean(&self, raw: &str) -> Vec<String> {
        raw.to_lowercase()
            .split(|c: char| !c.is_alphabetic())
            .filter(|t| t.chars().count() >= self.min_len)
            .filter(|t| !self.stopwords.contains(*t))
            .map(str::to_owned)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_cleaner_strips_case_digits_and_stopwords() {
        let cleaner = BasicCleaner::new().with_stopwords(["the", "A"]);
        let tokens = cleaner.clean("The 2 BEST films of 1999: a <br/> Masterpiece!");
        assert_eq!(tokens, vec!["best", "films", "of", "br", "masterpiece"]);
    }

    #[test]
    fn closures_are_cleaners() {
        let upper = |s: &str| vec![s.to_uppercase()];
        assert_eq!(upper.clean("x"), vec!["X".to_string()]);
    }

    #[test]
    fn cleaning_is_deterministic() {
        let cleaner = BasicCleaner::default();
        let raw = "Not bad, not great... 7/10";
        assert_eq!(cleaner.clean(raw), cleaner.clean(raw));
    }
}
