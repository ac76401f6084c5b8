use core::fmt;

/// Result alias for `textclust`.
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline stage that produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Validating the pipeline configuration.
    Config,
    /// Tokenizing and pruning the vocabulary.
    Vocabulary,
    /// Building the term-term co-occurrence matrix.
    Cooccurrence,
    /// Training word embeddings.
    Embedding,
    /// Mapping documents to vectors.
    Vectorize,
    /// Fitting a cluster engine.
    Cluster,
    /// Validity indices (Davies-Bouldin, Silhouette).
    Validity,
    /// Bootstrap stability.
    Stability,
    /// Cross-tabulation and top terms.
    Interpret,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Config => "config",
            Stage::Vocabulary => "vocabulary",
            Stage::Cooccurrence => "co-occurrence",
            Stage::Embedding => "embedding",
            Stage::Vectorize => "vectorize",
            Stage::Cluster => "cluster",
            Stage::Validity => "validity",
            Stage::Stability => "stability",
            Stage::Interpret => "interpret",
        };
        f.write_str(name)
    }
}

/// Errors returned by the pipeline stages.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Input was empty.
    EmptyInput,

    /// No term survived frequency pruning.
    EmptyVocabulary {
        /// Minimum corpus frequency that was applied.
        min_count: usize,
    },

    /// Requested more clusters than there are distinct vectors.
    InsufficientData {
        /// Requested cluster count.
        requested: usize,
        /// Number of distinct input vectors.
        distinct: usize,
    },

    /// A document had no in-vocabulary tokens.
    MissingDocumentVector {
        /// Document id.
        doc_id: usize,
    },

    /// Vector dimension mismatch.
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Found dimension.
        found: usize,
    },

    /// Covariance matrix could not be factorized.
    NotPositiveDefinite,

    /// Invalid parameter value.
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Error message.
        message: &'static str,
    },

    /// A failure annotated with the stage and configuration that produced it.
    Stage {
        /// Stage that failed.
        stage: Stage,
        /// Configuration label, e.g. `"kmeans k=10"`.
        config: Option<String>,
        /// Underlying error.
        source: Box<Error>,
    },

    /// Generic error with message.
    Other(String),
}

impl Error {
    /// Attach stage context.
    pub fn at(self, stage: Stage) -> Self {
        Error::Stage {
            stage,
            config: None,
            source: Box::new(self),
        }
    }

    /// Attach stage and configuration context.
    pub fn at_config(self, stage: Stage, config: impl Into<String>) -> Self {
        Error::Stage {
            stage,
            config: Some(config.into()),
            source: Box::new(self),
        }
    }

    /// The innermost error, with any stage context stripped.
    pub fn root(&self) -> &Error {
        match self {
            Error::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether this failure aborts the whole pipeline rather than one configuration.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Stage { stage: Stage::Config, .. } => true,
            Error::Stage { source, .. } => source.is_fatal(),
            other => matches!(other, Error::EmptyVocabulary { .. } | Error::EmptyInput),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EmptyInput => write!(f, "empty input provided"),
            Error::EmptyVocabulary { min_count } => {
                write!(f, "no term occurs at least {min_count} times")
            }
            Error::InsufficientData {
                requested,
                distinct,
            } => {
                write!(
                    f,
                    "cannot create {requested} clusters from {distinct} distinct vectors"
                )
            }
            Error::MissingDocumentVector { doc_id } => {
                write!(f, "document {doc_id} has no in-vocabulary tokens")
            }
            Error::DimensionMismatch { expected, found } => {
                write!(f, "dimension mismatch: expected {expected}, found {found}")
            }
            Error::NotPositiveDefinite => write!(f, "covariance is not positive definite"),
            Error::InvalidParameter { name, message } => {
                write!(f, "invalid parameter '{name}': {message}")
            }
            Error::Stage {
                stage,
                config,
                source,
            } => match config {
                Some(c) => write!(f, "[{stage}] {c}: {source}"),
                None => write!(f, "[{stage}] {source}"),
            },
            Error::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Stage { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_context_is_rendered() {
        let err = Error::InsufficientData {
            requested: 10,
            distinct: 4,
        }
        .at_config(Stage::Cluster, "gmm k=10");
        let s = err.to_string();
        assert!(s.contains("[cluster]"));
        assert!(s.contains("gmm k=10"));
        assert!(s.contains("4 distinct"));
        assert!(!err.is_fatal());
    }

    #[test]
    fn empty_vocabulary_is_fatal() {
        let err = Error::EmptyVocabulary { min_count: 5 }.at(Stage::Vocabulary);
        assert!(err.is_fatal());
        assert_eq!(err.root(), &Error::EmptyVocabulary { min_count: 5 });
    }
}
