//! Error types shared by ingestion and the query path.
//!
//! Both paths see the same failures; they differ only in what they do with
//! them. Ingestion stops on anything fatal, the query service turns failures
//! into a readable tool result. [`PrContextError::kind`] gives each call site
//! the tag to make that choice explicitly.

use pr_context_embeddings::EmbeddingError;
use thiserror::Error;

/// Result type alias for corpus operations.
pub type Result<T> = std::result::Result<T, PrContextError>;

/// Errors that can occur while building or querying a PR corpus.
#[derive(Error, Debug)]
pub enum PrContextError {
    /// Invalid repository URL or missing credential, detected before any
    /// network call.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// The VCS API call failed (auth, rate limit, not found, transport).
    #[error("upstream fetch failed: {0}")]
    UpstreamFetch(String),

    /// The embedding provider call failed.
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    /// A query input did not have the expected shape.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// The corpus file is missing or contains an unparseable line.
    #[error("failed to load corpus {path}: {reason}")]
    CorpusLoad { path: String, reason: String },

    /// Query and corpus vectors have different dimensions.
    #[error("dimension mismatch: corpus has {expected}, query has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of a [`PrContextError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Precondition,
    UpstreamFetch,
    Embedding,
    MalformedInput,
    CorpusLoad,
    Internal,
}

impl PrContextError {
    /// The taxonomy tag for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Precondition(_) => ErrorKind::Precondition,
            Self::UpstreamFetch(_) => ErrorKind::UpstreamFetch,
            Self::Embedding(_) => ErrorKind::Embedding,
            Self::MalformedInput(_) => ErrorKind::MalformedInput,
            Self::CorpusLoad { .. } => ErrorKind::CorpusLoad,
            Self::DimensionMismatch { .. } | Self::Serialization(_) | Self::Io(_) => {
                ErrorKind::Internal
            }
        }
    }

    pub(crate) fn corpus_load(path: &std::path::Path, reason: impl Into<String>) -> Self {
        Self::CorpusLoad {
            path: path.display().to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_kind_tags() {
        assert_eq!(
            PrContextError::Precondition("missing token".into()).kind(),
            ErrorKind::Precondition
        );
        assert_eq!(
            PrContextError::from(EmbeddingError::ZeroMagnitude).kind(),
            ErrorKind::Embedding
        );
        assert_eq!(
            PrContextError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
            .kind(),
            ErrorKind::Internal
        );
    }
}
