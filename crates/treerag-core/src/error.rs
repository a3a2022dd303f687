//! Error taxonomy for tree construction and retrieval.
//!
//! Public functions in this crate return [`anyhow::Result`], matching the
//! rest of the codebase. Failures that callers may want to tell apart are
//! raised as [`RagError`] values, so they can be recovered with
//! `err.downcast_ref::<RagError>()`.
//!
//! A document without a stored tree is not an error: lookups return
//! `Ok(None)`.

use thiserror::Error;

/// Typed failures raised by the core pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RagError {
    /// Invalid token budget, cluster size, or missing collaborator.
    #[error("Invalid configuration: {0}")]
    Configuration(String),
    /// The embedding provider failed or returned malformed output.
    #[error("Embedding failed: {0}")]
    EmbeddingFailure(String),
    /// The summarizer failed.
    #[error("Summarization failed: {0}")]
    SummarizationFailure(String),
    /// A persisted row could not be decoded.
    #[error("Corrupted tree node {id}: {reason}")]
    StoreCorruption { id: i64, reason: String },
    /// Clustering could not run on the given input.
    #[error("Clustering failed: {0}")]
    Clustering(String),
    /// The tokenizer could not encode or decode text.
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),
    /// The document produced no chunks.
    #[error("Document '{0}' has no content to index")]
    EmptyDocument(String),
}

impl RagError {
    /// Returns the typed error carried by an [`anyhow::Error`], if any.
    pub fn from_anyhow(err: &anyhow::Error) -> Option<&RagError> {
        err.downcast_ref::<RagError>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = RagError::EmbeddingFailure("timeout".into()).into();
        assert_eq!(
            RagError::from_anyhow(&err),
            Some(&RagError::EmbeddingFailure("timeout".into()))
        );
        assert_eq!(err.to_string(), "Embedding failed: timeout");
    }

    #[test]
    fn test_context_keeps_typed_error() {
        let err = anyhow::Error::from(RagError::StoreCorruption {
            id: 7,
            reason: "bad json".into(),
        })
        .context("loading tree 'notes.txt'");
        assert!(matches!(
            RagError::from_anyhow(&err),
            Some(RagError::StoreCorruption { id: 7, .. })
        ));
    }
}
