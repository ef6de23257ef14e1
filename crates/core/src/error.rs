//! Error types for pagecite.
//!
//! One enum covers every failure category in the workspace: the retrieval
//! taxonomy (invalid chunking parameters, empty corpus/document, missing
//! index, dimension drift, backend trouble) plus the ambient configuration,
//! I/O, prompt and serialization errors.

use thiserror::Error;

/// Unified error type for pagecite.
///
/// All fallible functions return `Result<T, AppError>`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Chunking parameters are malformed (e.g. overlap >= size)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Retriever initialization was attempted without any chunks
    #[error("Cannot initialize retriever: corpus is empty")]
    EmptyCorpus,

    /// A document produced no chunks after extraction
    #[error("Document '{0}' contains no extractable text")]
    EmptyDocument(String),

    /// No tracked document has the given name
    #[error("Document '{0}' not found")]
    DocumentNotFound(String),

    /// Search or incremental add before any successful init
    #[error("Retriever not initialized: ingest a document first")]
    NotInitialized,

    /// Embedding dimension differs from the one stored in the index
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Embedding, reranking or generation backend unreachable or misbehaving
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Embedding, reranking or generation backend too slow
    #[error("Backend timed out: {0}")]
    BackendTimeout(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Knowledge base errors that fit no narrower category
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Prompt loading and rendering errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AppError {
    /// Whether the failure is a transient backend condition worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::BackendUnavailable(_) | AppError::BackendTimeout(_)
        )
    }

    /// Short machine-readable kind, used in structured error responses.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config",
            AppError::InvalidConfig(_) => "invalid_config",
            AppError::EmptyCorpus => "empty_corpus",
            AppError::EmptyDocument(_) => "empty_document",
            AppError::DocumentNotFound(_) => "document_not_found",
            AppError::NotInitialized => "not_initialized",
            AppError::DimensionMismatch { .. } => "dimension_mismatch",
            AppError::BackendUnavailable(_) => "backend_unavailable",
            AppError::BackendTimeout(_) => "backend_timeout",
            AppError::Io(_) => "io",
            AppError::Knowledge(_) => "knowledge",
            AppError::Prompt(_) => "prompt",
            AppError::Serialization(_) => "serialization",
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(AppError::BackendUnavailable("down".to_string()).is_retryable());
        assert!(AppError::BackendTimeout("slow".to_string()).is_retryable());
        assert!(!AppError::NotInitialized.is_retryable());
        assert!(!AppError::EmptyCorpus.is_retryable());
    }

    #[test]
    fn test_dimension_mismatch_message() {
        let err = AppError::DimensionMismatch {
            expected: 384,
            actual: 768,
        };
        assert_eq!(
            err.to_string(),
            "Embedding dimension mismatch: expected 384, got 768"
        );
        assert_eq!(err.kind(), "dimension_mismatch");
    }

    #[test]
    fn test_json_error_conversion() {
        let err: AppError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, AppError::Serialization(_)));
    }
}
