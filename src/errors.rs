//! Error types for mnemo.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for mnemo operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Caller input failed validation. Lists every offending field.
    #[error("Invalid input: {} must be non-empty text", .fields.join(", "))]
    Validation { fields: Vec<&'static str> },

    /// Durability layer failure (connection, constraint, lock).
    #[error("Storage error: {0}")]
    Storage(#[from] crate::sqlite::Error),

    /// Two vectors of unequal length were compared.
    #[error("Dimension mismatch: expected {expected} components, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The query could not be embedded, so it cannot be ranked.
    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    /// The embedding capability did not answer in time.
    #[error("Embedding timed out after {0:?}")]
    EmbeddingTimeout(Duration),

    /// Operation attempted on a closed engine.
    #[error("Memory engine is closed")]
    Closed,

    /// Embedding provider failure.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// ONNX inference error.
    #[error("Inference error: {0}")]
    Inference(String),

    /// Tokenization error.
    #[error("Tokenization error: {0}")]
    Tokenization(#[from] tokenizers::Error),

    /// ONNX session error.
    #[error("ONNX session error: {0}")]
    Onnx(#[from] ort::Error),

    /// HuggingFace Hub error.
    #[error("HuggingFace Hub error: {0}")]
    HfHub(#[from] hf_hub::api::sync::ApiError),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Build a validation error from the names of the fields that failed.
    pub fn invalid(fields: Vec<&'static str>) -> Self {
        Error::Validation { fields }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_lists_every_field() {
        let err = Error::invalid(vec!["role", "content"]);
        let msg = err.to_string();
        assert!(msg.contains("role, content"));
    }

    #[test]
    fn test_storage_error_wraps_sqlite_error() {
        let err: Error = crate::sqlite::Error::Sqlite("disk I/O error".to_string()).into();
        assert!(matches!(err, Error::Storage(_)));
        assert!(err.to_string().contains("disk I/O error"));
    }

    #[test]
    fn test_timeout_display() {
        let err = Error::EmbeddingTimeout(Duration::from_secs(3));
        assert!(err.to_string().contains("3s"));
    }
}
