//! Error types for vsearch.
//!
//! This module defines a unified error enum that covers every error category
//! in the workspace: the four core failure kinds of the indexing pipeline
//! (encoding, dimension mismatch, store availability, invalid requests) plus
//! configuration, I/O and serialization errors.

use thiserror::Error;

/// Unified error type for vsearch.
///
/// All fallible functions return `Result<T, AppError>`.
#[derive(Error, Debug)]
pub enum AppError {
    /// The embedding backend is unavailable or produced unusable output
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// An embedding does not have the dimensionality the index was created with
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The vector store is closed or unreachable; callers may retry
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Malformed caller input
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Index errors that fit no other category (e.g. corrupt rows)
    #[error("Index error: {0}")]
    Index(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AppError {
    /// Whether the failed operation may succeed if attempted again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::StoreUnavailable(_))
    }

    /// Short stable name of the error category, used in ingestion reports.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Encoding(_) => "encoding",
            AppError::DimensionMismatch { .. } => "dimension_mismatch",
            AppError::StoreUnavailable(_) => "store_unavailable",
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Index(_) => "index",
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
