//! Storage error types.

use thiserror::Error;

/// Errors from the storage tiers.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Failed to open or connect to a backend.
    #[error("storage connection failed: {0}")]
    Connection(String),

    /// A backend operation failed.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A value could not be serialized or deserialized.
    #[error("storage serialization error: {0}")]
    Serialization(String),

    /// A key was rejected before reaching the backend.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    /// A namespace was rejected before reaching the backend.
    #[error("invalid storage namespace: {0}")]
    InvalidNamespace(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
