//! File store error types.

use tessera_core::{GatewayError, TenantId};
use tessera_registry::RegistryError;
use thiserror::Error;

/// Errors from tenant file operations.
#[derive(Debug, Error)]
pub enum FileStoreError {
    /// The target tenant does not exist.
    #[error("tenant not found: {0}")]
    TenantNotFound(TenantId),

    /// The uploaded name reduces to an unusable path segment.
    #[error("invalid file name: {0:?}")]
    InvalidFileName(String),

    /// The object store or durable tier failed.
    #[error("file storage error: {0}")]
    Storage(String),
}

impl From<RegistryError> for FileStoreError {
    fn from(err: RegistryError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<FileStoreError> for GatewayError {
    fn from(err: FileStoreError) -> Self {
        match err {
            FileStoreError::TenantNotFound(_) => GatewayError::tenant_not_found(),
            FileStoreError::InvalidFileName(_) => GatewayError::Validation(err.to_string()),
            FileStoreError::Storage(msg) => GatewayError::Storage(msg),
        }
    }
}

/// Result type for tenant file operations.
pub type FileStoreResult<T> = Result<T, FileStoreError>;
