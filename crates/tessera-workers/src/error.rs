//! Code distribution store error types.

use tessera_core::{GatewayError, MAX_HANDLER_BYTES, TenantId};
use tessera_registry::RegistryError;
use thiserror::Error;

/// Errors from code distribution operations.
#[derive(Debug, Error)]
pub enum WorkerStoreError {
    /// The module exceeds the deployable size bound.
    #[error("module too large: {size} bytes (max {MAX_HANDLER_BYTES})")]
    SourceTooLarge {
        /// Size of the rejected module.
        size: usize,
    },

    /// The target tenant does not exist.
    #[error("tenant not found: {0}")]
    TenantNotFound(TenantId),

    /// The durable tier failed or a stored row is unreadable.
    #[error("worker storage error: {0}")]
    Storage(String),
}

impl From<RegistryError> for WorkerStoreError {
    fn from(err: RegistryError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<WorkerStoreError> for GatewayError {
    fn from(err: WorkerStoreError) -> Self {
        match err {
            WorkerStoreError::SourceTooLarge { .. } => GatewayError::Validation(err.to_string()),
            WorkerStoreError::TenantNotFound(_) => GatewayError::tenant_not_found(),
            WorkerStoreError::Storage(msg) => GatewayError::Storage(msg),
        }
    }
}

/// Result type for code distribution operations.
pub type WorkerStoreResult<T> = Result<T, WorkerStoreError>;
