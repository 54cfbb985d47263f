//! Registry error types.

use tessera_core::{GatewayError, TenantId};
use thiserror::Error;

/// Errors from tenant registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A tenant with this identifier already exists.
    #[error("tenant already exists: {0}")]
    AlreadyExists(TenantId),

    /// The durable tier failed.
    #[error("registry storage error: {0}")]
    Storage(String),
}

impl From<RegistryError> for GatewayError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::AlreadyExists(id) => {
                GatewayError::Validation(format!("tenant already exists: {id}"))
            },
            RegistryError::Storage(msg) => GatewayError::Storage(msg),
        }
    }
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
