//! The gateway-wide error taxonomy.
//!
//! Every component converts its internal errors into [`GatewayError`] at
//! the dispatch boundary; the HTTP layer maps the taxonomy onto status
//! codes. Handler failures carry a message only; internal details and
//! stack traces never cross the sandbox boundary.

use thiserror::Error;

/// Errors surfaced by gateway operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Request input was rejected before any side effect (400).
    #[error("{0}")]
    Validation(String),

    /// Tenant, endpoint, or file absent, or not owned by the caller (404).
    #[error("{0}")]
    NotFound(String),

    /// The route exists but not for this HTTP method (405).
    #[error("{0}")]
    MethodNotAllowed(String),

    /// Tenant code threw, timed out, or failed to compile (500).
    #[error("handler execution failed: {0}")]
    SandboxExecution(String),

    /// An underlying store failed (500).
    #[error("storage error: {0}")]
    Storage(String),
}

impl GatewayError {
    /// HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::NotFound(_) => 404,
            Self::MethodNotAllowed(_) => 405,
            Self::SandboxExecution(_) | Self::Storage(_) => 500,
        }
    }

    /// Shorthand for a missing tenant.
    #[must_use]
    pub fn tenant_not_found() -> Self {
        Self::NotFound("Tenant not found".to_string())
    }
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(GatewayError::Validation("x".into()).status_code(), 400);
        assert_eq!(GatewayError::tenant_not_found().status_code(), 404);
        assert_eq!(
            GatewayError::MethodNotAllowed("x".into()).status_code(),
            405
        );
        assert_eq!(
            GatewayError::SandboxExecution("x".into()).status_code(),
            500
        );
        assert_eq!(GatewayError::Storage("x".into()).status_code(), 500);
    }

    #[test]
    fn display_hides_internals() {
        let err = GatewayError::SandboxExecution("boom".into());
        assert_eq!(err.to_string(), "handler execution failed: boom");
    }
}
