//! Audit error types.

use thiserror::Error;

/// Errors from audit sink operations.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The backing store rejected the append.
    #[error("audit storage error: {0}")]
    Storage(String),
}

/// Result type for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;
