//! Sandbox error types.

use tessera_core::GatewayError;
use thiserror::Error;

/// Errors raised while preparing an execution.
///
/// Failures *of* tenant code are not errors; they are
/// [`SandboxOutcome`](crate::SandboxOutcome) variants. This type covers
/// the host's own failures around the run.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The module failed to parse or instantiate.
    #[error("module compilation failed: {0}")]
    Compile(String),

    /// A context handle could not be constructed.
    #[error("context construction failed: {0}")]
    Context(String),

    /// The request descriptor could not be serialized for the guest.
    #[error("request encoding failed: {0}")]
    Encoding(String),
}

impl From<SandboxError> for GatewayError {
    fn from(err: SandboxError) -> Self {
        GatewayError::SandboxExecution(err.to_string())
    }
}

/// Result type for sandbox host operations.
pub type SandboxResult<T> = Result<T, SandboxError>;
