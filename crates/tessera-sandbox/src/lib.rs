//! Tessera Sandbox - capability-scoped execution of tenant handlers.
//!
//! A handler run moves through `Idle → Compiling → Running` and ends in
//! exactly one of `Completed`, `Failed` or `TimedOut`. Compiling is WASM
//! module instantiation; Running executes the guest `handle` export with
//! the [`CapabilityContext`] as its sole input. Whatever the tenant code
//! does, the boundary holds: errors come back as a message, never a
//! panic, never a stack trace.
//!
//! The production implementation is [`WasmSandbox`] (Extism/wasmtime VM,
//! WASI disabled, linear memory capped, wall-clock budget enforced by the
//! VM's epoch deadline plus a host-side timeout and cancel handle). The
//! [`Sandbox`] trait is the seam: the dispatcher only knows the trait, so
//! surface tests drive it with a scripted implementation.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod context;
mod error;
mod host;
mod wasm;

pub use context::{CapabilityContext, ContextBuilder};
pub use error::{SandboxError, SandboxResult};
pub use wasm::{SandboxLimits, WasmSandbox};

use async_trait::async_trait;
use tessera_core::HandlerResponse;

/// Lifecycle states of one handler execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    /// No execution started yet.
    Idle,
    /// The module is being parsed and instantiated.
    Compiling,
    /// The guest `handle` export is running.
    Running,
    /// Terminal: the handler produced (or defaulted to) a response.
    Completed,
    /// Terminal: compilation or execution failed.
    Failed,
    /// Terminal: the wall-clock budget was exceeded.
    TimedOut,
}

/// Terminal result of one handler execution.
#[derive(Debug)]
pub enum SandboxOutcome {
    /// The handler completed; response passes through unchanged.
    Completed(HandlerResponse),
    /// The handler failed to compile or threw. Message only.
    Failed {
        /// Failure description, safe to surface.
        message: String,
    },
    /// The execution budget was exhausted.
    TimedOut {
        /// The budget that was exceeded, in milliseconds.
        budget_ms: u64,
    },
}

impl SandboxOutcome {
    /// The terminal state this outcome represents.
    #[must_use]
    pub fn state(&self) -> ExecutionState {
        match self {
            Self::Completed(_) => ExecutionState::Completed,
            Self::Failed { .. } => ExecutionState::Failed,
            Self::TimedOut { .. } => ExecutionState::TimedOut,
        }
    }
}

/// Executes one tenant handler against one built context.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Run `module` with `ctx` as its only input.
    ///
    /// Never returns an error: every failure mode is a terminal
    /// [`SandboxOutcome`] variant.
    async fn run(&self, module: &[u8], ctx: CapabilityContext) -> SandboxOutcome;
}
