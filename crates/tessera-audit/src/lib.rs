//! Tessera Audit - append-only record of request outcomes.
//!
//! The dispatcher emits exactly one [`AuditEntry`] per tenant request,
//! whatever the outcome. The sink is strictly best-effort: an append
//! failure is logged internally and never reaches the request path, and
//! nothing in the gateway ever reads the log back.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod entry;
mod error;
mod sink;

pub use entry::AuditEntry;
pub use error::{AuditError, AuditResult};
pub use sink::{AuditEmitter, AuditSink, DbAuditSink, MemoryAuditSink};
