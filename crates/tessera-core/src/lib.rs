//! Tessera Core - Foundation types for the multi-tenant endpoint gateway.
//!
//! This crate provides:
//! - The shared error taxonomy and HTTP status mapping
//! - Tenant, endpoint and file identifiers with validation
//! - The read-only inbound request descriptor handed to handlers
//! - Handler ABI payload types shared between host and guest
//! - Common types used throughout the gateway

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod error;
pub mod handler_abi;
pub mod request;
pub mod types;

pub use error::{GatewayError, GatewayResult};
pub use handler_abi::{FetchRequest, FetchResponse, HandlerResponse, KeyValuePair, LogLevel};
pub use request::RequestDescriptor;
pub use types::{EndpointName, FileId, TenantId, Timestamp};

/// Upper bound on a deployed handler module, in bytes.
///
/// Enforced before any durable or cache write; a 50,001-byte module is
/// rejected with [`GatewayError::Validation`] and produces no side effect.
pub const MAX_HANDLER_BYTES: usize = 50_000;
