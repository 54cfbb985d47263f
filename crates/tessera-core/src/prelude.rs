//! Convenience re-exports for downstream crates.

pub use crate::MAX_HANDLER_BYTES;
pub use crate::error::{GatewayError, GatewayResult};
pub use crate::handler_abi::{FetchRequest, FetchResponse, HandlerResponse, KeyValuePair, LogLevel};
pub use crate::request::RequestDescriptor;
pub use crate::types::{EndpointName, FileId, TenantId, Timestamp};
