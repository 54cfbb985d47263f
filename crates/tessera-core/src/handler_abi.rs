//! Payload types shared between the host and WASM handler guests.
//!
//! Everything crossing the sandbox boundary is JSON: the request
//! descriptor goes in, a [`HandlerResponse`] comes out, and the host
//! functions exchange these payloads. Guests link against the same
//! definitions through their SDK.

use serde::{Deserialize, Serialize};

/// Severity accepted by the logging capability.
///
/// Two levels only; anything unrecognized is treated as `Info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Informational output.
    Info,
    /// Error output.
    Error,
}

/// A single header pair on a fetch request or response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyValuePair {
    /// Header name.
    pub key: String,
    /// Header value.
    pub value: String,
}

/// Outbound HTTP request issued through the fetch capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRequest {
    /// HTTP method.
    pub method: String,
    /// Target URL.
    pub url: String,
    /// Request headers.
    #[serde(default)]
    pub headers: Vec<KeyValuePair>,
    /// Optional request body.
    #[serde(default)]
    pub body: Option<String>,
}

/// Normalized descriptor returned by the fetch capability.
///
/// The body is handed over as raw text; the guest SDK layers deferred
/// `json()` / `text()` readers on top of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResponse {
    /// Upstream status code.
    pub status: u16,
    /// Raw response body.
    pub body: String,
}

/// The structured response a handler constructs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerResponse {
    /// HTTP status code for the gateway response.
    #[serde(default = "default_status")]
    pub status: u16,
    /// JSON body of the response.
    pub body: serde_json::Value,
}

fn default_status() -> u16 {
    200
}

impl HandlerResponse {
    /// A 200 response wrapping the given body.
    #[must_use]
    pub fn ok(body: serde_json::Value) -> Self {
        Self { status: 200, body }
    }

    /// The synthesized acknowledgement used when a handler produces no
    /// explicit response.
    #[must_use]
    pub fn acknowledgement(tenant: &crate::types::TenantId) -> Self {
        Self::ok(serde_json::json!({
            "success": true,
            "executed": true,
            "tenant": tenant.as_str(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TenantId;

    #[test]
    fn status_defaults_to_200() {
        let resp: HandlerResponse = serde_json::from_str(r#"{"body": {"message": "hi"}}"#).unwrap();
        assert_eq!(resp.status, 200);
    }

    #[test]
    fn acknowledgement_names_the_tenant() {
        let tenant = TenantId::new("acme").unwrap();
        let ack = HandlerResponse::acknowledgement(&tenant);
        assert_eq!(ack.status, 200);
        assert_eq!(ack.body["tenant"], "acme");
        assert_eq!(ack.body["executed"], true);
    }

    #[test]
    fn log_level_parses_lowercase() {
        let level: LogLevel = serde_json::from_str("\"error\"").unwrap();
        assert_eq!(level, LogLevel::Error);
    }

    #[test]
    fn fetch_request_defaults() {
        let req: FetchRequest =
            serde_json::from_str(r#"{"method": "GET", "url": "https://example.com"}"#).unwrap();
        assert!(req.headers.is_empty());
        assert!(req.body.is_none());
    }
}
