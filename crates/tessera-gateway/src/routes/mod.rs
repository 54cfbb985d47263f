//! Route modules for the gateway surface.

pub mod admin;
pub mod api;
pub mod storage;

use axum::response::Response;
use serde_json::json;

use crate::response::json_response;

/// Fallback for unmatched paths.
pub async fn not_found() -> Response {
    json_response(404, json!({ "error": "Not found" }))
}

/// Shared 405 handler for routes that accept a single method.
pub(crate) async fn method_not_allowed() -> Response {
    json_response(405, json!({ "error": "Method not allowed" }))
}
