//! The shared JSON response envelope.
//!
//! All responses are JSON with the `{success?, message?, error?}` shape
//! on top of route-specific payload fields. Failures always carry an
//! `error` field and never a stack trace.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};

use tessera_core::GatewayError;

/// Build a JSON response with an explicit status code.
#[must_use]
pub fn json_response(status: u16, body: Value) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(body)).into_response()
}

/// Build the standard error response for a [`GatewayError`].
#[must_use]
pub fn error_response(err: &GatewayError) -> Response {
    json_response(err.status_code(), json!({ "error": err.to_string() }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_status_degrades_to_500() {
        let response = json_response(9000, json!({}));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn error_response_carries_the_error_field() {
        let response = error_response(&GatewayError::tenant_not_found());
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
