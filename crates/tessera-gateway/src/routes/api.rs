//! The tenant invocation path: `GET|POST /api/:tenant_id/:endpoint`.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, Uri};
use axum::response::Response;
use axum::routing::get;
use serde_json::json;

use tessera_core::{EndpointName, RequestDescriptor, TenantId};

use crate::AppState;
use crate::response::json_response;

/// Tenant invocation routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:tenant_id", get(invoke_default).post(invoke_default))
        .route("/:tenant_id/:endpoint", get(invoke).post(invoke))
}

async fn invoke_default(
    state: State<Arc<AppState>>,
    Path(tenant_id): Path<String>,
    method: Method,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    dispatch(state, tenant_id, "default".to_string(), method, headers, uri).await
}

async fn invoke(
    state: State<Arc<AppState>>,
    Path((tenant_id, endpoint)): Path<(String, String)>,
    method: Method,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    dispatch(state, tenant_id, endpoint, method, headers, uri).await
}

async fn dispatch(
    State(state): State<Arc<AppState>>,
    tenant_id: String,
    endpoint: String,
    method: Method,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    // An identifier that fails validation cannot name an existing tenant.
    let Ok(tenant_id) = TenantId::new(tenant_id) else {
        return json_response(404, json!({ "error": "Tenant not found" }));
    };
    let Ok(endpoint) = EndpointName::new(endpoint) else {
        return json_response(400, json!({ "error": "Invalid endpoint name" }));
    };

    let header_map: BTreeMap<String, String> = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    let descriptor = RequestDescriptor::new(
        tenant_id,
        endpoint,
        method.as_str(),
        header_map,
        uri.to_string(),
    );

    let outcome = state.dispatcher.dispatch(descriptor).await;
    json_response(outcome.status, outcome.body)
}
