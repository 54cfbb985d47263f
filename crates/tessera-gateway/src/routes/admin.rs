//! Thin admin shims: deploy, list workers, create tenant.
//!
//! Administration logic stays outside the core; these handlers only
//! validate transport-level input and delegate to the registry and the
//! code distribution store.

use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::response::Response;
use axum::routing::{get, post};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::json;

use tessera_core::{EndpointName, GatewayError, TenantId};

use crate::AppState;
use crate::response::{error_response, json_response};
use crate::routes::method_not_allowed;

/// Admin routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/deploy", post(deploy).fallback(method_not_allowed))
        .route("/workers", get(workers))
        .route(
            "/create-tenant",
            post(create_tenant).fallback(method_not_allowed),
        )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeployBody {
    tenant_id: Option<String>,
    endpoint: Option<String>,
    /// Base64-encoded WASM handler module.
    code: Option<String>,
}

async fn deploy(
    State(state): State<Arc<AppState>>,
    body: Result<axum::Json<DeployBody>, axum::extract::rejection::JsonRejection>,
) -> Response {
    let Ok(axum::Json(body)) = body else {
        return json_response(400, json!({ "error": "Invalid JSON body" }));
    };
    let (Some(tenant_id), Some(endpoint), Some(code)) =
        (body.tenant_id, body.endpoint, body.code)
    else {
        return json_response(400, json!({ "error": "Missing required fields" }));
    };

    let Ok(tenant) = TenantId::new(tenant_id) else {
        return json_response(400, json!({ "error": "Invalid tenant id" }));
    };
    let Ok(endpoint) = EndpointName::new(endpoint) else {
        return json_response(400, json!({ "error": "Invalid endpoint name" }));
    };
    let Ok(module) = BASE64.decode(code.as_bytes()) else {
        return json_response(400, json!({ "error": "code must be base64-encoded WASM" }));
    };

    match state.workers.deploy(&tenant, &endpoint, module).await {
        Ok(deployed) => json_response(
            200,
            json!({
                "success": true,
                "message": format!("Worker deployed: {endpoint}"),
                "contentHash": deployed.content_hash,
                "size": deployed.size,
            }),
        ),
        Err(e) => error_response(&GatewayError::from(e)),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkersParams {
    tenant_id: Option<String>,
}

async fn workers(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WorkersParams>,
) -> Response {
    let tenant_id = params.tenant_id.unwrap_or_else(|| "demo".to_string());
    let Ok(tenant) = TenantId::new(tenant_id) else {
        return json_response(400, json!({ "error": "Invalid tenant id" }));
    };

    match state.workers.list(&tenant).await {
        Ok(listed) => json_response(200, json!({ "workers": listed })),
        Err(e) => error_response(&GatewayError::from(e)),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTenantBody {
    tenant_id: Option<String>,
    name: Option<String>,
}

async fn create_tenant(
    State(state): State<Arc<AppState>>,
    body: Result<axum::Json<CreateTenantBody>, axum::extract::rejection::JsonRejection>,
) -> Response {
    let Ok(axum::Json(body)) = body else {
        return json_response(400, json!({ "error": "Invalid JSON body" }));
    };
    let (Some(tenant_id), Some(name)) = (body.tenant_id, body.name) else {
        return json_response(400, json!({ "error": "Missing required fields" }));
    };
    let Ok(tenant) = TenantId::new(tenant_id) else {
        return json_response(400, json!({ "error": "Invalid tenant id" }));
    };

    match state.registry.create(tenant.clone(), name).await {
        Ok(_) => json_response(
            200,
            json!({ "success": true, "message": format!("Tenant created: {tenant}") }),
        ),
        Err(e) => error_response(&GatewayError::from(e)),
    }
}
