//! Tenant file routes: `/storage/:tenant_id/{upload,download,list,delete}`.

use std::sync::Arc;

use axum::Router;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use serde::Deserialize;
use serde_json::{Value, json};

use tessera_core::{GatewayError, TenantId};
use tessera_files::FileArtifact;

use crate::AppState;
use crate::response::{error_response, json_response};
use crate::routes::method_not_allowed;

/// Default page size for listings.
const DEFAULT_LIMIT: usize = 50;

/// Hard ceiling on a requested page size.
const MAX_LIMIT: usize = 1000;

/// Tenant file routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/:tenant_id/upload",
            post(upload).fallback(method_not_allowed),
        )
        .route("/:tenant_id/download/*key", get(download))
        .route("/:tenant_id/list", get(list))
        .route(
            "/:tenant_id/delete",
            delete(delete_file).fallback(method_not_allowed),
        )
}

fn parse_tenant(tenant_id: String) -> Result<TenantId, Response> {
    TenantId::new(tenant_id)
        .map_err(|_| json_response(404, json!({ "error": "Tenant not found" })))
}

/// Render an artifact the way the listing and upload responses share it.
fn artifact_json(artifact: &FileArtifact) -> Value {
    json!({
        "id": artifact.file_id,
        "name": artifact.name,
        "key": artifact.storage_key,
        "size": artifact.size,
        "type": artifact.content_type,
        "uploadedAt": artifact.uploaded_at,
        "url": format!("/storage/{}/download/{}", artifact.tenant_id, artifact.storage_key),
    })
}

async fn upload(
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<String>,
    multipart: Result<Multipart, axum::extract::multipart::MultipartRejection>,
) -> Response {
    let tenant = match parse_tenant(tenant_id) {
        Ok(tenant) => tenant,
        Err(response) => return response,
    };
    match state.registry.exists(&tenant).await {
        Ok(true) => {},
        Ok(false) => return json_response(404, json!({ "error": "Tenant not found" })),
        Err(e) => return error_response(&GatewayError::from(e)),
    }
    let mut multipart = match multipart {
        Ok(multipart) => multipart,
        Err(_) => {
            return json_response(400, json!({ "error": "Only multipart/form-data supported" }));
        },
    };

    let mut uploaded = Vec::new();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return json_response(400, json!({ "error": e.to_string() })),
        };
        // Only file fields carry a file name; plain form values are skipped.
        let Some(name) = field.file_name().map(ToString::to_string) else {
            continue;
        };
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = match field.bytes().await {
            Ok(data) => data,
            Err(e) => return json_response(400, json!({ "error": e.to_string() })),
        };

        match state.files.upload(&tenant, &name, &content_type, data).await {
            Ok(artifact) => uploaded.push(artifact_json(&artifact)),
            Err(e) => return error_response(&GatewayError::from(e)),
        }
    }

    json_response(
        200,
        json!({
            "success": true,
            "message": format!("Uploaded {} file(s)", uploaded.len()),
            "files": uploaded,
        }),
    )
}

async fn download(
    State(state): State<Arc<AppState>>,
    Path((tenant_id, key)): Path<(String, String)>,
) -> Response {
    let tenant = match parse_tenant(tenant_id) {
        Ok(tenant) => tenant,
        Err(response) => return response,
    };

    match state.files.download(&tenant, &key).await {
        Ok(Some((artifact, object))) => (
            [
                (header::CONTENT_TYPE, object.content_type),
                (
                    header::CONTENT_DISPOSITION,
                    format!("inline; filename=\"{}\"", artifact.name),
                ),
                (header::CACHE_CONTROL, "public, max-age=3600".to_string()),
            ],
            object.data,
        )
            .into_response(),
        Ok(None) => json_response(404, json!({ "error": "File not found or access denied" })),
        Err(e) => error_response(&GatewayError::from(e)),
    }
}

#[derive(Debug, Deserialize)]
struct ListParams {
    limit: Option<usize>,
    offset: Option<usize>,
}

async fn list(
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<String>,
    Query(params): Query<ListParams>,
) -> Response {
    let tenant = match parse_tenant(tenant_id) {
        Ok(tenant) => tenant,
        Err(response) => return response,
    };
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0);

    match state.files.list(&tenant, limit, offset).await {
        Ok(page) => {
            let files: Vec<Value> = page.files.iter().map(artifact_json).collect();
            json_response(
                200,
                json!({
                    "files": files,
                    "pagination": {
                        "total": page.total,
                        "limit": page.limit,
                        "offset": page.offset,
                        "hasMore": page.has_more,
                    },
                }),
            )
        },
        Err(e) => error_response(&GatewayError::from(e)),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteBody {
    file_key: Option<String>,
}

async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<String>,
    body: Result<axum::Json<DeleteBody>, axum::extract::rejection::JsonRejection>,
) -> Response {
    let tenant = match parse_tenant(tenant_id) {
        Ok(tenant) => tenant,
        Err(response) => return response,
    };
    let Ok(axum::Json(DeleteBody {
        file_key: Some(file_key),
    })) = body
    else {
        return json_response(400, json!({ "error": "File key required" }));
    };

    match state.files.delete(&tenant, &file_key).await {
        Ok(true) => json_response(
            200,
            json!({ "success": true, "message": "File deleted successfully" }),
        ),
        Ok(false) => json_response(404, json!({ "error": "File not found or access denied" })),
        Err(e) => error_response(&GatewayError::from(e)),
    }
}
