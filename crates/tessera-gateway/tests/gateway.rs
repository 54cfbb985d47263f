//! Surface tests for the gateway router.
//!
//! The sandbox is scripted here (the `Sandbox` trait seam): these tests
//! exercise routing, the dispatcher, both storage tiers and the audit
//! path end to end, without needing a compiled guest module.

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};
use tower::ServiceExt as _;

use tessera_audit::{AuditEmitter, MemoryAuditSink};
use tessera_core::HandlerResponse;
use tessera_files::FileStore;
use tessera_gateway::{AppState, Dispatcher, build_router};
use tessera_registry::TenantRegistry;
use tessera_sandbox::{CapabilityContext, ContextBuilder, Sandbox, SandboxOutcome};
use tessera_storage::{Database, MemoryKvStore, MemoryObjectStore};
use tessera_workers::WorkerStore;

/// Sandbox that answers every run with `{"message": "hi"}`.
struct GreetingSandbox;

#[async_trait]
impl Sandbox for GreetingSandbox {
    async fn run(&self, _module: &[u8], _ctx: CapabilityContext) -> SandboxOutcome {
        SandboxOutcome::Completed(HandlerResponse::ok(json!({ "message": "hi" })))
    }
}

async fn test_app() -> (Router, Arc<MemoryAuditSink>) {
    let db = Database::connect_memory().await.expect("memory db");
    let registry = TenantRegistry::new(db.clone());
    let cache = Arc::new(MemoryKvStore::new());
    let workers = WorkerStore::new(db.clone(), cache.clone(), registry.clone());
    let files = FileStore::new(db, Arc::new(MemoryObjectStore::new()), registry.clone());
    let contexts = ContextBuilder::new(cache, Arc::new(MemoryKvStore::new()), files.clone());
    let sink = Arc::new(MemoryAuditSink::new());
    let dispatcher = Dispatcher::new(
        registry.clone(),
        workers.clone(),
        contexts,
        Arc::new(GreetingSandbox),
        AuditEmitter::new(sink.clone()),
        true,
    );
    let state = Arc::new(AppState {
        registry,
        workers,
        files,
        dispatcher,
    });
    (build_router(state), sink)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("infallible");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body).expect("encode")))
        .expect("request")
}

async fn create_tenant(app: &Router, id: &str) {
    let (status, body) = send(
        app,
        post_json(
            "/admin/api/create-tenant",
            &json!({ "tenantId": id, "name": id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "create-tenant failed: {body}");
}

async fn deploy(app: &Router, tenant: &str, endpoint: &str, module: &[u8]) -> (StatusCode, Value) {
    send(
        app,
        post_json(
            "/admin/api/deploy",
            &json!({
                "tenantId": tenant,
                "endpoint": endpoint,
                "code": BASE64.encode(module),
            }),
        ),
    )
    .await
}

#[tokio::test]
async fn health_is_ok() {
    let (app, _) = test_app().await;
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn end_to_end_tenant_path() {
    let (app, _) = test_app().await;
    create_tenant(&app, "acme").await;

    let (status, _) = deploy(&app, "acme", "greet", b"module-bytes").await;
    assert_eq!(status, StatusCode::OK);

    // Deployed endpoint runs the handler.
    let (status, body) = send(&app, get("/api/acme/greet")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "hi");

    // Unconfigured endpoint is a success-path message, not an error.
    let (status, body) = send(&app, get("/api/acme/unknown")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Endpoint unknown not configured");

    // Unknown tenant is a 404.
    let (status, body) = send(&app, get("/api/ghost/greet")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Tenant not found");
}

#[tokio::test]
async fn audit_entries_are_emitted_per_request() {
    let (app, sink) = test_app().await;
    create_tenant(&app, "acme").await;
    deploy(&app, "acme", "greet", b"m").await;

    send(&app, get("/api/acme/greet")).await;
    send(&app, get("/api/ghost/greet")).await;

    for _ in 0..100 {
        if sink.entries().len() >= 2 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }
    let entries = sink.entries();
    assert_eq!(entries.len(), 2);
    let statuses: Vec<u16> = entries.iter().map(|e| e.status_code).collect();
    assert!(statuses.contains(&200));
    assert!(statuses.contains(&404));
}

#[tokio::test]
async fn deploy_validates_before_any_write() {
    let (app, _) = test_app().await;
    create_tenant(&app, "acme").await;

    // Exactly at the bound: accepted.
    let at_limit = vec![0u8; tessera_core::MAX_HANDLER_BYTES];
    let (status, _) = deploy(&app, "acme", "big", &at_limit).await;
    assert_eq!(status, StatusCode::OK);

    // One byte over: rejected, and the endpoint stays unconfigured.
    let over = vec![0u8; tessera_core::MAX_HANDLER_BYTES + 1];
    let (status, body) = deploy(&app, "acme", "too-big", &over).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().is_some());

    let (status, body) = send(&app, get("/api/acme/too-big")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Endpoint too-big not configured");
}

#[tokio::test]
async fn deploy_requires_fields_method_and_tenant() {
    let (app, _) = test_app().await;

    let (status, body) = send(
        &app,
        post_json("/admin/api/deploy", &json!({ "tenantId": "acme" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing required fields");

    let (status, body) = send(&app, get("/admin/api/deploy")).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["error"], "Method not allowed");

    let (status, _) = deploy(&app, "ghost", "greet", b"m").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn workers_listing_reports_deployed_endpoints() {
    let (app, _) = test_app().await;
    create_tenant(&app, "acme").await;
    deploy(&app, "acme", "greet", b"m").await;

    let (status, body) = send(&app, get("/admin/api/workers?tenantId=acme")).await;
    assert_eq!(status, StatusCode::OK);
    let workers = body["workers"].as_array().expect("workers array");
    assert_eq!(workers.len(), 1);
    assert_eq!(workers[0]["endpoint"], "greet");
}

fn multipart_upload(uri: &str, file_name: &str, content: &str) -> Request<Body> {
    let boundary = "tessera-test-boundary";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
         Content-Type: text/plain\r\n\r\n\
         {content}\r\n\
         --{boundary}--\r\n"
    );
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .expect("request")
}

#[tokio::test]
async fn storage_upload_download_list_delete() {
    let (app, _) = test_app().await;
    create_tenant(&app, "acme").await;

    let (status, body) = send(
        &app,
        multipart_upload("/storage/acme/upload", "notes.txt", "remember the milk"),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "upload failed: {body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Uploaded 1 file(s)");
    let key = body["files"][0]["key"].as_str().expect("storage key").to_string();

    // Download returns the raw payload with the stored content type.
    let response = app
        .clone()
        .oneshot(get(&format!("/storage/acme/download/{key}")))
        .await
        .expect("infallible");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
        Some("text/plain")
    );
    assert_eq!(
        response
            .headers()
            .get(header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok()),
        Some("public, max-age=3600")
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(bytes.as_ref(), b"remember the milk");

    // Listed for the owner.
    let (status, body) = send(&app, get("/storage/acme/list")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["files"][0]["key"], key);

    // Wrong method on delete is a 405.
    let (status, body) = send(&app, get("/storage/acme/delete")).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["error"], "Method not allowed");

    // Delete, then the artifact is gone from both views.
    let request = Request::builder()
        .method("DELETE")
        .uri("/storage/acme/delete")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::to_vec(&json!({ "fileKey": key })).expect("encode"),
        ))
        .expect("request");
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK, "delete failed: {body}");

    let (status, _) = send(&app, get(&format!("/storage/acme/download/{key}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, body) = send(&app, get("/storage/acme/list")).await;
    assert_eq!(body["pagination"]["total"], 0);
}

#[tokio::test]
async fn storage_isolation_between_tenants() {
    let (app, _) = test_app().await;
    create_tenant(&app, "acme").await;
    create_tenant(&app, "globex").await;

    let (_, body) = send(
        &app,
        multipart_upload("/storage/acme/upload", "secret.txt", "acme eyes only"),
    )
    .await;
    let key = body["files"][0]["key"].as_str().expect("storage key").to_string();

    // Tenant B requesting tenant A's key learns nothing.
    let (status, body) = send(&app, get(&format!("/storage/globex/download/{key}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "File not found or access denied");
}

#[tokio::test]
async fn storage_upload_requires_multipart_and_tenant() {
    let (app, _) = test_app().await;
    create_tenant(&app, "acme").await;

    let (status, body) = send(
        &app,
        post_json("/storage/acme/upload", &json!({ "not": "multipart" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Only multipart/form-data supported");

    let (status, _) = send(
        &app,
        multipart_upload("/storage/ghost/upload", "a.txt", "x"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_requires_a_file_key() {
    let (app, _) = test_app().await;
    create_tenant(&app, "acme").await;

    let request = Request::builder()
        .method("DELETE")
        .uri("/storage/acme/delete")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .expect("request");
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "File key required");
}

#[tokio::test]
async fn unknown_paths_fall_back_to_404() {
    let (app, _) = test_app().await;
    let (status, body) = send(&app, get("/nope/nothing/here")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not found");
}
