//! Tessera Gateway - the HTTP surface and request dispatcher.
//!
//! Routes:
//! - `GET|POST /api/:tenant_id/:endpoint`: invoke a tenant handler
//! - `POST /storage/:tenant_id/upload`: multipart file upload
//! - `GET /storage/:tenant_id/download/*key`: gated download
//! - `GET /storage/:tenant_id/list`: metadata page
//! - `DELETE /storage/:tenant_id/delete`: gated delete
//! - `POST /admin/api/deploy`, `GET /admin/api/workers`,
//!   `POST /admin/api/create-tenant`: thin admin shims
//!
//! Every JSON response shares the `{success?, message?, error?}` envelope
//! and permissive cross-origin headers.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod dispatch;
pub mod response;
pub mod routes;

pub use dispatch::{DispatchOutcome, Dispatcher};

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use tessera_files::FileStore;
use tessera_registry::TenantRegistry;
use tessera_workers::WorkerStore;

/// Shared state behind every route handler.
#[derive(Clone)]
pub struct AppState {
    /// Tenant registry.
    pub registry: TenantRegistry,
    /// Code distribution store.
    pub workers: WorkerStore,
    /// Tenant file store.
    pub files: FileStore,
    /// Request dispatcher for the tenant path.
    pub dispatcher: Dispatcher,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}

/// Build the gateway router.
#[must_use]
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api", routes::api::router())
        .nest("/storage", routes::storage::router())
        .nest("/admin/api", routes::admin::router())
        .fallback(routes::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> axum::response::Response {
    response::json_response(200, serde_json::json!({"success": true, "status": "ok"}))
}
