//! Tessera gateway binary.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use tracing_subscriber::EnvFilter;

use tessera_audit::{AuditEmitter, DbAuditSink};
use tessera_config::Config;
use tessera_files::FileStore;
use tessera_gateway::{AppState, Dispatcher, build_router};
use tessera_registry::TenantRegistry;
use tessera_sandbox::{ContextBuilder, SandboxLimits, WasmSandbox};
use tessera_storage::{Database, DbKvStore, FsObjectStore, MemoryKvStore};
use tessera_workers::WorkerStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Optional config file: first CLI argument, else ./tessera.toml if present.
    let config_path = std::env::args().nth(1).map(PathBuf::from).or_else(|| {
        let default = PathBuf::from("tessera.toml");
        default.exists().then_some(default)
    });
    let config =
        Config::load(config_path.as_deref()).context("failed to load configuration")?;

    let db = Database::connect_embedded(&config.storage.data_dir)
        .await
        .context("failed to open the durable tier")?;
    let objects =
        Arc::new(FsObjectStore::open(&config.storage.object_root).context("object store")?);
    let cache = Arc::new(MemoryKvStore::new());

    let registry = TenantRegistry::new(db.clone());
    let workers = WorkerStore::new(db.clone(), cache.clone(), registry.clone());
    let files = FileStore::new(db.clone(), objects, registry.clone());

    let contexts = ContextBuilder::new(
        cache,
        Arc::new(DbKvStore::new(db.clone())),
        files.clone(),
    );
    let sandbox = Arc::new(WasmSandbox::new(SandboxLimits {
        execution_budget: Duration::from_millis(config.sandbox.execution_budget_ms),
        max_memory_bytes: config.sandbox.max_memory_bytes,
    }));
    let audit = AuditEmitter::new(Arc::new(DbAuditSink::new(db)));
    let dispatcher = Dispatcher::new(
        registry.clone(),
        workers.clone(),
        contexts,
        sandbox,
        audit,
        config.audit.enabled,
    );

    let state = Arc::new(AppState {
        registry,
        workers,
        files,
        dispatcher,
    });
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind_addr))?;
    tracing::info!(addr = %config.server.bind_addr, "tessera gateway listening");
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
