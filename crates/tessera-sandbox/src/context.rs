//! Capability context assembly.
//!
//! Exactly five things exist inside the boundary, built fresh per
//! invocation:
//!
//! 1. a tenant-tagged logging capability (two severities);
//! 2. the outbound fetch capability;
//! 3. tenant-scoped data handles: cache tier, durable data namespace,
//!    and a metadata-gated file read;
//! 4. the read-only request descriptor;
//! 5. the response contract (`{status, body}` out, or nothing).
//!
//! Nothing else (no ambient filesystem, process, cross-tenant handle,
//! no raw connection) is reachable from guest code. Contexts are never
//! shared between invocations.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tessera_core::{EndpointName, RequestDescriptor, TenantId};
use tessera_files::FileStore;
use tessera_storage::{KvStore, ScopedKvStore};

use crate::error::{SandboxError, SandboxResult};

/// Cache-tier namespace prefix for tenant handler data.
const CACHE_DATA_PREFIX: &str = "tenant-cache";

/// Durable-tier namespace prefix for tenant handler data.
const DURABLE_DATA_PREFIX: &str = "tenant-data";

/// The restricted execution context for one handler invocation.
pub struct CapabilityContext {
    /// Tenant this context is scoped to. Tags every log line.
    pub tenant_id: TenantId,
    /// Endpoint being invoked.
    pub endpoint: EndpointName,
    /// Read-only descriptor of the inbound request.
    pub request: RequestDescriptor,
    /// Tenant-scoped view of the cache tier.
    pub cache: ScopedKvStore,
    /// Tenant-scoped view of the durable data namespace.
    pub data: ScopedKvStore,
    /// File access, gated per call on the tenant's metadata rows.
    pub files: FileStore,
    /// Outbound HTTP client for the fetch capability.
    pub http: reqwest::Client,
    /// Set once the execution budget expires; every capability call
    /// checks it and refuses to produce further effects.
    pub cancelled: Arc<AtomicBool>,
}

impl std::fmt::Debug for CapabilityContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityContext")
            .field("tenant_id", &self.tenant_id)
            .field("endpoint", &self.endpoint)
            .field("cache_ns", &self.cache.namespace())
            .field("data_ns", &self.data.namespace())
            .finish_non_exhaustive()
    }
}

/// Builds one [`CapabilityContext`] per invocation.
///
/// The builder holds the shared backends; everything it hands out is a
/// tenant-confined view constructed at build time.
#[derive(Clone)]
pub struct ContextBuilder {
    cache: Arc<dyn KvStore>,
    data: Arc<dyn KvStore>,
    files: FileStore,
    http: reqwest::Client,
}

impl ContextBuilder {
    /// Create a builder over the shared backends.
    ///
    /// `cache` is the cache tier; `data` is the durable per-tenant data
    /// store (a [`tessera_storage::DbKvStore`] in production).
    #[must_use]
    pub fn new(cache: Arc<dyn KvStore>, data: Arc<dyn KvStore>, files: FileStore) -> Self {
        Self {
            cache,
            data,
            files,
            http: reqwest::Client::new(),
        }
    }

    /// Assemble the context for one invocation.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::Context`] if a scoped handle cannot be
    /// constructed.
    pub fn build(&self, request: RequestDescriptor) -> SandboxResult<CapabilityContext> {
        let tenant_id = request.tenant_id.clone();
        let endpoint = request.endpoint.clone();

        let cache = ScopedKvStore::new(
            Arc::clone(&self.cache),
            format!("{CACHE_DATA_PREFIX}:{tenant_id}"),
        )
        .map_err(|e| SandboxError::Context(e.to_string()))?;
        let data = ScopedKvStore::new(
            Arc::clone(&self.data),
            format!("{DURABLE_DATA_PREFIX}:{tenant_id}"),
        )
        .map_err(|e| SandboxError::Context(e.to_string()))?;

        Ok(CapabilityContext {
            tenant_id,
            endpoint,
            request,
            cache,
            data,
            files: self.files.clone(),
            http: self.http.clone(),
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }
}

impl std::fmt::Debug for ContextBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextBuilder").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tessera_registry::TenantRegistry;
    use tessera_storage::{Database, MemoryKvStore, MemoryObjectStore};

    async fn builder() -> ContextBuilder {
        let db = Database::connect_memory().await.unwrap();
        let registry = TenantRegistry::new(db.clone());
        let files = FileStore::new(db, Arc::new(MemoryObjectStore::new()), registry);
        ContextBuilder::new(
            Arc::new(MemoryKvStore::new()),
            Arc::new(MemoryKvStore::new()),
            files,
        )
    }

    fn request(tenant: &str) -> RequestDescriptor {
        RequestDescriptor::new(
            TenantId::new(tenant).unwrap(),
            EndpointName::new("greet").unwrap(),
            "GET",
            BTreeMap::new(),
            format!("http://localhost/api/{tenant}/greet"),
        )
    }

    #[tokio::test]
    async fn handles_are_tenant_scoped() {
        let builder = builder().await;
        let ctx = builder.build(request("acme")).unwrap();
        assert_eq!(ctx.cache.namespace(), "tenant-cache:acme");
        assert_eq!(ctx.data.namespace(), "tenant-data:acme");
    }

    #[tokio::test]
    async fn contexts_do_not_share_state() {
        let builder = builder().await;
        let a = builder.build(request("acme")).unwrap();
        let b = builder.build(request("globex")).unwrap();

        a.cache.set("color", b"red".to_vec()).await.unwrap();
        assert_eq!(b.cache.get("color").await.unwrap(), None);

        // Each invocation gets its own cancellation flag.
        a.cancelled.store(true, std::sync::atomic::Ordering::SeqCst);
        assert!(!b.cancelled.load(std::sync::atomic::Ordering::SeqCst));
    }
}
