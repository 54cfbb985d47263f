//! Tessera Workers - the code distribution store.
//!
//! Handler modules live in two tiers: the durable tier (source of truth)
//! and a cache tier keyed `worker:{tenant}:{endpoint}` (performance-only
//! derivative). [`WorkerStore::deploy`] writes durable-first and treats a
//! cache failure as a logged non-event; [`WorkerStore::lookup`] is
//! cache-aside with repopulation. Any lookup issued after a deploy on the
//! same key returns the new module, cold cache included.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;

pub use error::{WorkerStoreError, WorkerStoreResult};

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use tessera_core::{EndpointName, MAX_HANDLER_BYTES, TenantId, Timestamp};
use tessera_registry::TenantRegistry;
use tessera_storage::{Database, KvStore};

/// Cache-tier namespace for handler modules.
const CACHE_NS: &str = "worker";

/// A successfully deployed handler, as reported to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct DeployedWorker {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Endpoint the handler serves.
    pub endpoint: EndpointName,
    /// Blake3 hash of the module bytes.
    pub content_hash: String,
    /// Module size in bytes.
    pub size: usize,
    /// Deploy time.
    pub updated_at: Timestamp,
}

/// One endpoint in a tenant's worker listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSummary {
    /// Endpoint name.
    pub endpoint: EndpointName,
    /// Last deploy time.
    pub updated_at: Timestamp,
}

/// Durable row for a handler module.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkerRow {
    tenant_id: String,
    endpoint: String,
    source_b64: String,
    content_hash: String,
    updated_at: Timestamp,
}

/// The code distribution store.
#[derive(Clone)]
pub struct WorkerStore {
    db: Database,
    cache: Arc<dyn KvStore>,
    registry: TenantRegistry,
}

impl WorkerStore {
    /// Create a store over the durable tier and a cache tier.
    #[must_use]
    pub fn new(db: Database, cache: Arc<dyn KvStore>, registry: TenantRegistry) -> Self {
        Self { db, cache, registry }
    }

    fn cache_key(tenant: &TenantId, endpoint: &EndpointName) -> String {
        format!("{tenant}:{endpoint}")
    }

    /// Deploy a handler module for `(tenant, endpoint)`, replacing any
    /// previous module for that key.
    ///
    /// Validation happens before any write: the size bound first, then
    /// tenant existence. The durable write alone constitutes a successful
    /// deploy; the cache overwrite afterwards is best-effort.
    ///
    /// # Errors
    ///
    /// - [`WorkerStoreError::SourceTooLarge`] above [`MAX_HANDLER_BYTES`]
    /// - [`WorkerStoreError::TenantNotFound`] for an absent tenant
    /// - [`WorkerStoreError::Storage`] if the durable write fails; no
    ///   partial effect remains
    pub async fn deploy(
        &self,
        tenant: &TenantId,
        endpoint: &EndpointName,
        source: Vec<u8>,
    ) -> WorkerStoreResult<DeployedWorker> {
        if source.len() > MAX_HANDLER_BYTES {
            return Err(WorkerStoreError::SourceTooLarge { size: source.len() });
        }
        if !self.registry.exists(tenant).await? {
            return Err(WorkerStoreError::TenantNotFound(tenant.clone()));
        }

        let content_hash = blake3::hash(&source).to_hex().to_string();
        let row = WorkerRow {
            tenant_id: tenant.as_str().to_string(),
            endpoint: endpoint.as_str().to_string(),
            source_b64: BASE64.encode(&source),
            content_hash: content_hash.clone(),
            updated_at: Timestamp::now(),
        };
        let updated_at = row.updated_at;

        // One logical replace: the old row goes and the new one lands in
        // the same transaction.
        self.db
            .client()
            .query(
                "BEGIN TRANSACTION; \
                 DELETE tenant_worker WHERE tenant_id = $tenant AND endpoint = $endpoint; \
                 CREATE tenant_worker CONTENT $row RETURN NONE; \
                 COMMIT TRANSACTION;",
            )
            .bind(("tenant", tenant.as_str().to_string()))
            .bind(("endpoint", endpoint.as_str().to_string()))
            .bind(("row", row))
            .await
            .map_err(|e| WorkerStoreError::Storage(e.to_string()))?
            .check()
            .map_err(|e| WorkerStoreError::Storage(e.to_string()))?;

        // Durable write succeeded; the deploy is committed. Overwrite the
        // cache entry so the new module is immediately visible on the fast
        // path. A failure here is logged, never surfaced.
        let key = Self::cache_key(tenant, endpoint);
        if let Err(e) = self.cache.set(CACHE_NS, &key, source.clone()).await {
            tracing::warn!(tenant = %tenant, endpoint = %endpoint, error = %e,
                "cache write failed after deploy; lookups will repopulate");
        }

        tracing::info!(tenant = %tenant, endpoint = %endpoint, hash = %content_hash,
            size = source.len(), "handler deployed");

        Ok(DeployedWorker {
            tenant_id: tenant.clone(),
            endpoint: endpoint.clone(),
            content_hash,
            size: source.len(),
            updated_at,
        })
    }

    /// Fetch the handler module for `(tenant, endpoint)`.
    ///
    /// Cache-aside: consult the cache tier, fall back to the durable tier
    /// on a miss and repopulate the cache before returning. A cache-tier
    /// failure degrades to a durable read.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerStoreError::Storage`] if the durable tier fails or
    /// a stored row cannot be decoded.
    pub async fn lookup(
        &self,
        tenant: &TenantId,
        endpoint: &EndpointName,
    ) -> WorkerStoreResult<Option<Vec<u8>>> {
        let key = Self::cache_key(tenant, endpoint);

        match self.cache.get(CACHE_NS, &key).await {
            Ok(Some(bytes)) => return Ok(Some(bytes)),
            Ok(None) => {},
            Err(e) => {
                tracing::warn!(tenant = %tenant, endpoint = %endpoint, error = %e,
                    "cache read failed; falling back to durable tier");
            },
        }

        let Some(row) = self.fetch_row(tenant, endpoint).await? else {
            return Ok(None);
        };
        let source = BASE64
            .decode(&row.source_b64)
            .map_err(|e| WorkerStoreError::Storage(format!("stored module corrupt: {e}")))?;

        if let Err(e) = self.cache.set(CACHE_NS, &key, source.clone()).await {
            tracing::warn!(tenant = %tenant, endpoint = %endpoint, error = %e,
                "cache repopulation failed");
        }

        Ok(Some(source))
    }

    /// List a tenant's deployed endpoints, most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerStoreError::Storage`] if the durable tier fails.
    pub async fn list(&self, tenant: &TenantId) -> WorkerStoreResult<Vec<WorkerSummary>> {
        let mut response = self
            .db
            .client()
            .query(
                "SELECT endpoint, updated_at FROM tenant_worker \
                 WHERE tenant_id = $tenant ORDER BY updated_at DESC",
            )
            .bind(("tenant", tenant.as_str().to_string()))
            .await
            .map_err(|e| WorkerStoreError::Storage(e.to_string()))?;
        response
            .take(0)
            .map_err(|e| WorkerStoreError::Storage(e.to_string()))
    }

    /// Remove a handler. Returns `true` if a durable row existed.
    ///
    /// The cache entry is invalidated first so a racing lookup either
    /// repopulates from the still-present durable row or misses cleanly.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerStoreError::Storage`] if the durable tier fails.
    pub async fn remove(
        &self,
        tenant: &TenantId,
        endpoint: &EndpointName,
    ) -> WorkerStoreResult<bool> {
        let key = Self::cache_key(tenant, endpoint);
        if let Err(e) = self.cache.delete(CACHE_NS, &key).await {
            tracing::warn!(tenant = %tenant, endpoint = %endpoint, error = %e,
                "cache invalidation failed during remove");
        }

        let existed = self.fetch_row(tenant, endpoint).await?.is_some();
        self.db
            .client()
            .query("DELETE tenant_worker WHERE tenant_id = $tenant AND endpoint = $endpoint")
            .bind(("tenant", tenant.as_str().to_string()))
            .bind(("endpoint", endpoint.as_str().to_string()))
            .await
            .map_err(|e| WorkerStoreError::Storage(e.to_string()))?
            .check()
            .map_err(|e| WorkerStoreError::Storage(e.to_string()))?;
        Ok(existed)
    }

    async fn fetch_row(
        &self,
        tenant: &TenantId,
        endpoint: &EndpointName,
    ) -> WorkerStoreResult<Option<WorkerRow>> {
        let mut response = self
            .db
            .client()
            .query(
                "SELECT tenant_id, endpoint, source_b64, content_hash, updated_at \
                 FROM tenant_worker WHERE tenant_id = $tenant AND endpoint = $endpoint",
            )
            .bind(("tenant", tenant.as_str().to_string()))
            .bind(("endpoint", endpoint.as_str().to_string()))
            .await
            .map_err(|e| WorkerStoreError::Storage(e.to_string()))?;
        let mut rows: Vec<WorkerRow> = response
            .take(0)
            .map_err(|e| WorkerStoreError::Storage(e.to_string()))?;
        Ok(rows.pop())
    }
}

impl std::fmt::Debug for WorkerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerStore").finish_non_exhaustive()
    }
}
