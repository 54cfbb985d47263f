//! Audit sink trait, backing implementations, and the emitter.

use std::sync::Arc;

use async_trait::async_trait;
use tessera_storage::Database;

use crate::entry::AuditEntry;
use crate::error::{AuditError, AuditResult};

/// Destination for audit entries.
///
/// Implementations must be thread-safe; the emitter appends from spawned
/// tasks.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append one entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be persisted. Callers on the
    /// request path go through [`AuditEmitter`], which swallows it.
    async fn append(&self, entry: &AuditEntry) -> AuditResult<()>;
}

/// Durable-tier sink appending to the `api_log` table.
#[derive(Debug, Clone)]
pub struct DbAuditSink {
    db: Database,
}

impl DbAuditSink {
    /// Create a sink over an open database.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AuditSink for DbAuditSink {
    async fn append(&self, entry: &AuditEntry) -> AuditResult<()> {
        self.db
            .client()
            .query("CREATE api_log CONTENT $entry")
            .bind(("entry", entry.clone()))
            .await
            .map_err(|e| AuditError::Storage(e.to_string()))?
            .check()
            .map_err(|e| AuditError::Storage(e.to_string()))?;
        Ok(())
    }
}

/// In-memory sink for tests.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    entries: std::sync::Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the recorded entries.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .expect("audit sink lock poisoned")
            .clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, entry: &AuditEntry) -> AuditResult<()> {
        self.entries
            .lock()
            .map_err(|e| AuditError::Storage(e.to_string()))?
            .push(entry.clone());
        Ok(())
    }
}

/// Fire-and-forget front of an [`AuditSink`].
///
/// `emit` hands the entry to a spawned task and returns immediately; an
/// append failure is logged at `warn` and otherwise dropped. The request
/// path never waits on, and never fails because of, the audit log.
#[derive(Clone)]
pub struct AuditEmitter {
    sink: Arc<dyn AuditSink>,
}

impl AuditEmitter {
    /// Create an emitter over a sink.
    #[must_use]
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Emit one entry without waiting for the append.
    pub fn emit(&self, entry: AuditEntry) {
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            if let Err(e) = sink.append(&entry).await {
                tracing::warn!(tenant = %entry.tenant_id, endpoint = %entry.endpoint,
                    error = %e, "audit append failed; entry dropped");
            }
        });
    }
}

impl std::fmt::Debug for AuditEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditEmitter").finish_non_exhaustive()
    }
}
