//! Tessera Files - tenant file artifacts across two stores.
//!
//! Every artifact is two halves: the binary object (object store) and a
//! metadata row (durable tier). A file is visible only when both exist.
//! The metadata row's tenant match is the sole access-control gate;
//! storage keys are treated as guessable and never grant access on their
//! own.
//!
//! Write ordering is deliberate and asymmetric:
//! - upload: object first, then metadata. A metadata failure strands an
//!   orphaned object (reconciled out-of-band) and still reports an error.
//! - delete: object first, then metadata. A crash in between leaves a
//!   dangling metadata row, which is safe: download still requires the
//!   object to exist.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;

pub use error::{FileStoreError, FileStoreResult};

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tessera_core::{FileId, TenantId, Timestamp};
use tessera_registry::TenantRegistry;
use tessera_storage::{Database, ObjectStore, StoredObject};

/// Metadata half of a stored file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileArtifact {
    /// Generated file identifier.
    pub file_id: FileId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Globally unique object-store key.
    pub storage_key: String,
    /// Original file name.
    pub name: String,
    /// Payload size in bytes.
    pub size: u64,
    /// Content type recorded at upload.
    pub content_type: String,
    /// Upload time.
    pub uploaded_at: Timestamp,
}

/// One page of a tenant's file listing.
#[derive(Debug, Clone, Serialize)]
pub struct FilePage {
    /// Artifacts in this page, newest first.
    pub files: Vec<FileArtifact>,
    /// Total artifacts for the tenant.
    pub total: usize,
    /// Page size requested.
    pub limit: usize,
    /// Page offset requested.
    pub offset: usize,
    /// Whether more artifacts exist past this page.
    pub has_more: bool,
}

/// Reduce an uploaded file name to a single safe path segment.
///
/// Path components are stripped (browsers may send full paths); what
/// remains must be a non-empty segment that is not `.` or `..`.
fn sanitize_name(name: &str) -> Option<String> {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();
    if base.is_empty() || base == "." || base == ".." {
        None
    } else {
        Some(base)
    }
}

/// Tenant file storage over the object store and the durable tier.
#[derive(Clone)]
pub struct FileStore {
    db: Database,
    objects: Arc<dyn ObjectStore>,
    registry: TenantRegistry,
}

impl FileStore {
    /// Create a store over an open database and object store.
    #[must_use]
    pub fn new(db: Database, objects: Arc<dyn ObjectStore>, registry: TenantRegistry) -> Self {
        Self { db, objects, registry }
    }

    /// Upload one file for a tenant.
    ///
    /// # Errors
    ///
    /// - [`FileStoreError::TenantNotFound`] for an absent tenant
    /// - [`FileStoreError::InvalidFileName`] if the name reduces to nothing
    /// - [`FileStoreError::Storage`] if either store fails; a failure after
    ///   the object write leaves the object orphaned (documented gap,
    ///   cleaned up out-of-band) and the error is still reported
    pub async fn upload(
        &self,
        tenant: &TenantId,
        name: &str,
        content_type: &str,
        data: Bytes,
    ) -> FileStoreResult<FileArtifact> {
        if !self.registry.exists(tenant).await? {
            return Err(FileStoreError::TenantNotFound(tenant.clone()));
        }
        let name =
            sanitize_name(name).ok_or_else(|| FileStoreError::InvalidFileName(name.to_string()))?;

        let file_id = FileId::new();
        let storage_key = format!("tenants/{tenant}/files/{file_id}/{name}");
        let artifact = FileArtifact {
            file_id,
            tenant_id: tenant.clone(),
            storage_key: storage_key.clone(),
            name,
            size: data.len() as u64,
            content_type: content_type.to_string(),
            uploaded_at: Timestamp::now(),
        };

        self.objects
            .put(&storage_key, data, content_type)
            .await
            .map_err(|e| FileStoreError::Storage(e.to_string()))?;

        if let Err(e) = self
            .db
            .client()
            .query("CREATE tenant_file CONTENT $file")
            .bind(("file", artifact.clone()))
            .await
            .map_err(|e| FileStoreError::Storage(e.to_string()))
            .and_then(|r| r.check().map_err(|e| FileStoreError::Storage(e.to_string())))
        {
            // Object written, metadata missing: the object is orphaned and
            // the artifact stays invisible. Reported to the caller as a
            // failure either way.
            tracing::error!(tenant = %tenant, key = %storage_key, error = %e,
                "metadata write failed after object write; object orphaned");
            return Err(e);
        }

        tracing::info!(tenant = %tenant, key = %artifact.storage_key,
            size = artifact.size, "file uploaded");
        Ok(artifact)
    }

    /// Download a file by storage key.
    ///
    /// The metadata row for `(tenant, storage_key)` must exist before the
    /// object store is touched; without it the caller learns nothing, even
    /// when the key itself is valid for another tenant.
    ///
    /// # Errors
    ///
    /// Returns [`FileStoreError::Storage`] if either store fails.
    pub async fn download(
        &self,
        tenant: &TenantId,
        storage_key: &str,
    ) -> FileStoreResult<Option<(FileArtifact, StoredObject)>> {
        let Some(artifact) = self.fetch_metadata(tenant, storage_key).await? else {
            return Ok(None);
        };
        let Some(object) = self
            .objects
            .get(storage_key)
            .await
            .map_err(|e| FileStoreError::Storage(e.to_string()))?
        else {
            // Dangling metadata (interrupted delete): behaves as absent.
            return Ok(None);
        };
        Ok(Some((artifact, object)))
    }

    /// List a tenant's files, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`FileStoreError::Storage`] if the durable tier fails.
    pub async fn list(
        &self,
        tenant: &TenantId,
        limit: usize,
        offset: usize,
    ) -> FileStoreResult<FilePage> {
        let mut response = self
            .db
            .client()
            .query(
                "SELECT file_id, tenant_id, storage_key, name, size, content_type, uploaded_at \
                 FROM tenant_file WHERE tenant_id = $tenant \
                 ORDER BY uploaded_at DESC LIMIT $limit START $offset",
            )
            .query("SELECT count() AS total FROM tenant_file WHERE tenant_id = $tenant GROUP ALL")
            .bind(("tenant", tenant.as_str().to_string()))
            .bind(("limit", limit as i64))
            .bind(("offset", offset as i64))
            .await
            .map_err(|e| FileStoreError::Storage(e.to_string()))?;

        let files: Vec<FileArtifact> = response
            .take(0)
            .map_err(|e| FileStoreError::Storage(e.to_string()))?;

        #[derive(Deserialize)]
        struct CountRow {
            total: usize,
        }
        let counts: Vec<CountRow> = response
            .take(1)
            .map_err(|e| FileStoreError::Storage(e.to_string()))?;
        let total = counts.first().map_or(0, |c| c.total);

        Ok(FilePage {
            files,
            total,
            limit,
            offset,
            has_more: offset + limit < total,
        })
    }

    /// Delete a file by storage key. Returns `false` when the metadata
    /// gate finds no row for this tenant.
    ///
    /// # Errors
    ///
    /// Returns [`FileStoreError::Storage`] if either store fails.
    pub async fn delete(&self, tenant: &TenantId, storage_key: &str) -> FileStoreResult<bool> {
        if self.fetch_metadata(tenant, storage_key).await?.is_none() {
            return Ok(false);
        }

        // Object before metadata: an interruption here leaves a dangling
        // metadata row, and download gates on the object existing.
        self.objects
            .delete(storage_key)
            .await
            .map_err(|e| FileStoreError::Storage(e.to_string()))?;

        self.db
            .client()
            .query("DELETE tenant_file WHERE tenant_id = $tenant AND storage_key = $key")
            .bind(("tenant", tenant.as_str().to_string()))
            .bind(("key", storage_key.to_string()))
            .await
            .map_err(|e| FileStoreError::Storage(e.to_string()))?
            .check()
            .map_err(|e| FileStoreError::Storage(e.to_string()))?;

        tracing::info!(tenant = %tenant, key = %storage_key, "file deleted");
        Ok(true)
    }

    async fn fetch_metadata(
        &self,
        tenant: &TenantId,
        storage_key: &str,
    ) -> FileStoreResult<Option<FileArtifact>> {
        let mut response = self
            .db
            .client()
            .query(
                "SELECT file_id, tenant_id, storage_key, name, size, content_type, uploaded_at \
                 FROM tenant_file WHERE tenant_id = $tenant AND storage_key = $key",
            )
            .bind(("tenant", tenant.as_str().to_string()))
            .bind(("key", storage_key.to_string()))
            .await
            .map_err(|e| FileStoreError::Storage(e.to_string()))?;
        let mut rows: Vec<FileArtifact> = response
            .take(0)
            .map_err(|e| FileStoreError::Storage(e.to_string()))?;
        Ok(rows.pop())
    }
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore").finish_non_exhaustive()
    }
}
