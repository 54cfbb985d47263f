//! Object-store tier: binary blobs addressed by storage key.
//!
//! Keys follow the `tenants/{tenant}/files/{file_id}/{name}` layout and
//! are produced from validated identifiers upstream; the filesystem
//! implementation still refuses traversal components outright since the
//! key is the only thing standing between a request and the disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use crate::error::{StorageError, StorageResult};

/// A stored object: payload plus the content type recorded at write time.
#[derive(Debug, Clone)]
pub struct StoredObject {
    /// Object payload.
    pub data: Bytes,
    /// Content type recorded when the object was written.
    pub content_type: String,
}

/// Binary blob storage addressed by storage key.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write an object, replacing any existing object at the key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the backend fails.
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<()>;

    /// Read an object, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the backend fails.
    async fn get(&self, key: &str) -> StorageResult<Option<StoredObject>>;

    /// Delete an object. Returns `true` if it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the backend fails.
    async fn delete(&self, key: &str) -> StorageResult<bool>;
}

/// Reject keys that could escape the store root.
fn validate_key(key: &str) -> StorageResult<()> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// In-memory object store for tests.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: DashMap<String, StoredObject>,
}

impl MemoryObjectStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<()> {
        validate_key(key)?;
        self.objects.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Option<StoredObject>> {
        validate_key(key)?;
        Ok(self.objects.get(key).map(|o| o.clone()))
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        validate_key(key)?;
        Ok(self.objects.remove(key).is_some())
    }
}

/// Filesystem-backed object store rooted at a data directory.
///
/// The payload lands at `{root}/{key}`; the content type goes into a
/// `{key}.meta` sidecar so a restart does not lose it.
#[derive(Debug)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Connection`] if the root cannot be created.
    pub fn open(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)
            .map_err(|e| StorageError::Connection(format!("object store root: {e}")))?;
        Ok(Self { root })
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.meta"))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<()> {
        validate_key(key)?;
        let path = self.object_path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::Backend(format!("mkdir {}: {e}", parent.display())))?;
        }
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| StorageError::Backend(format!("write {}: {e}", path.display())))?;
        tokio::fs::write(self.meta_path(key), content_type.as_bytes())
            .await
            .map_err(|e| StorageError::Backend(format!("write meta for {key}: {e}")))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Option<StoredObject>> {
        validate_key(key)?;
        let path = self.object_path(key);
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StorageError::Backend(format!(
                    "read {}: {e}",
                    path.display()
                )));
            },
        };
        let content_type = tokio::fs::read_to_string(self.meta_path(key))
            .await
            .unwrap_or_else(|_| "application/octet-stream".to_string());
        Ok(Some(StoredObject {
            data: Bytes::from(data),
            content_type,
        }))
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        validate_key(key)?;
        let path = self.object_path(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                // Sidecar removal failure leaves a harmless stray .meta file.
                let _ = tokio::fs::remove_file(self.meta_path(key)).await;
                Ok(true)
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Backend(format!(
                "delete {}: {e}",
                path.display()
            ))),
        }
    }
}
