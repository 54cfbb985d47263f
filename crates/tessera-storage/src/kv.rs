//! Cache-tier key-value storage.
//!
//! Keys live under string namespaces (`worker`, `tenant-data:{id}`, …).
//! The trait contract that the rest of the gateway relies on: `set`
//! replaces the whole value for a key atomically: a concurrent reader
//! observes either the old value or the new one, never a mix.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use dashmap::DashMap;

use crate::db::Database;
use crate::error::{StorageError, StorageResult};

/// Namespaced byte-level key-value store.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Get the value for a key, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Set the value for a key, replacing any existing value as a whole.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()>;

    /// Delete a key. Returns `true` if a value was present.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool>;

    /// List all keys in a namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>>;
}

/// In-process `DashMap`-backed store.
///
/// `DashMap::insert` swaps the stored `Vec<u8>` under the shard lock, so
/// whole-value replacement is atomic per key.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: DashMap<(String, String), Vec<u8>>,
}

impl MemoryKvStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self
            .entries
            .get(&(namespace.to_string(), key.to_string()))
            .map(|v| v.clone()))
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        self.entries
            .insert((namespace.to_string(), key.to_string()), value);
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        Ok(self
            .entries
            .remove(&(namespace.to_string(), key.to_string()))
            .is_some())
    }

    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>> {
        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.key().0 == namespace)
            .map(|entry| entry.key().1.clone())
            .collect())
    }
}

/// [`KvStore`] over the durable tier.
///
/// Backs the per-tenant durable data handles handed to handlers. Values
/// are stored base64 in `kv_entry` rows; each `set` is a single-row
/// replace.
#[derive(Debug, Clone)]
pub struct DbKvStore {
    db: Database,
}

impl DbKvStore {
    /// Create a store over an open database.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct KvRow {
    ns: String,
    key: String,
    value_b64: String,
}

#[derive(serde::Deserialize)]
struct KeyRow {
    key: String,
}

#[async_trait]
impl KvStore for DbKvStore {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let mut response = self
            .db
            .client()
            .query("SELECT ns, key, value_b64 FROM kv_entry WHERE ns = $ns AND key = $key")
            .bind(("ns", namespace.to_string()))
            .bind(("key", key.to_string()))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let mut rows: Vec<KvRow> = response
            .take(0)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        match rows.pop() {
            Some(row) => {
                let value = BASE64
                    .decode(row.value_b64)
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
                Ok(Some(value))
            },
            None => Ok(None),
        }
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        let row = KvRow {
            ns: namespace.to_string(),
            key: key.to_string(),
            value_b64: BASE64.encode(value),
        };
        self.db
            .client()
            .query(
                "BEGIN TRANSACTION; \
                 DELETE kv_entry WHERE ns = $ns AND key = $key; \
                 CREATE kv_entry CONTENT $row RETURN NONE; \
                 COMMIT TRANSACTION;",
            )
            .bind(("ns", namespace.to_string()))
            .bind(("key", key.to_string()))
            .bind(("row", row))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?
            .check()
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        let existed = self.get(namespace, key).await?.is_some();
        self.db
            .client()
            .query("DELETE kv_entry WHERE ns = $ns AND key = $key")
            .bind(("ns", namespace.to_string()))
            .bind(("key", key.to_string()))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?
            .check()
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(existed)
    }

    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>> {
        let mut response = self
            .db
            .client()
            .query("SELECT key FROM kv_entry WHERE ns = $ns")
            .bind(("ns", namespace.to_string()))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let rows: Vec<KeyRow> = response
            .take(0)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(rows.into_iter().map(|r| r.key).collect())
    }
}

/// A view of a [`KvStore`] confined to one namespace.
///
/// Handed to sandboxed handlers so they can only touch their own tenant's
/// keys; the namespace is fixed at construction and never exposed to the
/// consumer.
#[derive(Clone)]
pub struct ScopedKvStore {
    inner: Arc<dyn KvStore>,
    namespace: String,
}

impl ScopedKvStore {
    /// Create a scoped view over `store`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidNamespace`] if the namespace is empty.
    pub fn new(store: Arc<dyn KvStore>, namespace: impl Into<String>) -> StorageResult<Self> {
        let namespace = namespace.into();
        if namespace.is_empty() {
            return Err(StorageError::InvalidNamespace(
                "namespace must not be empty".to_string(),
            ));
        }
        Ok(Self {
            inner: store,
            namespace,
        })
    }

    /// The namespace this view is confined to.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Get a value within the scope.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.inner.get(&self.namespace, key).await
    }

    /// Set a value within the scope.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub async fn set(&self, key: &str, value: Vec<u8>) -> StorageResult<()> {
        self.inner.set(&self.namespace, key, value).await
    }

    /// Delete a key within the scope.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub async fn delete(&self, key: &str) -> StorageResult<bool> {
        self.inner.delete(&self.namespace, key).await
    }

    /// List keys within the scope.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub async fn list_keys(&self) -> StorageResult<Vec<String>> {
        self.inner.list_keys(&self.namespace).await
    }
}

impl std::fmt::Debug for ScopedKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedKvStore")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}
