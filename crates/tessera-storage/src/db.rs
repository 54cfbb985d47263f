//! `SurrealDB` durable-tier interface.
//!
//! The [`Database`] struct wraps an embedded `SurrealDB` connection. In
//! production it uses `SurrealKV` as its storage engine; tests run
//! against the in-memory engine.
//!
//! # Connection Strings
//!
//! | Mode | Connection | Backend |
//! |------|-----------|---------|
//! | Embedded (production) | `surrealkv://path/to/data` | `SurrealKV` |
//! | Embedded (test) | `mem://` | In-memory |
//!
//! Durable writes here are single-row operations; the gateway relies on
//! per-statement atomicity and nothing more.

use crate::error::{StorageError, StorageResult};

/// Re-export `SurrealDB` for direct query access when needed.
pub use surrealdb;

/// `SurrealDB` durable-tier wrapper.
///
/// Holds the tenants, handler code, file metadata and audit tables. All
/// consumers go through [`Database::client`] with explicit `SurrealQL`
/// queries.
#[derive(Clone)]
pub struct Database {
    inner: surrealdb::Surreal<surrealdb::engine::any::Any>,
}

impl Database {
    /// Connect to an embedded `SurrealDB` with `SurrealKV` storage.
    ///
    /// Data is persisted to the given directory path.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Connection`] if the connection fails.
    pub async fn connect_embedded(path: &str) -> StorageResult<Self> {
        let endpoint = format!("surrealkv://{path}");
        let db: surrealdb::Surreal<surrealdb::engine::any::Any> = surrealdb::Surreal::init();
        db.connect(&endpoint)
            .await
            .map_err(|e: surrealdb::Error| StorageError::Connection(e.to_string()))?;
        db.use_ns("tessera")
            .use_db("main")
            .await
            .map_err(|e: surrealdb::Error| StorageError::Connection(e.to_string()))?;
        Ok(Self { inner: db })
    }

    /// Connect to an in-memory `SurrealDB` (for tests).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Connection`] if the connection fails.
    pub async fn connect_memory() -> StorageResult<Self> {
        let db: surrealdb::Surreal<surrealdb::engine::any::Any> = surrealdb::Surreal::init();
        db.connect("mem://")
            .await
            .map_err(|e: surrealdb::Error| StorageError::Connection(e.to_string()))?;
        db.use_ns("tessera")
            .use_db("test")
            .await
            .map_err(|e: surrealdb::Error| StorageError::Connection(e.to_string()))?;
        Ok(Self { inner: db })
    }

    /// Get a reference to the underlying `SurrealDB` client.
    #[must_use]
    pub fn client(&self) -> &surrealdb::Surreal<surrealdb::engine::any::Any> {
        &self.inner
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_connection_accepts_queries() {
        let db = Database::connect_memory().await.unwrap();
        let response = db
            .client()
            .query("CREATE probe CONTENT { name: $name } RETURN NONE")
            .bind(("name", "ping".to_string()))
            .await
            .unwrap();
        assert!(response.check().is_ok());

        #[derive(serde::Deserialize)]
        struct Probe {
            name: String,
        }
        let mut response = db
            .client()
            .query("SELECT name FROM probe")
            .await
            .unwrap();
        let rows: Vec<Probe> = response.take(0).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "ping");
    }
}
