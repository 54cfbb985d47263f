//! Tessera Registry - tenant existence checks and admin-facing tenant rows.
//!
//! [`TenantRegistry::exists`] is the precondition gate every other
//! component calls before touching tenant-owned state. It is a pure read
//! against the durable tier with no caching: tenant lifecycle changes are
//! rare and must be immediately authoritative.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;

pub use error::{RegistryError, RegistryResult};

use serde::{Deserialize, Serialize};
use tessera_core::{TenantId, Timestamp};
use tessera_storage::Database;

/// A tenant row as stored in the durable tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    /// Externally assigned identifier, immutable.
    pub tenant_id: TenantId,
    /// Display name.
    pub name: String,
    /// Creation time.
    pub created_at: Timestamp,
}

/// Tenant registry over the durable tier.
#[derive(Debug, Clone)]
pub struct TenantRegistry {
    db: Database,
}

impl TenantRegistry {
    /// Create a registry over an open database.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Check whether a tenant exists. Uncached by design.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Storage`] if the durable tier fails.
    pub async fn exists(&self, tenant_id: &TenantId) -> RegistryResult<bool> {
        Ok(self.fetch(tenant_id).await?.is_some())
    }

    /// Fetch a tenant row, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Storage`] if the durable tier fails.
    pub async fn get(&self, tenant_id: &TenantId) -> RegistryResult<Option<Tenant>> {
        self.fetch(tenant_id).await
    }

    /// Create a tenant row.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AlreadyExists`] if the identifier is taken,
    /// or [`RegistryError::Storage`] if the durable tier fails.
    pub async fn create(&self, tenant_id: TenantId, name: String) -> RegistryResult<Tenant> {
        if self.fetch(&tenant_id).await?.is_some() {
            return Err(RegistryError::AlreadyExists(tenant_id));
        }

        let tenant = Tenant {
            tenant_id,
            name,
            created_at: Timestamp::now(),
        };
        self.db
            .client()
            .query("CREATE tenant CONTENT $tenant")
            .bind(("tenant", tenant.clone()))
            .await
            .map_err(|e| RegistryError::Storage(e.to_string()))?
            .check()
            .map_err(|e| RegistryError::Storage(e.to_string()))?;

        tracing::info!(tenant = %tenant.tenant_id, "tenant created");
        Ok(tenant)
    }

    async fn fetch(&self, tenant_id: &TenantId) -> RegistryResult<Option<Tenant>> {
        let mut response = self
            .db
            .client()
            .query("SELECT tenant_id, name, created_at FROM tenant WHERE tenant_id = $id")
            .bind(("id", tenant_id.as_str().to_string()))
            .await
            .map_err(|e| RegistryError::Storage(e.to_string()))?;
        let mut rows: Vec<Tenant> = response
            .take(0)
            .map_err(|e| RegistryError::Storage(e.to_string()))?;
        Ok(rows.pop())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn registry() -> TenantRegistry {
        TenantRegistry::new(Database::connect_memory().await.unwrap())
    }

    #[tokio::test]
    async fn absent_tenant_does_not_exist() {
        let registry = registry().await;
        let ghost = TenantId::new("ghost").unwrap();
        assert!(!registry.exists(&ghost).await.unwrap());
        assert!(registry.get(&ghost).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn created_tenant_exists() {
        let registry = registry().await;
        let id = TenantId::new("acme").unwrap();
        let tenant = registry
            .create(id.clone(), "Acme Corp".to_string())
            .await
            .unwrap();
        assert_eq!(tenant.tenant_id, id);
        assert!(registry.exists(&id).await.unwrap());

        let fetched = registry.get(&id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Acme Corp");
    }

    #[tokio::test]
    async fn duplicate_create_is_rejected() {
        let registry = registry().await;
        let id = TenantId::new("acme").unwrap();
        registry
            .create(id.clone(), "Acme Corp".to_string())
            .await
            .unwrap();
        let err = registry
            .create(id, "Imposter".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyExists(_)));
    }
}
