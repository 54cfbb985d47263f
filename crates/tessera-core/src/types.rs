//! Identifiers and timestamps shared across the gateway.
//!
//! Tenant and endpoint names appear in cache keys, object-store keys and
//! durable rows, so both are validated to a conservative character set at
//! the boundary and never re-checked downstream.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Maximum length of a tenant or endpoint identifier.
const MAX_IDENT_LEN: usize = 64;

/// Check an identifier against the allowed character set.
///
/// Allowed: ASCII alphanumerics, `-` and `_`. This keeps identifiers safe
/// to embed in `worker:{tenant}:{endpoint}` cache keys and
/// `tenants/{tenant}/files/...` object keys without escaping.
fn valid_ident(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= MAX_IDENT_LEN
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// An externally assigned, immutable tenant identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Create a tenant identifier, validating the character set.
    ///
    /// # Errors
    ///
    /// Returns the rejected input if it is empty, longer than 64 bytes, or
    /// contains characters outside `[A-Za-z0-9_-]`.
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if valid_ident(&id) {
            Ok(Self(id))
        } else {
            Err(id)
        }
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A tenant-defined endpoint name, mapped to one handler module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointName(String);

impl EndpointName {
    /// Create an endpoint name, validating the character set.
    ///
    /// # Errors
    ///
    /// Returns the rejected input if it fails the same rules as
    /// [`TenantId::new`].
    pub fn new(name: impl Into<String>) -> Result<Self, String> {
        let name = name.into();
        if valid_ident(&name) {
            Ok(Self(name))
        } else {
            Err(name)
        }
    }

    /// The name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generated identifier for an uploaded file artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(Uuid);

impl FileId {
    /// Generate a fresh file identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A UTC timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub chrono::DateTime<chrono::Utc>);

impl Timestamp {
    /// The current time.
    #[must_use]
    pub fn now() -> Self {
        Self(chrono::Utc::now())
    }

    /// RFC 3339 rendering, stable for storage and sorting.
    #[must_use]
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_id_accepts_slug() {
        assert!(TenantId::new("acme").is_ok());
        assert!(TenantId::new("acme-corp_2").is_ok());
    }

    #[test]
    fn tenant_id_rejects_bad_input() {
        assert!(TenantId::new("").is_err());
        assert!(TenantId::new("a/b").is_err());
        assert!(TenantId::new("a b").is_err());
        assert!(TenantId::new("..").is_err());
        assert!(TenantId::new("x".repeat(65)).is_err());
    }

    #[test]
    fn endpoint_name_rejects_path_separators() {
        assert!(EndpointName::new("greet").is_ok());
        assert!(EndpointName::new("greet/../other").is_err());
    }

    #[test]
    fn file_id_is_unique() {
        assert_ne!(FileId::new(), FileId::new());
    }

    #[test]
    fn timestamp_ordering_matches_rfc3339() {
        let a = Timestamp::now();
        let b = Timestamp::now();
        assert!(a <= b);
    }
}
