//! The audit entry record.

use serde::{Deserialize, Serialize};
use tessera_core::{EndpointName, TenantId, Timestamp};

/// One request outcome, as appended to the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Tenant the request was scoped to.
    pub tenant_id: TenantId,
    /// Endpoint invoked.
    pub endpoint: EndpointName,
    /// Final HTTP status code returned to the caller.
    pub status_code: u16,
    /// Wall-clock handling time in milliseconds.
    pub execution_time_ms: u64,
    /// When the entry was recorded.
    pub timestamp: Timestamp,
}

impl AuditEntry {
    /// Create an entry stamped with the current time.
    #[must_use]
    pub fn new(
        tenant_id: TenantId,
        endpoint: EndpointName,
        status_code: u16,
        execution_time_ms: u64,
    ) -> Self {
        Self {
            tenant_id,
            endpoint,
            status_code,
            execution_time_ms,
            timestamp: Timestamp::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_is_stamped() {
        let before = Timestamp::now();
        let entry = AuditEntry::new(
            TenantId::new("acme").unwrap(),
            EndpointName::new("greet").unwrap(),
            200,
            12,
        );
        assert!(entry.timestamp >= before);
        assert_eq!(entry.status_code, 200);
    }
}
