//! Read-only descriptor of the inbound request.
//!
//! This is the only view of the request a handler ever sees: method,
//! header map and URL. The raw connection, body stream and socket stay on
//! the host side.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{EndpointName, TenantId};

/// The inbound request as presented to a tenant handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestDescriptor {
    /// Tenant the request is scoped to.
    pub tenant_id: TenantId,
    /// Endpoint being invoked.
    pub endpoint: EndpointName,
    /// HTTP method, uppercase.
    pub method: String,
    /// Header map. `BTreeMap` keeps serialization deterministic.
    pub headers: BTreeMap<String, String>,
    /// Full request URL.
    pub url: String,
}

impl RequestDescriptor {
    /// Build a descriptor for one invocation.
    #[must_use]
    pub fn new(
        tenant_id: TenantId,
        endpoint: EndpointName,
        method: impl Into<String>,
        headers: BTreeMap<String, String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id,
            endpoint,
            method: method.into().to_uppercase(),
            headers,
            url: url.into(),
        }
    }
}
