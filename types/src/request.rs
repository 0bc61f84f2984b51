//! Per-request identity, threaded explicitly through every operation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ActorId, TenantId};

/// The authenticated caller, as resolved upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl Actor {
    #[must_use]
    pub fn new(id: ActorId) -> Self {
        Self {
            id,
            email: None,
            role: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("a tenant is required for this operation")]
pub struct TenantRequired;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub actor: Actor,
    pub tenant: Option<TenantId>,
}

impl RequestContext {
    #[must_use]
    pub fn new(actor: Actor, tenant: TenantId) -> Self {
        Self {
            actor,
            tenant: Some(tenant),
        }
    }

    #[must_use]
    pub fn without_tenant(actor: Actor) -> Self {
        Self {
            actor,
            tenant: None,
        }
    }

    pub fn require_tenant(&self) -> Result<&TenantId, TenantRequired> {
        self.tenant.as_ref().ok_or(TenantRequired)
    }
}
