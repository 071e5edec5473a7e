//! Tenant and actor context.
//!
//! Every engine operation receives a resolved `(tenant, actor, role)` triple
//! from the caller. The engine trusts this input and performs no
//! authentication itself; it only enforces the minimum role per operation.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of an actor within a tenant, ordered by privilege.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Read-only access.
    Viewer,
    /// May register assets, create edges, and run checks.
    Member,
    /// May validate edges, resolve break events, and override closed periods.
    Admin,
}

impl Role {
    /// Returns the database-compatible string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::Member => "member",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_db_str())
    }
}

/// Resolved identity context for an engine call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TenantContext {
    /// Isolation boundary; entities are never visible cross-tenant.
    pub tenant_id: Uuid,
    /// The acting user or system principal.
    pub actor_id: Uuid,
    /// Resolved role of the actor within the tenant.
    pub role: Role,
}

impl TenantContext {
    /// Creates a new context.
    pub fn new(tenant_id: Uuid, actor_id: Uuid, role: Role) -> Self {
        Self {
            tenant_id,
            actor_id,
            role,
        }
    }

    /// Fails with `Unauthorized` unless the actor holds at least `required`.
    pub fn require(&self, required: Role) -> Result<(), EngineError> {
        if self.role >= required {
            Ok(())
        } else {
            Err(EngineError::Unauthorized {
                required,
                actor: self.actor_id,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(role: Role) -> TenantContext {
        TenantContext::new(Uuid::new_v4(), Uuid::new_v4(), role)
    }

    #[test]
    fn test_role_ordering() {
        assert!(Role::Admin > Role::Member);
        assert!(Role::Member > Role::Viewer);
    }

    #[test]
    fn test_require_role() {
        assert!(ctx(Role::Admin).require(Role::Member).is_ok());
        assert!(ctx(Role::Member).require(Role::Member).is_ok());
        assert!(matches!(
            ctx(Role::Viewer).require(Role::Member),
            Err(EngineError::Unauthorized { .. })
        ));
    }

    #[test]
    fn test_role_db_str() {
        assert_eq!(Role::Viewer.as_db_str(), "viewer");
        assert_eq!(Role::Admin.to_string(), "admin");
    }
}
