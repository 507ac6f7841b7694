//! Resolved authenticated identity: the view of a user the authorization
//! gate evaluates and handlers receive.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Sentinel role name that satisfies role and permission requirements
/// outright. Scope requirements are still enforced for superusers.
pub const SUPERUSER_ROLE: &str = "superuser";

/// One held role, as seen by the gate.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoleGrant {
    pub name: String,
    /// None = the role applies in every scope.
    pub scope: Option<String>,
}

/// Consolidated identity: user attributes, held roles with their scopes, and
/// the flattened permission-name set granted transitively through roles.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Identity {
    pub user_id: Uuid,
    pub display_name: String,
    pub email: String,
    pub roles: Vec<RoleGrant>,
    pub permissions: HashSet<String>,
}

impl Identity {
    pub fn is_superuser(&self) -> bool {
        self.roles.iter().any(|r| r.name == SUPERUSER_ROLE)
    }

    /// Any-of match over required role names.
    pub fn has_any_role(&self, required: &[String]) -> bool {
        self.roles.iter().any(|r| required.contains(&r.name))
    }

    /// A scope requirement is met by any held role whose scope equals the
    /// required one, or whose scope is null (universal).
    pub fn has_scope(&self, required: &str) -> bool {
        self.roles
            .iter()
            .any(|r| r.scope.as_deref() == Some(required) || r.scope.is_none())
    }

    /// All-of match over required permission names.
    pub fn has_all_permissions(&self, required: &[String]) -> bool {
        required.iter().all(|p| self.permissions.contains(p))
    }
}
