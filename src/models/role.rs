//! Role model - named grant bundles, optionally limited to one scope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Role entity. A null scope means the role applies in every scope.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Role {
    pub role_id: Uuid,
    pub role_name: String,
    pub scope: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Role {
    pub fn new(role_name: String, scope: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            role_id: Uuid::new_v4(),
            role_name,
            scope,
            created_utc: now,
            updated_utc: now,
        }
    }
}

/// Fields for creating a role, including the initial permission set.
#[derive(Debug, Clone)]
pub struct NewRole {
    pub role_name: String,
    pub scope: Option<String>,
    pub permission_ids: Vec<Uuid>,
}

/// Partial update to a role. `permission_ids = Some(..)` replaces the role's
/// whole permission set.
#[derive(Debug, Clone, Default)]
pub struct RoleUpdate {
    pub role_name: Option<String>,
    pub scope: Option<Option<String>>,
    pub permission_ids: Option<Vec<Uuid>>,
}

/// Role with its granted permission names, for detailed responses.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoleWithPermissions {
    #[serde(flatten)]
    pub role: Role,
    pub permissions: Vec<String>,
}
