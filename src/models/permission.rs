//! Permission model - named grants, grouped by module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Permission {
    pub permission_id: Uuid,
    pub permission_name: String,
    pub module_name: String,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Permission {
    pub fn new(permission_name: String, module_name: String) -> Self {
        let now = Utc::now();
        Self {
            permission_id: Uuid::new_v4(),
            permission_name,
            module_name,
            created_utc: now,
            updated_utc: now,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewPermission {
    pub permission_name: String,
    pub module_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct PermissionUpdate {
    pub permission_name: Option<String>,
    pub module_name: Option<String>,
}
