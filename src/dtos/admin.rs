use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    /// Roles to assign at creation, by id.
    #[serde(default)]
    pub role_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    pub name: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RoleAssignmentRequest {
    #[validate(length(min = 1, message = "At least one role id is required"))]
    pub role_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateRoleRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    #[schema(example = "admin")]
    pub name: String,

    /// None = the role applies in every scope.
    #[schema(example = "backend")]
    pub scope: Option<String>,

    #[serde(default)]
    pub permission_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateRoleRequest {
    pub name: Option<String>,

    /// Present-but-null clears the scope; absent leaves it unchanged.
    #[serde(default, with = "double_option")]
    pub scope: Option<Option<String>>,

    /// When present, replaces the role's whole permission set.
    pub permission_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreatePermissionRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    #[schema(example = "view:admin-dashboard")]
    pub name: String,

    #[validate(length(min = 1, message = "Module is required"))]
    #[schema(example = "dashboard")]
    pub module: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdatePermissionRequest {
    pub name: Option<String>,
    pub module: Option<String>,
}

/// Distinguishes `"scope": null` (clear) from an absent key (keep).
mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(de: D) -> Result<Option<Option<String>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(de).map(Some)
    }
}
