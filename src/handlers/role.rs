//! Role management handlers (backend app, superuser only).

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::dtos::admin::{CreateRoleRequest, UpdateRoleRequest};
use crate::dtos::{ErrorResponse, ListQuery, ListRules, MessageResponse, Page, RolePage};
use crate::error::AppError;
use crate::models::{NewRole, Role, RoleUpdate, RoleWithPermissions};
use crate::utils::ValidatedJson;
use crate::AppState;

const ROLE_LIST_RULES: ListRules = ListRules {
    default_sort: "created_utc",
    allowed_sort: &["role_name", "created_utc", "updated_utc"],
    allowed_filter: &["scope"],
};

/// List roles
#[utoipa::path(
    get,
    path = "/backend/roles",
    params(ListQuery),
    responses(
        (status = 200, description = "Paginated roles", body = RolePage),
        (status = 400, description = "Invalid list parameters", body = ErrorResponse)
    ),
    security(("bearer_token" = [])),
    tag = "Roles"
)]
pub async fn list_roles(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<Role>>, AppError> {
    let params = query.validated(&ROLE_LIST_RULES)?;
    let page = state.store.list_roles(&params).await?;
    Ok(Json(page))
}

/// Create a role with its initial permission set
#[utoipa::path(
    post,
    path = "/backend/roles",
    request_body = CreateRoleRequest,
    responses(
        (status = 201, description = "Role created", body = RoleWithPermissions),
        (status = 400, description = "Unknown permission id", body = ErrorResponse),
        (status = 409, description = "Role name already exists", body = ErrorResponse)
    ),
    security(("bearer_token" = [])),
    tag = "Roles"
)]
pub async fn create_role(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CreateRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    let role = state
        .store
        .create_role(NewRole {
            role_name: req.name,
            scope: req.scope,
            permission_ids: req.permission_ids,
        })
        .await?;

    let with_permissions = expand(&state, role).await?;
    Ok((StatusCode::CREATED, Json(with_permissions)))
}

/// Fetch one role with its permission names
#[utoipa::path(
    get,
    path = "/backend/roles/{role_id}",
    params(("role_id" = Uuid, Path, description = "Role id")),
    responses(
        (status = 200, description = "Role", body = RoleWithPermissions),
        (status = 404, description = "Role not found", body = ErrorResponse)
    ),
    security(("bearer_token" = [])),
    tag = "Roles"
)]
pub async fn get_role(
    State(state): State<AppState>,
    Path(role_id): Path<Uuid>,
) -> Result<Json<RoleWithPermissions>, AppError> {
    let role = state
        .store
        .find_role_by_id(role_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Role not found")))?;

    let with_permissions = expand(&state, role).await?;
    Ok(Json(with_permissions))
}

/// Update a role; a permission list replaces the whole set
#[utoipa::path(
    put,
    path = "/backend/roles/{role_id}",
    params(("role_id" = Uuid, Path, description = "Role id")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = RoleWithPermissions),
        (status = 404, description = "Role not found", body = ErrorResponse),
        (status = 409, description = "Role name already exists", body = ErrorResponse)
    ),
    security(("bearer_token" = [])),
    tag = "Roles"
)]
pub async fn update_role(
    State(state): State<AppState>,
    Path(role_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateRoleRequest>,
) -> Result<Json<RoleWithPermissions>, AppError> {
    let role = state
        .store
        .update_role(
            role_id,
            RoleUpdate {
                role_name: req.name,
                scope: req.scope,
                permission_ids: req.permission_ids,
            },
        )
        .await?;

    let with_permissions = expand(&state, role).await?;
    Ok(Json(with_permissions))
}

/// Delete a role, cascading its assignments
#[utoipa::path(
    delete,
    path = "/backend/roles/{role_id}",
    params(("role_id" = Uuid, Path, description = "Role id")),
    responses(
        (status = 200, description = "Role deleted", body = MessageResponse),
        (status = 404, description = "Role not found", body = ErrorResponse)
    ),
    security(("bearer_token" = [])),
    tag = "Roles"
)]
pub async fn delete_role(
    State(state): State<AppState>,
    Path(role_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    state.store.delete_role(role_id).await?;
    Ok(Json(MessageResponse {
        message: "Role deleted".to_string(),
    }))
}

async fn expand(state: &AppState, role: Role) -> Result<RoleWithPermissions, AppError> {
    let permissions = state
        .store
        .permissions_for_role(role.role_id)
        .await?
        .into_iter()
        .map(|p| p.permission_name)
        .collect();
    Ok(RoleWithPermissions { role, permissions })
}
