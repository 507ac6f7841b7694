//! Permission management handlers (backend app, superuser only).

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::dtos::admin::{CreatePermissionRequest, UpdatePermissionRequest};
use crate::dtos::{ErrorResponse, ListQuery, ListRules, MessageResponse, Page, PermissionPage};
use crate::error::AppError;
use crate::models::{NewPermission, Permission, PermissionUpdate};
use crate::utils::ValidatedJson;
use crate::AppState;

const PERMISSION_LIST_RULES: ListRules = ListRules {
    default_sort: "created_utc",
    allowed_sort: &["permission_name", "module_name", "created_utc", "updated_utc"],
    allowed_filter: &["name", "module"],
};

/// List permissions
#[utoipa::path(
    get,
    path = "/backend/permissions",
    params(ListQuery),
    responses(
        (status = 200, description = "Paginated permissions", body = PermissionPage),
        (status = 400, description = "Invalid list parameters", body = ErrorResponse)
    ),
    security(("bearer_token" = [])),
    tag = "Permissions"
)]
pub async fn list_permissions(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<Permission>>, AppError> {
    let params = query.validated(&PERMISSION_LIST_RULES)?;
    let page = state.store.list_permissions(&params).await?;
    Ok(Json(page))
}

/// Create a permission
#[utoipa::path(
    post,
    path = "/backend/permissions",
    request_body = CreatePermissionRequest,
    responses(
        (status = 201, description = "Permission created", body = Permission),
        (status = 409, description = "Permission name already exists", body = ErrorResponse)
    ),
    security(("bearer_token" = [])),
    tag = "Permissions"
)]
pub async fn create_permission(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CreatePermissionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let permission = state
        .store
        .create_permission(NewPermission {
            permission_name: req.name,
            module_name: req.module,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(permission)))
}

/// Fetch one permission
#[utoipa::path(
    get,
    path = "/backend/permissions/{permission_id}",
    params(("permission_id" = Uuid, Path, description = "Permission id")),
    responses(
        (status = 200, description = "Permission", body = Permission),
        (status = 404, description = "Permission not found", body = ErrorResponse)
    ),
    security(("bearer_token" = [])),
    tag = "Permissions"
)]
pub async fn get_permission(
    State(state): State<AppState>,
    Path(permission_id): Path<Uuid>,
) -> Result<Json<Permission>, AppError> {
    let permission = state
        .store
        .find_permission_by_id(permission_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Permission not found")))?;
    Ok(Json(permission))
}

/// Update a permission
#[utoipa::path(
    put,
    path = "/backend/permissions/{permission_id}",
    params(("permission_id" = Uuid, Path, description = "Permission id")),
    request_body = UpdatePermissionRequest,
    responses(
        (status = 200, description = "Permission updated", body = Permission),
        (status = 404, description = "Permission not found", body = ErrorResponse)
    ),
    security(("bearer_token" = [])),
    tag = "Permissions"
)]
pub async fn update_permission(
    State(state): State<AppState>,
    Path(permission_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdatePermissionRequest>,
) -> Result<Json<Permission>, AppError> {
    let permission = state
        .store
        .update_permission(
            permission_id,
            PermissionUpdate {
                permission_name: req.name,
                module_name: req.module,
            },
        )
        .await?;
    Ok(Json(permission))
}

/// Delete a permission, removing it from every role
#[utoipa::path(
    delete,
    path = "/backend/permissions/{permission_id}",
    params(("permission_id" = Uuid, Path, description = "Permission id")),
    responses(
        (status = 200, description = "Permission deleted", body = MessageResponse),
        (status = 404, description = "Permission not found", body = ErrorResponse)
    ),
    security(("bearer_token" = [])),
    tag = "Permissions"
)]
pub async fn delete_permission(
    State(state): State<AppState>,
    Path(permission_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    state.store.delete_permission(permission_id).await?;
    Ok(Json(MessageResponse {
        message: "Permission deleted".to_string(),
    }))
}
