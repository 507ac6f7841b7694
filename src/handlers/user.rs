//! User management handlers (backend app, superuser only).

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::dtos::admin::{CreateUserRequest, RoleAssignmentRequest, UpdateUserRequest};
use crate::dtos::{ErrorResponse, ListQuery, ListRules, MessageResponse, Page, UserPage};
use crate::error::AppError;
use crate::models::{NewUser, UserSummary, UserUpdate};
use crate::utils::password::{hash_password, Password};
use crate::utils::ValidatedJson;
use crate::AppState;

const USER_LIST_RULES: ListRules = ListRules {
    default_sort: "created_utc",
    allowed_sort: &["display_name", "email", "created_utc", "updated_utc"],
    allowed_filter: &["role"],
};

/// List users
#[utoipa::path(
    get,
    path = "/backend/users",
    params(ListQuery),
    responses(
        (status = 200, description = "Paginated users", body = UserPage),
        (status = 400, description = "Invalid list parameters", body = ErrorResponse),
        (status = 403, description = "Insufficient role", body = ErrorResponse)
    ),
    security(("bearer_token" = [])),
    tag = "Users"
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<UserSummary>>, AppError> {
    let params = query.validated(&USER_LIST_RULES)?;
    let page = state.store.list_users(&params).await?;
    Ok(Json(page))
}

/// Create a user with optional initial roles
#[utoipa::path(
    post,
    path = "/backend/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserSummary),
        (status = 409, description = "Email already registered", body = ErrorResponse)
    ),
    security(("bearer_token" = [])),
    tag = "Users"
)]
pub async fn create_user(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let password_hash = hash_password(&Password::new(req.password))?;
    let user = state
        .store
        .create_user(
            NewUser {
                display_name: req.name,
                email: req.email,
                password_hash: password_hash.into_string(),
            },
            &req.role_ids,
        )
        .await?;

    let summary = summarize(&state, user.user_id).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

/// Fetch one user with its role names
#[utoipa::path(
    get,
    path = "/backend/users/{user_id}",
    params(("user_id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = UserSummary),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer_token" = [])),
    tag = "Users"
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserSummary>, AppError> {
    let summary = summarize(&state, user_id).await?;
    Ok(Json(summary))
}

/// Update a user's name or email
#[utoipa::path(
    put,
    path = "/backend/users/{user_id}",
    params(("user_id" = Uuid, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = UserSummary),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse)
    ),
    security(("bearer_token" = [])),
    tag = "Users"
)]
pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateUserRequest>,
) -> Result<Json<UserSummary>, AppError> {
    state
        .store
        .update_user(
            user_id,
            UserUpdate {
                display_name: req.name,
                email: req.email,
            },
        )
        .await?;

    let summary = summarize(&state, user_id).await?;
    Ok(Json(summary))
}

/// Delete a user, cascading role assignments and tokens
#[utoipa::path(
    delete,
    path = "/backend/users/{user_id}",
    params(("user_id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User deleted", body = MessageResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer_token" = [])),
    tag = "Users"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    state.store.delete_user(user_id).await?;
    Ok(Json(MessageResponse {
        message: "User deleted".to_string(),
    }))
}

/// Assign roles to a user
#[utoipa::path(
    post,
    path = "/backend/users/{user_id}/roles",
    params(("user_id" = Uuid, Path, description = "User id")),
    request_body = RoleAssignmentRequest,
    responses(
        (status = 200, description = "Roles assigned", body = UserSummary),
        (status = 400, description = "Unknown role id", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer_token" = [])),
    tag = "Users"
)]
pub async fn assign_roles(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<RoleAssignmentRequest>,
) -> Result<Json<UserSummary>, AppError> {
    // 404 before touching assignments, so an unknown user never half-works.
    state
        .store
        .find_user_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found")))?;

    state.store.assign_roles(user_id, &req.role_ids).await?;
    let summary = summarize(&state, user_id).await?;
    Ok(Json(summary))
}

/// Revoke roles from a user
#[utoipa::path(
    delete,
    path = "/backend/users/{user_id}/roles",
    params(("user_id" = Uuid, Path, description = "User id")),
    request_body = RoleAssignmentRequest,
    responses(
        (status = 200, description = "Roles revoked", body = UserSummary),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer_token" = [])),
    tag = "Users"
)]
pub async fn revoke_roles(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<RoleAssignmentRequest>,
) -> Result<Json<UserSummary>, AppError> {
    state
        .store
        .find_user_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found")))?;

    state.store.revoke_roles(user_id, &req.role_ids).await?;
    let summary = summarize(&state, user_id).await?;
    Ok(Json(summary))
}

async fn summarize(state: &AppState, user_id: Uuid) -> Result<UserSummary, AppError> {
    let user = state
        .store
        .find_user_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found")))?;
    let roles = state.store.roles_for_user(user_id).await?;

    Ok(UserSummary {
        user_id: user.user_id,
        display_name: user.display_name,
        email: user.email,
        roles: roles.into_iter().map(|r| r.role_name).collect(),
        created_utc: user.created_utc,
        updated_utc: user.updated_utc,
    })
}
