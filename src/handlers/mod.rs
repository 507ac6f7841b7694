pub mod auth;
pub mod permission;
pub mod role;
pub mod user;

use axum::{extract::State, http::StatusCode, Json};
use serde_json::json;

use crate::dtos::{ErrorResponse, MessageResponse};
use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::AppState;

/// Service health, including database reachability
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 500, description = "Database unreachable", body = ErrorResponse)
    ),
    tag = "Health"
)]
pub async fn health(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    state.store.health_check().await?;
    Ok(Json(json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
    })))
}

/// Admin dashboard entry point (backend scope + view:admin-dashboard)
#[utoipa::path(
    get,
    path = "/backend/dashboard",
    responses(
        (status = 200, description = "Dashboard greeting", body = MessageResponse),
        (status = 401, description = "Unauthenticated", body = ErrorResponse),
        (status = 403, description = "Insufficient scope or permission", body = ErrorResponse)
    ),
    security(("bearer_token" = [])),
    tag = "Dashboard"
)]
pub async fn dashboard(AuthUser(identity): AuthUser) -> Json<MessageResponse> {
    Json(MessageResponse {
        message: format!("Welcome to the admin dashboard, {}", identity.display_name),
    })
}

pub async fn not_found() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "Not found".to_string(),
        }),
    )
}
