//! Authentication and account-flow handlers, client and backend apps alike.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::dtos::auth::{
    ForgotPasswordRequest, LoginRequest, LoginResponse, RegisterRequest,
    ResendVerificationRequest, ResetPasswordRequest, VerifyEmailQuery,
};
use crate::dtos::{ErrorResponse, MessageResponse};
use crate::error::AppError;
use crate::middleware::{AuthUser, CurrentToken};
use crate::models::{Identity, UserResponse};
use crate::utils::ValidatedJson;
use crate::AppState;

/// Log in with email and password
#[utoipa::path(
    post,
    path = "/client/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid email or password", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let res = state.auth.login(req).await?;
    Ok(Json(res))
}

/// Register a new account
#[utoipa::path(
    post,
    path = "/client/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = UserResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.auth.register(req).await?;
    Ok((StatusCode::CREATED, Json(user.sanitized())))
}

/// Verify an email address with the emailed token
#[utoipa::path(
    get,
    path = "/client/auth/verify-email",
    params(VerifyEmailQuery),
    responses(
        (status = 200, description = "Email verified", body = MessageResponse),
        (status = 400, description = "Invalid or expired token", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<VerifyEmailQuery>,
) -> Result<Json<MessageResponse>, AppError> {
    state.auth.verify_email(&query.token).await?;
    Ok(Json(MessageResponse {
        message: "Email verified".to_string(),
    }))
}

/// Re-send the verification email
#[utoipa::path(
    post,
    path = "/client/auth/resend-email-verification",
    request_body = ResendVerificationRequest,
    responses(
        (status = 200, description = "Verification email sent", body = MessageResponse),
        (status = 400, description = "Email is already verified", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn resend_email_verification(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ResendVerificationRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state.auth.resend_verification(&req.email).await?;
    Ok(Json(MessageResponse {
        message: "Verification email sent".to_string(),
    }))
}

/// Request a password-reset email
#[utoipa::path(
    post,
    path = "/client/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset email sent if the account exists", body = MessageResponse)
    ),
    tag = "Authentication"
)]
pub async fn forgot_password(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state.auth.forgot_password(&req.email).await?;
    Ok(Json(MessageResponse {
        message: "If the email is registered, a reset link has been sent".to_string(),
    }))
}

/// Set a new password with the emailed reset token
#[utoipa::path(
    post,
    path = "/client/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 400, description = "Invalid or expired token", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn reset_password(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state.auth.reset_password(req).await?;
    Ok(Json(MessageResponse {
        message: "Password reset".to_string(),
    }))
}

/// Revoke the current session token
#[utoipa::path(
    post,
    path = "/client/auth/logout",
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 401, description = "Unauthenticated", body = ErrorResponse)
    ),
    security(("bearer_token" = [])),
    tag = "Authentication"
)]
pub async fn logout(
    State(state): State<AppState>,
    CurrentToken(token): CurrentToken,
) -> Result<Json<MessageResponse>, AppError> {
    state.auth.logout(&token).await?;
    Ok(Json(MessageResponse {
        message: "Logged out".to_string(),
    }))
}

/// The caller's resolved identity
#[utoipa::path(
    get,
    path = "/client/me",
    responses(
        (status = 200, description = "Current identity", body = Identity),
        (status = 401, description = "Unauthenticated", body = ErrorResponse)
    ),
    security(("bearer_token" = [])),
    tag = "Authentication"
)]
pub async fn me(AuthUser(identity): AuthUser) -> Json<Identity> {
    Json(identity)
}
