//! The authorization gate. Every guarded route passes through [`authorize`]
//! with a [`Requirements`] descriptor declared next to the route.
//!
//! Evaluation order: bearer token -> live session -> identity -> roles ->
//! scope -> permissions. Authentication failures are all the same generic
//! 401; requirement failures are 403s naming only which kind of check
//! failed.

use axum::{
    extract::{FromRequestParts, Request},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};

use crate::error::{unauthenticated, AppError};
use crate::models::Identity;
use crate::services::session::renewed_expiry;
use crate::AppState;

/// Declarative access requirements for one route.
#[derive(Debug, Clone, Default)]
pub struct Requirements {
    /// Any-of: one held role with a matching name suffices.
    pub roles: Vec<String>,
    /// The app scope the route belongs to; a held role must cover it.
    pub scope: Option<String>,
    /// All-of: every listed permission must be granted.
    pub permissions: Vec<String>,
}

impl Requirements {
    /// Authentication only: any live session passes.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn roles(roles: &[&str]) -> Self {
        Self {
            roles: roles.iter().map(|r| r.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn with_scope(mut self, scope: &str) -> Self {
        self.scope = Some(scope.to_string());
        self
    }

    pub fn with_permissions(mut self, permissions: &[&str]) -> Self {
        self.permissions = permissions.iter().map(|p| p.to_string()).collect();
        self
    }
}

/// Check a resolved identity against a route's requirements.
///
/// The superuser role satisfies role and permission requirements outright
/// but gets no free pass on scope.
pub fn evaluate(requirements: &Requirements, identity: &Identity) -> Result<(), AppError> {
    let superuser = identity.is_superuser();

    if !requirements.roles.is_empty() && !superuser && !identity.has_any_role(&requirements.roles)
    {
        return Err(AppError::Forbidden(anyhow::anyhow!("Insufficient role")));
    }

    if let Some(scope) = &requirements.scope {
        if !identity.has_scope(scope) {
            return Err(AppError::Forbidden(anyhow::anyhow!("Insufficient scope")));
        }
    }

    if !requirements.permissions.is_empty()
        && !superuser
        && !identity.has_all_permissions(&requirements.permissions)
    {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Insufficient permission"
        )));
    }

    Ok(())
}

/// Gate middleware: authenticate the bearer token, refresh the session,
/// resolve the identity and enforce `requirements`.
///
/// On success the request gains an [`Identity`] extension and a
/// [`CurrentToken`] extension for downstream handlers.
pub async fn authorize(
    state: AppState,
    requirements: Requirements,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(unauthenticated)?;

    let token = state
        .store
        .find_access_token(token_value)
        .await?
        .ok_or_else(unauthenticated)?;

    // An expired token is dead: no touch, no renewal, same 401 as unknown.
    if token.is_expired() {
        return Err(unauthenticated());
    }

    state
        .store
        .touch_access_token(
            token.token_id,
            renewed_expiry(token.expiry_utc, state.config.session.lifetime()),
        )
        .await?;

    let identity = state.identity.resolve(token.user_id).await.map_err(|e| {
        // The user behind a live token may have been deleted; that is an
        // authentication failure, not a server error.
        match e {
            AppError::NotFound(_) => unauthenticated(),
            other => other,
        }
    })?;

    evaluate(&requirements, &identity)?;

    req.extensions_mut().insert(identity);
    req.extensions_mut().insert(CurrentToken(token.token_text));

    Ok(next.run(req).await)
}

/// Extractor for the resolved identity placed by the gate.
pub struct AuthUser(pub Identity);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(unauthenticated)
    }
}

/// Extractor for the bearer token value of the current request.
#[derive(Clone)]
pub struct CurrentToken(pub String);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentToken>()
            .cloned()
            .ok_or_else(unauthenticated)
    }
}
