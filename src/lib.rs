pub mod config;
pub mod db;
pub mod dtos;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::{from_fn_with_state, Next},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::middleware::Requirements;
use crate::models::SUPERUSER_ROLE;
use crate::services::{AuthService, EmailProvider, IdentityResolver};
use crate::store::SharedStore;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::dashboard,
        handlers::auth::login,
        handlers::auth::register,
        handlers::auth::verify_email,
        handlers::auth::resend_email_verification,
        handlers::auth::forgot_password,
        handlers::auth::reset_password,
        handlers::auth::logout,
        handlers::auth::me,
        handlers::user::list_users,
        handlers::user::create_user,
        handlers::user::get_user,
        handlers::user::update_user,
        handlers::user::delete_user,
        handlers::user::assign_roles,
        handlers::user::revoke_roles,
        handlers::role::list_roles,
        handlers::role::create_role,
        handlers::role::get_role,
        handlers::role::update_role,
        handlers::role::delete_role,
        handlers::permission::list_permissions,
        handlers::permission::create_permission,
        handlers::permission::get_permission,
        handlers::permission::update_permission,
        handlers::permission::delete_permission,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::MessageResponse,
            dtos::UserPage,
            dtos::RolePage,
            dtos::PermissionPage,
            dtos::auth::LoginRequest,
            dtos::auth::LoginResponse,
            dtos::auth::RegisterRequest,
            dtos::auth::ResendVerificationRequest,
            dtos::auth::ForgotPasswordRequest,
            dtos::auth::ResetPasswordRequest,
            dtos::admin::CreateUserRequest,
            dtos::admin::UpdateUserRequest,
            dtos::admin::RoleAssignmentRequest,
            dtos::admin::CreateRoleRequest,
            dtos::admin::UpdateRoleRequest,
            dtos::admin::CreatePermissionRequest,
            dtos::admin::UpdatePermissionRequest,
            models::Identity,
            models::RoleGrant,
            models::Role,
            models::RoleWithPermissions,
            models::Permission,
            models::UserResponse,
            models::UserSummary,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Login, registration and account recovery"),
        (name = "Users", description = "User management"),
        (name = "Roles", description = "Role management"),
        (name = "Permissions", description = "Permission management"),
        (name = "Dashboard", description = "Backend dashboard"),
        (name = "Health", description = "Service health"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_token",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some("Opaque access token issued at login"))
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: SharedStore,
    pub email: Arc<dyn EmailProvider>,
    pub auth: AuthService,
    pub identity: IdentityResolver,
}

impl AppState {
    pub fn new(config: AppConfig, store: SharedStore, email: Arc<dyn EmailProvider>) -> Self {
        let auth = AuthService::new(
            store.clone(),
            email.clone(),
            config.session.lifetime(),
            config.session.verification_lifetime(),
            config.frontend_url.clone(),
        );
        let identity = IdentityResolver::new(store.clone());
        Self {
            config: Arc::new(config),
            store,
            email,
            auth,
            identity,
        }
    }
}

/// Gate middleware entry point usable with `from_fn_with_state`: the
/// requirements travel inside the state tuple.
async fn gate(
    State((state, requirements)): State<(AppState, Requirements)>,
    req: Request,
    next: Next,
) -> Result<axum::response::Response, error::AppError> {
    middleware::authorize(state, requirements, req, next).await
}

pub fn build_router(state: AppState) -> Router {
    // Any live session; no role, scope or permission checks.
    let session_routes = Router::new()
        .route("/client/me", get(handlers::auth::me))
        .route("/client/auth/logout", post(handlers::auth::logout))
        .layer(from_fn_with_state(
            (state.clone(), Requirements::none()),
            gate,
        ));

    let management_routes = Router::new()
        .route(
            "/backend/users",
            get(handlers::user::list_users).post(handlers::user::create_user),
        )
        .route(
            "/backend/users/:user_id",
            get(handlers::user::get_user)
                .put(handlers::user::update_user)
                .delete(handlers::user::delete_user),
        )
        .route(
            "/backend/users/:user_id/roles",
            post(handlers::user::assign_roles).delete(handlers::user::revoke_roles),
        )
        .route(
            "/backend/roles",
            get(handlers::role::list_roles).post(handlers::role::create_role),
        )
        .route(
            "/backend/roles/:role_id",
            get(handlers::role::get_role)
                .put(handlers::role::update_role)
                .delete(handlers::role::delete_role),
        )
        .route(
            "/backend/permissions",
            get(handlers::permission::list_permissions)
                .post(handlers::permission::create_permission),
        )
        .route(
            "/backend/permissions/:permission_id",
            get(handlers::permission::get_permission)
                .put(handlers::permission::update_permission)
                .delete(handlers::permission::delete_permission),
        )
        .layer(from_fn_with_state(
            (state.clone(), Requirements::roles(&[SUPERUSER_ROLE])),
            gate,
        ));

    let dashboard_route = Router::new()
        .route("/backend/dashboard", get(handlers::dashboard))
        .layer(from_fn_with_state(
            (
                state.clone(),
                Requirements::none()
                    .with_scope("backend")
                    .with_permissions(&["view:admin-dashboard"]),
            ),
            gate,
        ));

    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/client/auth/login", post(handlers::auth::login))
        .route("/client/auth/register", post(handlers::auth::register))
        .route(
            "/client/auth/verify-email",
            get(handlers::auth::verify_email),
        )
        .route(
            "/client/auth/resend-email-verification",
            post(handlers::auth::resend_email_verification),
        )
        .route(
            "/client/auth/forgot-password",
            post(handlers::auth::forgot_password),
        )
        .route(
            "/client/auth/reset-password",
            post(handlers::auth::reset_password),
        )
        .route("/backend/auth/login", post(handlers::auth::login));

    Router::new()
        .merge(public_routes)
        .merge(session_routes)
        .merge(dashboard_route)
        .merge(management_routes)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .fallback(handlers::not_found)
        .with_state(state.clone())
        .layer(cors_layer(&state.config))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    if config.allowed_origins.iter().any(|o| o == "*") {
        // Dev convenience only; config validation rejects this in prod.
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}
