//! Shared harness for integration tests: an in-memory store, a recording
//! mock mailer, and request helpers driving the router with `oneshot`.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::util::ServiceExt;
use uuid::Uuid;

use access_service::{
    build_router,
    config::{AppConfig, DatabaseConfig, Environment, SessionConfig, SmtpConfig},
    models::{NewPermission, NewRole, NewUser},
    services::MockEmailService,
    store::{MemoryStore, PermissionStore, RoleStore, SharedStore, UserStore},
    utils::password::{hash_password, Password},
    AppState,
};

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub email: Arc<MockEmailService>,
    pub state: AppState,
}

pub fn test_config(session_lifetime_minutes: i64) -> AppConfig {
    AppConfig {
        environment: Environment::Dev,
        service_name: "access-service-test".to_string(),
        service_version: "0.0.0".to_string(),
        log_level: "error".to_string(),
        port: 0,
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
            max_connections: 1,
            min_connections: 1,
        },
        session: SessionConfig {
            lifetime_minutes: session_lifetime_minutes,
            verification_lifetime_minutes: 1440,
        },
        smtp: SmtpConfig {
            host: "localhost".to_string(),
            user: String::new(),
            password: String::new(),
            from_address: "no-reply@localhost".to_string(),
        },
        frontend_url: "http://localhost:3000".to_string(),
        allowed_origins: vec!["http://localhost:3000".to_string()],
    }
}

impl TestApp {
    pub fn spawn() -> Self {
        Self::spawn_with_config(test_config(60))
    }

    pub fn spawn_with_config(config: AppConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let email = Arc::new(MockEmailService::new());
        let shared: SharedStore = store.clone();
        let state = AppState::new(config, shared, email.clone());
        let router = build_router(state.clone());
        Self {
            router,
            store,
            email,
            state,
        }
    }

    /// Insert a user directly, optionally marking the email verified.
    pub async fn seed_user(&self, name: &str, email: &str, password: &str, verified: bool) -> Uuid {
        let hash = hash_password(&Password::new(password.to_string())).unwrap();
        let user = self
            .store
            .create_user(
                NewUser {
                    display_name: name.to_string(),
                    email: email.to_string(),
                    password_hash: hash.into_string(),
                },
                &[],
            )
            .await
            .unwrap();
        if verified {
            self.store.mark_email_verified(user.user_id).await.unwrap();
        }
        user.user_id
    }

    /// Insert a role, creating any named permissions that do not exist yet.
    pub async fn seed_role(
        &self,
        name: &str,
        scope: Option<&str>,
        permissions: &[(&str, &str)],
    ) -> Uuid {
        let mut permission_ids = Vec::new();
        for (permission_name, module_name) in permissions {
            let created = self
                .store
                .create_permission(NewPermission {
                    permission_name: permission_name.to_string(),
                    module_name: module_name.to_string(),
                })
                .await
                .unwrap();
            permission_ids.push(created.permission_id);
        }

        let role = self
            .store
            .create_role(NewRole {
                role_name: name.to_string(),
                scope: scope.map(|s| s.to_string()),
                permission_ids,
            })
            .await
            .unwrap();
        role.role_id
    }

    pub async fn grant_role(&self, user_id: Uuid, role_id: Uuid) {
        self.store.assign_roles(user_id, &[role_id]).await.unwrap();
    }

    /// A verified user holding the superuser role, ready to log in.
    pub async fn seed_superuser(&self, email: &str, password: &str) -> Uuid {
        let user_id = self.seed_user("Root", email, password, true).await;
        let role_id = self.seed_role("superuser", None, &[]).await;
        self.grant_role(user_id, role_id).await;
        user_id
    }

    /// Log in through the API and return the issued bearer token.
    pub async fn login(&self, email: &str, password: &str) -> String {
        let (status, body) = self
            .post(
                "/client/auth/login",
                None,
                json!({ "email": email, "password": password }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["access_token"].as_str().unwrap().to_string()
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request("GET", uri, token, None).await
    }

    pub async fn post(
        &self,
        uri: &str,
        token: Option<&str>,
        body: Value,
    ) -> (StatusCode, Value) {
        self.request("POST", uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request("PUT", uri, token, Some(body)).await
    }

    pub async fn delete(
        &self,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        self.request("DELETE", uri, token, body).await
    }

    async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }
}
