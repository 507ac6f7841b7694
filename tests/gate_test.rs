//! Authorization gate behavior over real routes: authentication failures,
//! role/scope/permission enforcement and the superuser override.

mod common;

use axum::http::StatusCode;
use common::TestApp;
use serde_json::json;

use access_service::models::{NewPermission, NewRole};
use access_service::store::{AccessTokenStore, PermissionStore, RoleStore, UserStore};

#[tokio::test]
async fn guarded_routes_reject_missing_and_unknown_tokens() {
    let app = TestApp::spawn();

    let (status, body) = app.get("/client/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body2) = app.get("/client/me", Some("not-a-real-token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Missing header and unknown token are indistinguishable.
    assert_eq!(body, body2);
}

#[tokio::test]
async fn any_live_session_reaches_me() {
    let app = TestApp::spawn();
    app.seed_user("Ada", "ada@example.com", "correct horse", true)
        .await;
    let token = app.login("ada@example.com", "correct horse").await;

    let (status, body) = app.get("/client/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "ada@example.com");
    assert_eq!(body["roles"], json!([]));
}

#[tokio::test]
async fn management_routes_require_the_superuser_role() {
    let app = TestApp::spawn();
    app.seed_user("Ada", "ada@example.com", "correct horse", true)
        .await;
    app.seed_superuser("root@example.com", "root password")
        .await;

    let user_token = app.login("ada@example.com", "correct horse").await;
    let root_token = app.login("root@example.com", "root password").await;

    let (status, _) = app.get("/backend/users", Some(&user_token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.get("/backend/users", Some(&root_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_count"], 2);
}

#[tokio::test]
async fn superuser_bypasses_permissions_but_not_scope() {
    // Unscoped superuser: passes the dashboard's scope and permission checks.
    let app = TestApp::spawn();
    app.seed_superuser("root@example.com", "root password")
        .await;
    let root_token = app.login("root@example.com", "root password").await;
    let (status, _) = app.get("/backend/dashboard", Some(&root_token)).await;
    assert_eq!(status, StatusCode::OK);

    // Superuser scoped to the client app: the role override does not help
    // with the backend scope requirement.
    let scoped_app = TestApp::spawn();
    let scoped_id = scoped_app
        .seed_user("Scoped", "scoped@example.com", "scoped password", true)
        .await;
    let scoped_role = scoped_app
        .seed_role("superuser", Some("client"), &[])
        .await;
    scoped_app.grant_role(scoped_id, scoped_role).await;

    let scoped_token = scoped_app
        .login("scoped@example.com", "scoped password")
        .await;
    let (status, _) = scoped_app
        .get("/backend/dashboard", Some(&scoped_token))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // But the role checks on management routes are still bypassed.
    let (status, _) = scoped_app.get("/backend/users", Some(&scoped_token)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn dashboard_requires_scope_and_permission_together() {
    let app = TestApp::spawn();

    let dashboard_perm = app
        .store
        .create_permission(NewPermission {
            permission_name: "view:admin-dashboard".to_string(),
            module_name: "dashboard".to_string(),
        })
        .await
        .unwrap();

    // Right scope, right permission.
    let full_id = app
        .seed_user("Full", "full@example.com", "full password!", true)
        .await;
    let full_role = app
        .store
        .create_role(NewRole {
            role_name: "backend-admin".to_string(),
            scope: Some("backend".to_string()),
            permission_ids: vec![dashboard_perm.permission_id],
        })
        .await
        .unwrap();
    app.grant_role(full_id, full_role.role_id).await;
    let full_token = app.login("full@example.com", "full password!").await;
    let (status, _) = app.get("/backend/dashboard", Some(&full_token)).await;
    assert_eq!(status, StatusCode::OK);

    // Right scope, missing permission.
    let scoped_id = app
        .seed_user("NoPerm", "noperm@example.com", "noperm password", true)
        .await;
    let scoped_role = app.seed_role("backend-viewer", Some("backend"), &[]).await;
    app.grant_role(scoped_id, scoped_role).await;
    let scoped_token = app.login("noperm@example.com", "noperm password").await;
    let (status, _) = app.get("/backend/dashboard", Some(&scoped_token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Wrong scope, even with the required permission granted.
    let wrong_id = app
        .seed_user("Wrong", "wrong@example.com", "wrong password!", true)
        .await;
    let wrong_role = app
        .store
        .create_role(NewRole {
            role_name: "client-admin".to_string(),
            scope: Some("client".to_string()),
            permission_ids: vec![dashboard_perm.permission_id],
        })
        .await
        .unwrap();
    app.grant_role(wrong_id, wrong_role.role_id).await;
    let wrong_token = app.login("wrong@example.com", "wrong password!").await;
    let (status, _) = app.get("/backend/dashboard", Some(&wrong_token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn token_without_a_backing_user_is_unauthenticated_not_server_error() {
    let app = TestApp::spawn();

    // A live token whose user row no longer exists (deleted mid-session).
    let dangling = app
        .store
        .create_access_token(uuid::Uuid::new_v4(), false, chrono::Duration::hours(1))
        .await
        .unwrap();

    let (status, body) = app.get("/client/me", Some(&dangling)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthenticated");
}

#[tokio::test]
async fn deleting_a_user_revokes_its_sessions() {
    let app = TestApp::spawn();
    let user_id = app
        .seed_user("Ada", "ada@example.com", "correct horse", true)
        .await;
    let token = app.login("ada@example.com", "correct horse").await;

    app.store.delete_user(user_id).await.unwrap();

    let (status, _) = app.get("/client/me", Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
