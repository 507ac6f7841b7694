//! Role and permission semantics through the management API: permission-set
//! union, revocation, and the end-to-end administration scenario.

mod common;

use axum::http::StatusCode;
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn identity_unions_permissions_across_roles() {
    let app = TestApp::spawn();
    let user_id = app
        .seed_user("Ada", "ada@example.com", "correct horse", true)
        .await;
    let viewer = app
        .seed_role("viewer", None, &[("view:reports", "reports")])
        .await;
    let editor = app
        .seed_role(
            "editor",
            None,
            &[("edit:reports", "reports"), ("view:drafts", "drafts")],
        )
        .await;
    app.grant_role(user_id, viewer).await;
    app.grant_role(user_id, editor).await;

    let token = app.login("ada@example.com", "correct horse").await;
    let (status, body) = app.get("/client/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);

    let mut permissions: Vec<&str> = body["permissions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p.as_str().unwrap())
        .collect();
    permissions.sort_unstable();
    assert_eq!(
        permissions,
        vec!["edit:reports", "view:drafts", "view:reports"]
    );
}

#[tokio::test]
async fn revoking_a_role_drops_its_permissions_immediately() {
    let app = TestApp::spawn();
    let root = app.seed_superuser("root@example.com", "root password").await;
    let _ = root;
    let root_token = app.login("root@example.com", "root password").await;

    let user_id = app
        .seed_user("Ada", "ada@example.com", "correct horse", true)
        .await;
    let viewer = app
        .seed_role("viewer", None, &[("view:reports", "reports")])
        .await;
    app.grant_role(user_id, viewer).await;

    let token = app.login("ada@example.com", "correct horse").await;
    let (_, body) = app.get("/client/me", Some(&token)).await;
    assert_eq!(body["permissions"], json!(["view:reports"]));

    let (status, _) = app
        .delete(
            &format!("/backend/users/{user_id}/roles"),
            Some(&root_token),
            Some(json!({ "role_ids": [viewer] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // Same session, next resolve: the grant is gone.
    let (_, body) = app.get("/client/me", Some(&token)).await;
    assert_eq!(body["roles"], json!([]));
    assert_eq!(body["permissions"], json!([]));
}

#[tokio::test]
async fn updating_a_role_replaces_its_permission_set() {
    let app = TestApp::spawn();
    app.seed_superuser("root@example.com", "root password").await;
    let root_token = app.login("root@example.com", "root password").await;

    // Create two permissions and a role holding the first.
    let (_, view) = app
        .post(
            "/backend/permissions",
            Some(&root_token),
            json!({ "name": "view:reports", "module": "reports" }),
        )
        .await;
    let (_, edit) = app
        .post(
            "/backend/permissions",
            Some(&root_token),
            json!({ "name": "edit:reports", "module": "reports" }),
        )
        .await;

    let (status, role) = app
        .post(
            "/backend/roles",
            Some(&root_token),
            json!({
                "name": "analyst",
                "scope": "backend",
                "permission_ids": [view["permission_id"]]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(role["permissions"], json!(["view:reports"]));
    let role_id = role["role_id"].as_str().unwrap().to_string();

    // Replace the whole set with just the edit permission.
    let (status, updated) = app
        .put(
            &format!("/backend/roles/{role_id}"),
            Some(&root_token),
            json!({ "permission_ids": [edit["permission_id"]] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["permissions"], json!(["edit:reports"]));
    // Scope untouched when the key is absent.
    assert_eq!(updated["scope"], "backend");

    // Present-but-null scope clears it.
    let (status, cleared) = app
        .put(
            &format!("/backend/roles/{role_id}"),
            Some(&root_token),
            json!({ "scope": null }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(cleared["scope"].is_null());
}

#[tokio::test]
async fn updating_a_user_to_an_existing_email_conflicts() {
    let app = TestApp::spawn();
    app.seed_superuser("root@example.com", "root password").await;
    let root_token = app.login("root@example.com", "root password").await;

    let ada = app
        .seed_user("Ada", "ada@example.com", "correct horse", true)
        .await;
    app.seed_user("Grace", "grace@example.com", "other password", true)
        .await;

    let (status, _) = app
        .put(
            &format!("/backend/users/{ada}"),
            Some(&root_token),
            json!({ "email": "grace@example.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // A non-conflicting change still goes through.
    let (status, body) = app
        .put(
            &format!("/backend/users/{ada}"),
            Some(&root_token),
            json!({ "email": "ada.lovelace@example.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "ada.lovelace@example.com");
}

#[tokio::test]
async fn duplicate_role_and_permission_names_conflict() {
    let app = TestApp::spawn();
    app.seed_superuser("root@example.com", "root password").await;
    let root_token = app.login("root@example.com", "root password").await;

    let (first, _) = app
        .post(
            "/backend/roles",
            Some(&root_token),
            json!({ "name": "analyst" }),
        )
        .await;
    assert_eq!(first, StatusCode::CREATED);
    let (second, _) = app
        .post(
            "/backend/roles",
            Some(&root_token),
            json!({ "name": "analyst" }),
        )
        .await;
    assert_eq!(second, StatusCode::CONFLICT);

    let (first, _) = app
        .post(
            "/backend/permissions",
            Some(&root_token),
            json!({ "name": "view:x", "module": "x" }),
        )
        .await;
    assert_eq!(first, StatusCode::CREATED);
    let (second, _) = app
        .post(
            "/backend/permissions",
            Some(&root_token),
            json!({ "name": "view:x", "module": "x" }),
        )
        .await;
    assert_eq!(second, StatusCode::CONFLICT);
}

#[tokio::test]
async fn list_endpoints_reject_unlisted_sort_and_filter_fields() {
    let app = TestApp::spawn();
    app.seed_superuser("root@example.com", "root password").await;
    let root_token = app.login("root@example.com", "root password").await;

    let (status, _) = app
        .get("/backend/users?sort=password_hash", Some(&root_token))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .get("/backend/users?filter=password_hash:x", Some(&root_token))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .get("/backend/users?sort_direction=sideways", Some(&root_token))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_builds_an_operator_end_to_end() {
    let app = TestApp::spawn();
    app.seed_superuser("root@example.com", "root password").await;
    let root_token = app.login("root@example.com", "root password").await;

    // Permission, then a backend-scoped role carrying it.
    let (status, permission) = app
        .post(
            "/backend/permissions",
            Some(&root_token),
            json!({ "name": "view:admin-dashboard", "module": "dashboard" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, role) = app
        .post(
            "/backend/roles",
            Some(&root_token),
            json!({
                "name": "operator",
                "scope": "backend",
                "permission_ids": [permission["permission_id"]]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    // A user created with the role from the start.
    let (status, operator) = app
        .post(
            "/backend/users",
            Some(&root_token),
            json!({
                "name": "Olive Operator",
                "email": "olive@example.com",
                "password": "operator pass",
                "role_ids": [role["role_id"]]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(operator["roles"], json!(["operator"]));

    // The operator can log in and reach the dashboard.
    let operator_token = app.login("olive@example.com", "operator pass").await;
    let (status, _) = app.get("/backend/dashboard", Some(&operator_token)).await;
    assert_eq!(status, StatusCode::OK);

    // But not the management surface.
    let (status, _) = app.get("/backend/roles", Some(&operator_token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Listing users filtered by the new role finds exactly the operator.
    let (status, listed) = app
        .get("/backend/users?filter=role:operator", Some(&root_token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["total_count"], 1);
    assert_eq!(listed["data"][0]["email"], "olive@example.com");

    // Deleting the role strips the operator's access on the next request.
    let (status, _) = app
        .delete(
            &format!("/backend/roles/{}", role["role_id"].as_str().unwrap()),
            Some(&root_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get("/backend/dashboard", Some(&operator_token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
