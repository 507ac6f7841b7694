//! Session lifetime behavior: sliding expiry, persistent tokens, and the
//! handling of expired tokens.

mod common;

use axum::http::StatusCode;
use common::{test_config, TestApp};
use serde_json::json;
use std::time::Duration;

use access_service::store::AccessTokenStore;

#[tokio::test]
async fn non_persistent_tokens_slide_forward_on_use() {
    let app = TestApp::spawn();
    app.seed_user("Ada", "ada@example.com", "correct horse", true)
        .await;
    let token = app.login("ada@example.com", "correct horse").await;

    let before = app.store.find_access_token(&token).await.unwrap().unwrap();
    assert!(before.expiry_utc.is_some());

    tokio::time::sleep(Duration::from_millis(20)).await;
    let (status, _) = app.get("/client/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);

    let after = app.store.find_access_token(&token).await.unwrap().unwrap();
    assert!(after.expiry_utc.unwrap() > before.expiry_utc.unwrap());
    assert!(after.last_used_utc > before.last_used_utc);
}

#[tokio::test]
async fn persistent_tokens_never_gain_an_expiry() {
    let app = TestApp::spawn();
    app.seed_user("Ada", "ada@example.com", "correct horse", true)
        .await;

    let (status, body) = app
        .post(
            "/client/auth/login",
            None,
            json!({ "email": "ada@example.com", "password": "correct horse", "remember_me": true }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["access_token"].as_str().unwrap().to_string();

    let stored = app.store.find_access_token(&token).await.unwrap().unwrap();
    assert!(stored.expiry_utc.is_none());

    let (status, _) = app.get("/client/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);

    let after = app.store.find_access_token(&token).await.unwrap().unwrap();
    assert!(after.expiry_utc.is_none());
    assert!(after.last_used_utc > stored.last_used_utc);
}

#[tokio::test]
async fn expired_tokens_are_rejected_and_left_untouched() {
    // A negative lifetime makes every non-persistent token expire at issue.
    let app = TestApp::spawn_with_config({
        let mut config = test_config(60);
        config.session.lifetime_minutes = -5;
        config
    });
    app.seed_user("Ada", "ada@example.com", "correct horse", true)
        .await;
    let token = app.login("ada@example.com", "correct horse").await;

    let before = app.store.find_access_token(&token).await.unwrap().unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    let (status, body) = app.get("/client/me", Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    // Same body as any other authentication failure.
    assert_eq!(body["error"], "Unauthenticated");

    // The failed request neither touched nor renewed the token.
    let after = app.store.find_access_token(&token).await.unwrap().unwrap();
    assert_eq!(after.expiry_utc, before.expiry_utc);
    assert_eq!(after.last_used_utc, before.last_used_utc);
}

#[tokio::test]
async fn each_login_issues_a_distinct_token() {
    let app = TestApp::spawn();
    app.seed_user("Ada", "ada@example.com", "correct horse", true)
        .await;

    let first = app.login("ada@example.com", "correct horse").await;
    let second = app.login("ada@example.com", "correct horse").await;
    assert_ne!(first, second);

    // Both sessions are independently valid.
    let (status, _) = app.get("/client/me", Some(&first)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get("/client/me", Some(&second)).await;
    assert_eq!(status, StatusCode::OK);

    // Revoking one leaves the other alone.
    let (status, _) = app
        .post("/client/auth/logout", Some(&first), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get("/client/me", Some(&second)).await;
    assert_eq!(status, StatusCode::OK);
}
