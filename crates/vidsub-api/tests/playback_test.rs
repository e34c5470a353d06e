//! Playback credential integration tests.
//!
//! Run with: `cargo test -p vidsub-api --test playback_test`

mod helpers;

use axum_test::TestServer;
use helpers::auth::{admin_token, bearer, other_student_token, student_token, teacher_token};
use helpers::{api_path, setup_test_app, setup_test_app_with};
use serde_json::{json, Value};
use vidsub_storage::MemoryStorage;

/// Upload and confirm R1 for submission 42 of assignment 7.
async fn ready_submission(client: &TestServer, storage: &MemoryStorage) {
    client
        .post(&api_path("/upload-session"))
        .add_header("Authorization", bearer(&student_token()))
        .json(&json!({ "assignmentId": 7, "submissionId": 42 }))
        .await
        .assert_status_ok();
    storage.complete_upload("R1", 1_024_000, 120.0);
    client
        .post(&api_path("/confirm-upload"))
        .add_header("Authorization", bearer(&student_token()))
        .json(&json!({ "submissionId": 42, "remoteKey": "R1" }))
        .await
        .assert_status_ok();
}

async fn request_credential(client: &TestServer, token: &str, remote_key: &str) -> axum_test::TestResponse {
    client
        .get(&api_path("/playback-credential"))
        .add_header("Authorization", bearer(token))
        .add_query_param("submissionId", 42)
        .add_query_param("remoteKey", remote_key)
        .await
}

#[tokio::test]
async fn test_owner_receives_default_lifetime() {
    let app = setup_test_app(MemoryStorage::new().with_keys(["R1"])).await;
    ready_submission(app.client(), &app.storage).await;

    let response = request_credential(app.client(), &student_token(), "R1").await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["expiresInSeconds"], 86_400);
    assert_eq!(body["credentialType"], "signed_url");
    assert!(body["credential"].as_str().is_some_and(|c| !c.is_empty()));
}

#[tokio::test]
async fn test_grader_and_admin_may_watch() {
    let app = setup_test_app(MemoryStorage::new().with_keys(["R1"])).await;
    ready_submission(app.client(), &app.storage).await;

    let response = request_credential(app.client(), &teacher_token(&[7]), "R1").await;
    assert_eq!(response.status_code(), 200);
    let response = request_credential(app.client(), &admin_token(), "R1").await;
    assert_eq!(response.status_code(), 200);
}

#[tokio::test]
async fn test_other_student_is_denied() {
    let app = setup_test_app(MemoryStorage::new().with_keys(["R1"])).await;
    ready_submission(app.client(), &app.storage).await;

    let response = request_credential(app.client(), &other_student_token(), "R1").await;
    assert_eq!(response.status_code(), 403);
    let body: Value = response.json();
    assert_eq!(body["code"], "permission_error");
    assert_eq!(body["retry_allowed"], false);

    let response = request_credential(app.client(), &teacher_token(&[8]), "R1").await;
    assert_eq!(response.status_code(), 403);
}

#[tokio::test]
async fn test_mismatched_key_is_invalid_identifier() {
    let app = setup_test_app(MemoryStorage::new().with_keys(["R1"])).await;
    ready_submission(app.client(), &app.storage).await;

    let response = request_credential(app.client(), &student_token(), "R9").await;
    assert_eq!(response.status_code(), 400);
    assert_eq!(response.json::<Value>()["code"], "invalid_identifier");
}

#[tokio::test]
async fn test_pending_video_is_not_playable() {
    let app = setup_test_app(MemoryStorage::new().with_keys(["R1"])).await;
    app.client()
        .post(&api_path("/upload-session"))
        .add_header("Authorization", bearer(&student_token()))
        .json(&json!({ "assignmentId": 7, "submissionId": 42 }))
        .await
        .assert_status_ok();

    let response = request_credential(app.client(), &student_token(), "R1").await;
    assert_eq!(response.status_code(), 400);
    assert_eq!(response.json::<Value>()["code"], "validation_error");
}

#[tokio::test]
async fn test_rate_limit_returns_retry_after() {
    let app = setup_test_app_with(MemoryStorage::new().with_keys(["R1"]), |config| {
        config.playback_rate_limit = 3;
    })
    .await;
    ready_submission(app.client(), &app.storage).await;

    for _ in 0..3 {
        request_credential(app.client(), &student_token(), "R1")
            .await
            .assert_status_ok();
    }

    app.clock.advance(chrono::Duration::seconds(30));
    let response = request_credential(app.client(), &student_token(), "R1").await;
    assert_eq!(response.status_code(), 429);
    assert_eq!(response.header("retry-after"), "3570");
    let body: Value = response.json();
    assert_eq!(body["code"], "rate_limit");
    assert_eq!(body["retry_after"], 3570);

    // Admins bypass the limit.
    request_credential(app.client(), &admin_token(), "R1")
        .await
        .assert_status_ok();

    // The window slides: once the first requests age out, playback resumes.
    app.clock.advance(chrono::Duration::seconds(3570));
    request_credential(app.client(), &student_token(), "R1")
        .await
        .assert_status_ok();
}
