//! Upload lifecycle integration tests.
//!
//! Run with: `cargo test -p vidsub-api --test upload_test`

mod helpers;

use helpers::auth::{
    admin_token, bearer, other_student_token, student_token, teacher_token, STUDENT_ID,
};
use helpers::{api_path, setup_test_app};
use serde_json::{json, Value};
use vidsub_core::models::{AuditEventType, UploadStatus};
use vidsub_db::UploadRecordStore;
use vidsub_storage::{MemoryStorage, ScriptedFailure, StorageOp};

#[tokio::test]
async fn test_submission_lifecycle_through_retention() {
    let app = setup_test_app(MemoryStorage::new().with_keys(["R1"])).await;
    let client = app.client();
    let student = bearer(&student_token());

    let response = client
        .post(&api_path("/upload-session"))
        .add_header("Authorization", student.clone())
        .json(&json!({ "assignmentId": 7, "submissionId": 42 }))
        .await;
    assert_eq!(response.status_code(), 200);
    let session: Value = response.json();
    assert_eq!(session["remoteKey"], "R1");
    assert_eq!(session["status"], "pending");
    assert!(session["uploadUrl"].as_str().unwrap().contains("R1"));

    app.storage.complete_upload("R1", 1_024_000, 120.0);

    let response = client
        .post(&api_path("/confirm-upload"))
        .add_header("Authorization", student.clone())
        .json(&json!({ "submissionId": 42, "remoteKey": "R1" }))
        .await;
    assert_eq!(response.status_code(), 200);
    let confirmed: Value = response.json();
    assert_eq!(confirmed["status"], "ready");
    assert_eq!(confirmed["durationSeconds"], 120);
    assert_eq!(confirmed["fileSize"], 1_024_000);

    let response = client
        .get(&api_path("/playback-credential"))
        .add_header("Authorization", student.clone())
        .add_query_param("submissionId", 42)
        .add_query_param("remoteKey", "R1")
        .await;
    assert_eq!(response.status_code(), 200);
    let credential: Value = response.json();
    assert_eq!(credential["expiresInSeconds"], 86_400);

    // 91 days later the retention sweep removes the video.
    app.clock.advance(chrono::Duration::days(91));
    let summary = app.state.cleanup.run_sweep().await.unwrap();
    assert_eq!(summary.deleted, 1);
    assert!(!app.storage.contains("R1"));

    let response = client
        .get(&api_path("/upload-status"))
        .add_header("Authorization", student.clone())
        .add_query_param("submissionId", 42)
        .await;
    assert_eq!(response.status_code(), 200);
    let status: Value = response.json();
    assert_eq!(status["status"], "deleted");
    assert!(status["deletedAt"].is_string());

    let response = client
        .get(&api_path("/playback-credential"))
        .add_header("Authorization", student)
        .add_query_param("submissionId", 42)
        .add_query_param("remoteKey", "R1")
        .await;
    assert_eq!(response.status_code(), 404);

    let events: Vec<AuditEventType> = app.audit.all().await.iter().map(|e| e.event_type).collect();
    for expected in [
        AuditEventType::UploadRequested,
        AuditEventType::UploadConfirmed,
        AuditEventType::PlaybackAccess,
        AuditEventType::VideoDeleted,
        AuditEventType::CleanupSummary,
    ] {
        assert!(events.contains(&expected), "missing {expected:?}");
    }
}

#[tokio::test]
async fn test_requests_without_token_are_rejected() {
    let app = setup_test_app(MemoryStorage::new()).await;
    let response = app
        .client()
        .post(&api_path("/upload-session"))
        .json(&json!({ "assignmentId": 7, "submissionId": 42 }))
        .await;
    assert_eq!(response.status_code(), 401);
    let body: Value = response.json();
    assert_eq!(body["code"], "auth_error");
}

#[tokio::test]
async fn test_replacement_keeps_single_record() {
    let app = setup_test_app(MemoryStorage::new().with_keys(["R1", "R2"])).await;
    let client = app.client();
    let student = bearer(&student_token());

    for expected in ["R1", "R2"] {
        let response = client
            .post(&api_path("/upload-session"))
            .add_header("Authorization", student.clone())
            .json(&json!({ "assignmentId": 7, "submissionId": 42 }))
            .await;
        assert_eq!(response.status_code(), 200);
        assert_eq!(response.json::<Value>()["remoteKey"], expected);
    }

    assert_eq!(app.records.len().await, 1);
    assert!(!app.storage.contains("R1"));

    // Confirming the superseded upload is refused.
    let response = client
        .post(&api_path("/confirm-upload"))
        .add_header("Authorization", student)
        .json(&json!({ "submissionId": 42, "remoteKey": "R1" }))
        .await;
    assert_eq!(response.status_code(), 400);
    assert_eq!(response.json::<Value>()["code"], "invalid_identifier");
}

#[tokio::test]
async fn test_concurrent_upload_requests_leave_one_record() {
    let app = setup_test_app(MemoryStorage::new().with_keys(["R1", "R2"])).await;
    let client = app.client();
    let student = bearer(&student_token());
    let body = json!({ "assignmentId": 7, "submissionId": 42 });

    let request = || async {
        client
            .post(&api_path("/upload-session"))
            .add_header("Authorization", student.clone())
            .json(&body)
            .await
    };
    let (a, b) = tokio::join!(request(), request());
    assert_eq!(a.status_code(), 200);
    assert_eq!(b.status_code(), 200);

    assert_eq!(app.records.len().await, 1);
    let record = app.records.get_by_submission(42).await.unwrap().unwrap();
    assert_eq!(app.storage.object_count(), 1);
    assert!(app.storage.contains(&record.remote_key));
}

#[tokio::test]
async fn test_failed_delete_of_old_video_does_not_block_new_session() {
    let app = setup_test_app(MemoryStorage::new().with_keys(["R1", "R2"])).await;
    let client = app.client();
    let student = bearer(&student_token());

    client
        .post(&api_path("/upload-session"))
        .add_header("Authorization", student.clone())
        .json(&json!({ "assignmentId": 7, "submissionId": 42 }))
        .await
        .assert_status_ok();
    app.storage
        .fail_next(StorageOp::DeleteObject, [ScriptedFailure::Auth]);

    let response = client
        .post(&api_path("/upload-session"))
        .add_header("Authorization", student)
        .json(&json!({ "assignmentId": 7, "submissionId": 42 }))
        .await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.json::<Value>()["remoteKey"], "R2");

    let entries = app.audit.all().await;
    assert!(entries
        .iter()
        .any(|e| e.event_type == AuditEventType::ReplacementDeleteFailed));
}

#[tokio::test]
async fn test_other_student_cannot_touch_submission() {
    let app = setup_test_app(MemoryStorage::new().with_keys(["R1"])).await;
    let client = app.client();

    client
        .post(&api_path("/upload-session"))
        .add_header("Authorization", bearer(&student_token()))
        .json(&json!({ "assignmentId": 7, "submissionId": 42 }))
        .await
        .assert_status_ok();

    let response = client
        .post(&api_path("/confirm-upload"))
        .add_header("Authorization", bearer(&other_student_token()))
        .json(&json!({ "submissionId": 42, "remoteKey": "R1" }))
        .await;
    assert_eq!(response.status_code(), 403);
    assert_eq!(response.json::<Value>()["code"], "permission_error");
}

#[tokio::test]
async fn test_first_upload_cannot_claim_another_students_submission() {
    let app = setup_test_app(MemoryStorage::new().with_keys(["R1"])).await;
    let client = app.client();

    let response = client
        .post(&api_path("/upload-session"))
        .add_header("Authorization", bearer(&other_student_token()))
        .json(&json!({ "assignmentId": 7, "submissionId": 42 }))
        .await;
    assert_eq!(response.status_code(), 403);
    assert_eq!(response.json::<Value>()["code"], "permission_error");
    assert!(app.records.is_empty().await);
    assert_eq!(app.storage.calls(StorageOp::CreateUploadSession), 0);

    client
        .post(&api_path("/upload-session"))
        .add_header("Authorization", bearer(&student_token()))
        .json(&json!({ "assignmentId": 7, "submissionId": 42 }))
        .await
        .assert_status_ok();
    let record = app.records.get_by_submission(42).await.unwrap().unwrap();
    assert_eq!(record.user_id, STUDENT_ID);
}

#[tokio::test]
async fn test_error_then_retry_issues_new_session() {
    let app = setup_test_app(MemoryStorage::new().with_keys(["R1", "R2"])).await;
    let client = app.client();
    let student = bearer(&student_token());

    client
        .post(&api_path("/upload-session"))
        .add_header("Authorization", student.clone())
        .json(&json!({ "assignmentId": 7, "submissionId": 42 }))
        .await
        .assert_status_ok();
    app.storage.complete_upload("R1", 2048, 3.0);
    app.storage
        .set_state("R1", vidsub_storage::RemoteState::Error);

    let response = client
        .post(&api_path("/confirm-upload"))
        .add_header("Authorization", student.clone())
        .json(&json!({ "submissionId": 42, "remoteKey": "R1" }))
        .await;
    assert_eq!(response.json::<Value>()["status"], "error");

    let response = client
        .post(&api_path("/retry-upload"))
        .add_header("Authorization", student)
        .json(&json!({ "submissionId": 42 }))
        .await;
    assert_eq!(response.status_code(), 200);
    let retried: Value = response.json();
    assert_eq!(retried["remoteKey"], "R2");
    assert_eq!(retried["status"], "pending");

    let record = app.records.get_by_submission(42).await.unwrap().unwrap();
    assert_eq!(record.status, UploadStatus::Pending);
    assert!(record.error_message.is_none());
}

#[tokio::test]
async fn test_retry_of_pending_upload_conflicts() {
    let app = setup_test_app(MemoryStorage::new().with_keys(["R1"])).await;
    let client = app.client();
    let student = bearer(&student_token());

    client
        .post(&api_path("/upload-session"))
        .add_header("Authorization", student.clone())
        .json(&json!({ "assignmentId": 7, "submissionId": 42 }))
        .await
        .assert_status_ok();

    let response = client
        .post(&api_path("/retry-upload"))
        .add_header("Authorization", student)
        .json(&json!({ "submissionId": 42 }))
        .await;
    assert_eq!(response.status_code(), 409);
    assert_eq!(
        response.json::<Value>()["code"],
        "invalid_state_transition"
    );
}

#[tokio::test]
async fn test_cleanup_failed_upload_is_best_effort() {
    let app = setup_test_app(MemoryStorage::new().with_keys(["R1"])).await;
    let client = app.client();
    let student = bearer(&student_token());

    client
        .post(&api_path("/upload-session"))
        .add_header("Authorization", student.clone())
        .json(&json!({ "assignmentId": 7, "submissionId": 42 }))
        .await
        .assert_status_ok();
    app.storage
        .fail_next(StorageOp::DeleteObject, [ScriptedFailure::Auth]);

    let response = client
        .post(&api_path("/cleanup-failed-upload"))
        .add_header("Authorization", student)
        .json(&json!({ "submissionId": 42, "remoteKey": "R1" }))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["deletedRemote"], false);
    assert_eq!(body["deletedLocal"], true);
    assert!(app.records.is_empty().await);
}

#[tokio::test]
async fn test_remote_outage_surfaces_after_retries() {
    let app = setup_test_app(MemoryStorage::new()).await;
    app.storage.fail_next(
        StorageOp::CreateUploadSession,
        [
            ScriptedFailure::Network,
            ScriptedFailure::Network,
            ScriptedFailure::Network,
        ],
    );

    let response = app
        .client()
        .post(&api_path("/upload-session"))
        .add_header("Authorization", bearer(&student_token()))
        .json(&json!({ "assignmentId": 7, "submissionId": 42 }))
        .await;
    assert_eq!(response.status_code(), 503);
    let body: Value = response.json();
    assert_eq!(body["code"], "max_retries_exceeded");
    assert_eq!(body["retry_allowed"], true);
    assert_eq!(app.storage.calls(StorageOp::CreateUploadSession), 3);
    assert!(app.records.is_empty().await);
}

#[tokio::test]
async fn test_rejected_remote_credentials_are_a_service_error() {
    let app = setup_test_app(MemoryStorage::new()).await;
    app.storage
        .fail_next(StorageOp::CreateUploadSession, [ScriptedFailure::Auth]);

    let response = app
        .client()
        .post(&api_path("/upload-session"))
        .add_header("Authorization", bearer(&student_token()))
        .json(&json!({ "assignmentId": 7, "submissionId": 42 }))
        .await;
    assert_eq!(response.status_code(), 503);
    let body: Value = response.json();
    assert_eq!(body["code"], "config_error");
    assert_eq!(body["retry_allowed"], false);
    assert_eq!(body["suggestions"][0], "Contact your site administrator");
    assert!(!body.to_string().contains("API token"));
    assert_eq!(app.storage.calls(StorageOp::CreateUploadSession), 1);
}

#[tokio::test]
async fn test_audit_trail_is_for_graders() {
    let app = setup_test_app(MemoryStorage::new().with_keys(["R1"])).await;
    let client = app.client();

    client
        .post(&api_path("/upload-session"))
        .add_header("Authorization", bearer(&student_token()))
        .json(&json!({ "assignmentId": 7, "submissionId": 42 }))
        .await
        .assert_status_ok();

    let response = client
        .get(&api_path("/audit"))
        .add_header("Authorization", bearer(&student_token()))
        .add_query_param("submissionId", 42)
        .await;
    assert_eq!(response.status_code(), 403);

    let response = client
        .get(&api_path("/audit"))
        .add_header("Authorization", bearer(&teacher_token(&[7])))
        .add_query_param("submissionId", 42)
        .await;
    assert_eq!(response.status_code(), 200);
    let entries: Vec<Value> = response.json();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["eventType"], "upload_requested");

    // Without a record only admins may look.
    let response = client
        .get(&api_path("/audit"))
        .add_header("Authorization", bearer(&teacher_token(&[7])))
        .add_query_param("submissionId", 99)
        .await;
    assert_eq!(response.status_code(), 403);
    let response = client
        .get(&api_path("/audit"))
        .add_header("Authorization", bearer(&admin_token()))
        .add_query_param("submissionId", 99)
        .await;
    assert_eq!(response.status_code(), 200);
}

#[tokio::test]
async fn test_health_endpoints() {
    let app = setup_test_app(MemoryStorage::new()).await;
    app.client().get("/health").await.assert_status_ok();
    let response = app.client().get("/health/ready").await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.json::<Value>()["database"], "ready");
}
