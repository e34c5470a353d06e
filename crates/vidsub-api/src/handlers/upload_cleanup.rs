use crate::auth::CurrentUser;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use std::sync::Arc;
use vidsub_core::models::{CleanupFailedUploadRequest, CleanupFailedUploadResponse};

/// Discard an upload the client gave up on
///
/// Best effort: the response says what was actually removed.
#[utoipa::path(
    post,
    path = "/api/v1/cleanup-failed-upload",
    tag = "uploads",
    request_body = CleanupFailedUploadRequest,
    responses(
        (status = 200, description = "Cleanup outcome", body = CleanupFailedUploadResponse),
        (status = 403, description = "Submission belongs to another user", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(
    skip(state, user, request),
    fields(user_id = user.0.user_id, submission_id = request.submission_id, operation = "cleanup_failed_upload")
)]
pub async fn cleanup_failed_upload(
    user: CurrentUser,
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<CleanupFailedUploadRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let response = state
        .tracker
        .cleanup_failed_upload(&user.0, request)
        .await?;
    Ok(Json(response))
}
