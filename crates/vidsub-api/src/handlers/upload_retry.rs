use crate::auth::CurrentUser;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use std::sync::Arc;
use vidsub_core::models::{RetryUploadRequest, UploadSessionResponse};

/// Start a new upload for a submission whose previous upload failed
#[utoipa::path(
    post,
    path = "/api/v1/retry-upload",
    tag = "uploads",
    request_body = RetryUploadRequest,
    responses(
        (status = 200, description = "New upload session issued", body = UploadSessionResponse),
        (status = 404, description = "No upload for this submission", body = ErrorResponse),
        (status = 409, description = "Upload is not in the error state", body = ErrorResponse),
        (status = 429, description = "Too many upload requests", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(
    skip(state, user, request),
    fields(user_id = user.0.user_id, submission_id = request.submission_id, operation = "retry_upload")
)]
pub async fn retry_upload(
    user: CurrentUser,
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<RetryUploadRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let response = state.tracker.retry_upload(&user.0, request).await?;
    Ok(Json(response))
}
