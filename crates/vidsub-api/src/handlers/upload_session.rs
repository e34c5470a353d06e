use crate::auth::CurrentUser;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use std::sync::Arc;
use vidsub_core::models::{UploadSessionRequest, UploadSessionResponse};

/// Request a direct-upload URL for a submission video
///
/// Any earlier video attached to the submission is replaced.
#[utoipa::path(
    post,
    path = "/api/v1/upload-session",
    tag = "uploads",
    request_body = UploadSessionRequest,
    responses(
        (status = 200, description = "Upload session issued", body = UploadSessionResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Submission belongs to another user", body = ErrorResponse),
        (status = 429, description = "Too many upload requests", body = ErrorResponse),
        (status = 503, description = "Video service unavailable", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(
    skip(state, user, request),
    fields(
        user_id = user.0.user_id,
        assignment_id = request.assignment_id,
        submission_id = ?request.submission_id,
        operation = "request_upload_session"
    )
)]
pub async fn request_upload_session(
    user: CurrentUser,
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<UploadSessionRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let response = state
        .tracker
        .request_upload_session(&user.0, request)
        .await?;
    Ok(Json(response))
}
