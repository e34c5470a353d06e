use crate::auth::CurrentUser;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use std::sync::Arc;
use vidsub_core::models::{ConfirmUploadRequest, ConfirmUploadResponse};

/// Confirm a finished upload and record its size and duration
#[utoipa::path(
    post,
    path = "/api/v1/confirm-upload",
    tag = "uploads",
    request_body = ConfirmUploadRequest,
    responses(
        (status = 200, description = "Current upload status", body = ConfirmUploadResponse),
        (status = 400, description = "Unknown submission or video identifier", body = ErrorResponse),
        (status = 403, description = "Submission belongs to another user", body = ErrorResponse),
        (status = 409, description = "Upload was already deleted", body = ErrorResponse),
        (status = 503, description = "Video service unavailable", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(
    skip(state, user, request),
    fields(user_id = user.0.user_id, submission_id = request.submission_id, operation = "confirm_upload")
)]
pub async fn confirm_upload(
    user: CurrentUser,
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<ConfirmUploadRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let response = state.tracker.confirm_upload(&user.0, request).await?;
    Ok(Json(response))
}
