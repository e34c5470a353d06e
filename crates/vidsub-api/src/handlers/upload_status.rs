use crate::auth::CurrentUser;
use crate::error::{ErrorResponse, HttpAppError, ValidatedQuery};
use crate::state::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use std::sync::Arc;
use vidsub_core::models::{UploadRecordView, UploadStatusQuery};

/// Current state of a submission's video
#[utoipa::path(
    get,
    path = "/api/v1/upload-status",
    tag = "uploads",
    params(UploadStatusQuery),
    responses(
        (status = 200, description = "Upload record", body = UploadRecordView),
        (status = 403, description = "Not allowed to view this submission", body = ErrorResponse),
        (status = 404, description = "No upload for this submission", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, user, query), fields(user_id = user.0.user_id, submission_id = query.submission_id))]
pub async fn get_upload_status(
    user: CurrentUser,
    State(state): State<Arc<AppState>>,
    ValidatedQuery(query): ValidatedQuery<UploadStatusQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let view = state
        .tracker
        .get_status(&user.0, query.submission_id)
        .await?;
    Ok(Json(view))
}
