use crate::auth::CurrentUser;
use crate::error::{ErrorResponse, HttpAppError, ValidatedQuery};
use crate::state::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use std::sync::Arc;
use vidsub_core::models::{PlaybackCredentialQuery, PlaybackCredentialResponse};

/// Issue a short-lived playback credential
///
/// Owners may watch their own video; graders of the assignment and site
/// admins may watch any submission's video.
#[utoipa::path(
    get,
    path = "/api/v1/playback-credential",
    tag = "playback",
    params(PlaybackCredentialQuery),
    responses(
        (status = 200, description = "Signed credential", body = PlaybackCredentialResponse),
        (status = 400, description = "Unknown video, or video not ready", body = ErrorResponse),
        (status = 403, description = "Not allowed to view this video", body = ErrorResponse),
        (status = 429, description = "Too many playback requests", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(
    skip(state, user, query),
    fields(user_id = user.0.user_id, submission_id = query.submission_id, remote_key = %query.remote_key)
)]
pub async fn get_playback_credential(
    user: CurrentUser,
    State(state): State<Arc<AppState>>,
    ValidatedQuery(query): ValidatedQuery<PlaybackCredentialQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let response = state.playback.issue_credential(&user.0, query).await?;
    Ok(Json(response))
}
