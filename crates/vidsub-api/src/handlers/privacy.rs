use crate::auth::CurrentUser;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use std::sync::Arc;
use validator::Validate;
use vidsub_core::models::{PrivacyEraseRequest, PrivacyEraseResponse};

/// Erase every video, record and audit entry belonging to a user
#[utoipa::path(
    post,
    path = "/api/v1/privacy/erase",
    tag = "privacy",
    request_body = PrivacyEraseRequest,
    responses(
        (status = 200, description = "Erasure summary", body = PrivacyEraseResponse),
        (status = 403, description = "Site admins only", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, user, request), fields(actor_id = user.0.user_id, target_user_id = request.user_id))]
pub async fn erase_user_data(
    user: CurrentUser,
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<PrivacyEraseRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    request.validate()?;
    let response = state.privacy.erase(&user.0, request.user_id).await?;
    Ok(Json(response))
}
