use crate::auth::CurrentUser;
use crate::constants::AUDIT_QUERY_LIMIT;
use crate::error::{ErrorResponse, HttpAppError, ValidatedQuery};
use crate::state::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;
use vidsub_core::models::AuditLogEntry;
use vidsub_core::VideoError;

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AuditQuery {
    pub submission_id: i64,
    /// At most 100 entries are returned.
    pub limit: Option<i64>,
}

/// Audit trail for one submission, newest first
///
/// Graders of the submission's assignment and site admins only. Once the
/// upload record is gone, only site admins may read its trail.
#[utoipa::path(
    get,
    path = "/api/v1/audit",
    tag = "audit",
    params(AuditQuery),
    responses(
        (status = 200, description = "Audit entries", body = [AuditLogEntry]),
        (status = 403, description = "Not a grader of this assignment", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, user, query), fields(user_id = user.0.user_id, submission_id = query.submission_id))]
pub async fn list_audit_entries(
    user: CurrentUser,
    State(state): State<Arc<AppState>>,
    ValidatedQuery(query): ValidatedQuery<AuditQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let principal = &user.0;
    let allowed = match state.records.get_by_submission(query.submission_id).await? {
        Some(record) => principal.can_grade(record.assignment_id),
        None => principal.is_site_admin(),
    };
    if !allowed {
        return Err(VideoError::PermissionDenied(format!(
            "User {} may not read the audit trail of submission {}",
            principal.user_id, query.submission_id
        ))
        .into());
    }

    let limit = query
        .limit
        .unwrap_or(AUDIT_QUERY_LIMIT)
        .clamp(1, AUDIT_QUERY_LIMIT);
    let entries = state
        .audit_store
        .list_by_submission(query.submission_id, limit)
        .await?;
    Ok(Json(entries))
}
