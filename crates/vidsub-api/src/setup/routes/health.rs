//! Health check handlers.

use crate::constants::READINESS_TIMEOUT_SECS;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;
use std::time::Duration;

/// Liveness probe - process is running.
pub async fn liveness_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "alive" })),
    )
}

/// Readiness probe - the record store answers.
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let timeout = Duration::from_secs(READINESS_TIMEOUT_SECS);
    let mut response = serde_json::json!({
        "status": "ready",
        "database": "unknown",
        "storage": state.storage.backend_type().to_string(),
    });

    let ready = match tokio::time::timeout(timeout, state.records.ping()).await {
        Ok(Ok(())) => {
            response["database"] = serde_json::json!("ready");
            true
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Database readiness check failed");
            response["database"] = serde_json::json!("not_ready");
            false
        }
        Err(_) => {
            tracing::error!("Database readiness check timed out");
            response["database"] = serde_json::json!("timeout");
            false
        }
    };

    if !ready {
        response["status"] = serde_json::json!("not_ready");
        return (StatusCode::SERVICE_UNAVAILABLE, Json(response));
    }
    (StatusCode::OK, Json(response))
}
