//! Route configuration and setup.
//!
//! Health checks live in [health](health).

mod health;

use crate::constants::API_PREFIX;
use crate::handlers;
use crate::state::AppState;
use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use vidsub_core::Config;

/// Request bodies are small JSON documents; video bytes go straight to the remote store.
const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;
    tracing::info!(
        http_concurrency_limit = config.http_concurrency_limit(),
        "HTTP concurrency limit layer enabled"
    );

    let protected_routes =
        protected_routes(state.clone()).layer(axum::middleware::from_fn_with_state(
            state.auth.clone(),
            crate::auth::middleware::auth_middleware,
        ));

    let app = public_routes(state.clone())
        .merge(protected_routes)
        .merge(utoipa_rapidoc::RapiDoc::new("/api/openapi.json").path("/docs"))
        .layer(ConcurrencyLimitLayer::new(config.http_concurrency_limit()))
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(app)
}

fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [Method::GET, Method::POST, Method::OPTIONS];
    let cors = if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins()
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    };
    Ok(cors)
}

/// Public routes (no authentication required)
fn public_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::liveness_check))
        .route("/health/ready", get(health::readiness_check))
        .route(
            "/api/openapi.json",
            get(|| async { Json(crate::api_doc::get_openapi_spec()) }),
        )
        .with_state(state)
}

/// Protected routes (require a bearer token).
fn protected_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/upload-session", API_PREFIX),
            post(handlers::upload_session::request_upload_session),
        )
        .route(
            &format!("{}/confirm-upload", API_PREFIX),
            post(handlers::upload_confirm::confirm_upload),
        )
        .route(
            &format!("{}/retry-upload", API_PREFIX),
            post(handlers::upload_retry::retry_upload),
        )
        .route(
            &format!("{}/cleanup-failed-upload", API_PREFIX),
            post(handlers::upload_cleanup::cleanup_failed_upload),
        )
        .route(
            &format!("{}/upload-status", API_PREFIX),
            get(handlers::upload_status::get_upload_status),
        )
        .route(
            &format!("{}/playback-credential", API_PREFIX),
            get(handlers::playback::get_playback_credential),
        )
        .route(
            &format!("{}/audit", API_PREFIX),
            get(handlers::audit::list_audit_entries),
        )
        .route(
            &format!("{}/privacy/erase", API_PREFIX),
            post(handlers::privacy::erase_user_data),
        )
        .with_state(state)
}
