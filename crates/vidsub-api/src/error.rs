//! HTTP error response conversion
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>`. Every [`VideoError`]
//! renders as the same JSON shape: a human message, a stable machine code, a
//! retry flag and suggested next steps, plus `Retry-After` when known.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::{header, request::Parts, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Serialize};
use utoipa::ToSchema;
use vidsub_core::{ErrorMetadata, LogLevel, VideoError};

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    /// Machine-readable error code for programmatic handling
    pub code: String,
    /// Whether the same request may succeed if retried later
    pub retry_allowed: bool,
    pub suggestions: Vec<String>,
    /// Seconds to wait before retrying, for rate limits
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

/// Wrapper type for VideoError to implement IntoResponse
/// This is necessary because of Rust's orphan rules - we can't implement
/// IntoResponse (external trait) for VideoError (external type from vidsub-core)
#[derive(Debug)]
pub struct HttpAppError(pub VideoError);

impl From<VideoError> for HttpAppError {
    fn from(err: VideoError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(VideoError::from(err))
    }
}

impl From<validator::ValidationErrors> for HttpAppError {
    fn from(err: validator::ValidationErrors) -> Self {
        HttpAppError(VideoError::from(err))
    }
}

/// Convert JSON body deserialization failures into a 400 with our ErrorResponse format.
impl From<JsonRejection> for HttpAppError {
    fn from(rejection: JsonRejection) -> Self {
        HttpAppError(VideoError::Validation(format!(
            "Invalid request body: {}",
            rejection.body_text()
        )))
    }
}

impl From<QueryRejection> for HttpAppError {
    fn from(rejection: QueryRejection) -> Self {
        HttpAppError(VideoError::Validation(format!(
            "Invalid query string: {}",
            rejection.body_text()
        )))
    }
}

/// JSON body extractor that returns our ErrorResponse format (400 + JSON) on deserialization failure.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = HttpAppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(inner) = Json::<T>::from_request(req, state)
            .await
            .map_err(HttpAppError::from)?;
        Ok(ValidatedJson(inner))
    }
}

/// Query extractor with the same error shape as [`ValidatedJson`].
#[derive(Debug, Clone, Copy)]
pub struct ValidatedQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(inner) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(HttpAppError::from)?;
        Ok(ValidatedQuery(inner))
    }
}

fn log_error(error: &VideoError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_type = error_type, "Error occurred");
        }
    }
}

fn is_production_env() -> bool {
    std::env::var("ENVIRONMENT")
        .or_else(|_| std::env::var("APP_ENV"))
        .map(|env| env.to_lowercase() == "production" || env.to_lowercase() == "prod")
        .unwrap_or(false)
}

impl HttpAppError {
    pub fn to_error_response(&self, include_details: bool) -> ErrorResponse {
        let err = &self.0;
        let (details, error_type) = if include_details && !err.is_sensitive() {
            (Some(err.to_string()), Some(err.error_type().to_string()))
        } else {
            (None, None)
        };
        ErrorResponse {
            error: err.client_message(),
            code: err.error_code().to_string(),
            retry_allowed: err.retry_allowed(),
            suggestions: err.suggestions(),
            retry_after: err.retry_after(),
            details,
            error_type,
        }
    }
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(&self.0);

        // Details are never shown in production, nor for sensitive errors anywhere.
        let body = self.to_error_response(!is_production_env());
        let retry_after = body.retry_after;

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
