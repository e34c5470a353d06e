//! Error types module
//!
//! Every failure in vidsub is expressed as a [`VideoError`]. The variants form a flat,
//! tagged taxonomy: validation and auth failures are terminal, throttling and network
//! failures are transient, and [`VideoError::MaxRetriesExceeded`] wraps the last
//! transient failure once the retry budget is spent.
//!
//! The [`ErrorMetadata`] trait tells the HTTP boundary how each variant is presented
//! (status, stable machine code, retry flag, suggestions).

use crate::models::UploadStatus;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like throttling
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "rate_limit")
    fn error_code(&self) -> &'static str;

    /// Whether the client may retry the same request later
    fn retry_allowed(&self) -> bool;

    /// Suggested next steps for the client
    fn suggestions(&self) -> Vec<String>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden from clients
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum VideoError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The remote store rejected the service's own credentials.
    #[error("Remote store rejected credentials: {0}")]
    RemoteAuth(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Throttled by remote store: {message}")]
    Throttled {
        message: String,
        retry_after: Option<u64>,
    },

    #[error("Rate limit exceeded for {scope}, retry after {retry_after}s")]
    RateLimited { scope: String, retry_after: u64 },

    #[error("Network error: {0}")]
    TransientNetwork(String),

    #[error("{operation} failed after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded {
        operation: String,
        attempts: u32,
        last_error: Box<VideoError>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid response from remote store: {0}")]
    InvalidResponse(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: UploadStatus, to: UploadStatus },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type VideoResult<T> = Result<T, VideoError>;

impl VideoError {
    /// Whether retrying the same operation might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            VideoError::Throttled { .. } | VideoError::TransientNetwork(_) => true,
            VideoError::MaxRetriesExceeded { last_error, .. } => last_error.is_transient(),
            _ => false,
        }
    }

    /// Remote "object is already gone". Cleanup and replacement treat it as success.
    pub fn is_not_found(&self) -> bool {
        match self {
            VideoError::NotFound(_) => true,
            VideoError::MaxRetriesExceeded { last_error, .. } => last_error.is_not_found(),
            _ => false,
        }
    }

    /// Seconds the caller should wait, when the error carries that information.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            VideoError::RateLimited { retry_after, .. } => Some(*retry_after),
            VideoError::Throttled { retry_after, .. } => *retry_after,
            VideoError::MaxRetriesExceeded { last_error, .. } => last_error.retry_after(),
            _ => None,
        }
    }

    /// Short variant name used in logs.
    pub fn error_type(&self) -> &'static str {
        match self {
            VideoError::Validation(_) => "Validation",
            VideoError::Auth(_) => "Auth",
            VideoError::RemoteAuth(_) => "RemoteAuth",
            VideoError::PermissionDenied(_) => "PermissionDenied",
            VideoError::InvalidIdentifier(_) => "InvalidIdentifier",
            VideoError::NotFound(_) => "NotFound",
            VideoError::Throttled { .. } => "Throttled",
            VideoError::RateLimited { .. } => "RateLimited",
            VideoError::TransientNetwork(_) => "TransientNetwork",
            VideoError::MaxRetriesExceeded { .. } => "MaxRetriesExceeded",
            VideoError::Config(_) => "Config",
            VideoError::InvalidResponse(_) => "InvalidResponse",
            VideoError::InvalidTransition { .. } => "InvalidTransition",
            VideoError::Database(_) => "Database",
            VideoError::Internal(_) => "Internal",
        }
    }

    /// Retry exhaustion on a throttled call is shown to users as a rate limit.
    fn exhausted_by_throttling(&self) -> bool {
        matches!(
            self,
            VideoError::MaxRetriesExceeded { last_error, .. }
                if matches!(**last_error, VideoError::Throttled { .. })
        )
    }
}

impl From<anyhow::Error> for VideoError {
    fn from(err: anyhow::Error) -> Self {
        VideoError::Internal(format!("{:#}", err))
    }
}

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for VideoError {
    fn from(err: sqlx::Error) -> Self {
        VideoError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for VideoError {
    fn from(err: serde_json::Error) -> Self {
        VideoError::InvalidResponse(format!("JSON parsing error: {}", err))
    }
}

impl From<validator::ValidationErrors> for VideoError {
    fn from(err: validator::ValidationErrors) -> Self {
        VideoError::Validation(err.to_string())
    }
}

fn suggest(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl ErrorMetadata for VideoError {
    fn http_status_code(&self) -> u16 {
        if self.exhausted_by_throttling() {
            return 429;
        }
        match self {
            VideoError::Validation(_) | VideoError::InvalidIdentifier(_) => 400,
            VideoError::Auth(_) => 401,
            VideoError::PermissionDenied(_) => 403,
            VideoError::NotFound(_) => 404,
            VideoError::InvalidTransition { .. } => 409,
            VideoError::Throttled { .. } | VideoError::RateLimited { .. } => 429,
            VideoError::InvalidResponse(_) => 502,
            VideoError::TransientNetwork(_)
            | VideoError::MaxRetriesExceeded { .. }
            | VideoError::Config(_)
            | VideoError::RemoteAuth(_) => 503,
            VideoError::Database(_) | VideoError::Internal(_) => 500,
        }
    }

    fn error_code(&self) -> &'static str {
        if self.exhausted_by_throttling() {
            return "rate_limit";
        }
        match self {
            VideoError::Validation(_) => "validation_error",
            VideoError::Auth(_) => "auth_error",
            VideoError::PermissionDenied(_) => "permission_error",
            VideoError::InvalidIdentifier(_) => "invalid_identifier",
            VideoError::NotFound(_) => "not_found",
            VideoError::Throttled { .. } | VideoError::RateLimited { .. } => "rate_limit",
            VideoError::TransientNetwork(_) => "network_error",
            VideoError::MaxRetriesExceeded { .. } => "max_retries_exceeded",
            VideoError::Config(_) | VideoError::RemoteAuth(_) => "config_error",
            VideoError::InvalidResponse(_) => "invalid_response",
            VideoError::InvalidTransition { .. } => "invalid_state_transition",
            VideoError::Database(_) => "database_error",
            VideoError::Internal(_) => "server_error",
        }
    }

    fn retry_allowed(&self) -> bool {
        match self {
            VideoError::Throttled { .. }
            | VideoError::RateLimited { .. }
            | VideoError::TransientNetwork(_)
            | VideoError::MaxRetriesExceeded { .. }
            | VideoError::InvalidResponse(_)
            | VideoError::Database(_)
            | VideoError::Internal(_) => true,
            VideoError::Validation(_)
            | VideoError::Auth(_)
            | VideoError::PermissionDenied(_)
            | VideoError::InvalidIdentifier(_)
            | VideoError::NotFound(_)
            | VideoError::Config(_)
            | VideoError::RemoteAuth(_)
            | VideoError::InvalidTransition { .. } => false,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        if self.exhausted_by_throttling() {
            return suggest(&["Wait a few minutes before trying again"]);
        }
        match self {
            VideoError::Validation(_) => suggest(&[
                "Check the file type and size",
                "Videos must be shorter than the configured maximum duration",
            ]),
            VideoError::Auth(_) => suggest(&["Sign in again and retry"]),
            VideoError::PermissionDenied(_) => {
                suggest(&["Ask your teacher or an administrator for access"])
            }
            VideoError::InvalidIdentifier(_) => suggest(&[
                "Reload the page to refresh the submission",
                "Upload the video again if the problem persists",
            ]),
            VideoError::NotFound(_) => suggest(&["Upload the video again"]),
            VideoError::RateLimited { .. } | VideoError::Throttled { .. } => {
                suggest(&["Wait before making another request"])
            }
            VideoError::TransientNetwork(_) | VideoError::MaxRetriesExceeded { .. } => suggest(&[
                "Check your connection",
                "Try again in a few minutes",
            ]),
            VideoError::Config(_) | VideoError::RemoteAuth(_) => {
                suggest(&["Contact your site administrator"])
            }
            VideoError::InvalidResponse(_) => suggest(&["Try again in a few minutes"]),
            VideoError::InvalidTransition { .. } => {
                suggest(&["Reload the page to see the current upload status"])
            }
            VideoError::Database(_) | VideoError::Internal(_) => {
                suggest(&["Try again", "Contact support if this error persists"])
            }
        }
    }

    fn client_message(&self) -> String {
        if self.exhausted_by_throttling() {
            return "The video service is busy. Please try again later.".to_string();
        }
        match self {
            VideoError::Validation(msg) => msg.clone(),
            VideoError::Auth(_) => "Authentication failed".to_string(),
            VideoError::RemoteAuth(_) => "The video service is unavailable".to_string(),
            VideoError::PermissionDenied(_) => {
                "You do not have permission to access this video".to_string()
            }
            VideoError::InvalidIdentifier(msg) => msg.clone(),
            VideoError::NotFound(msg) => msg.clone(),
            VideoError::Throttled { .. } => {
                "The video service is busy. Please try again later.".to_string()
            }
            VideoError::RateLimited { retry_after, .. } => format!(
                "Too many requests. Please wait {} seconds before trying again.",
                retry_after
            ),
            VideoError::TransientNetwork(_) => {
                "Could not reach the video service. Please try again.".to_string()
            }
            VideoError::MaxRetriesExceeded { .. } => {
                "The video service did not respond after several attempts".to_string()
            }
            VideoError::Config(_) => "The video service is not configured".to_string(),
            VideoError::InvalidResponse(_) => {
                "The video service returned an unexpected response".to_string()
            }
            VideoError::InvalidTransition { from, to } => {
                format!("Cannot change upload status from {} to {}", from, to)
            }
            VideoError::Database(_) | VideoError::Internal(_) => {
                "An internal error occurred".to_string()
            }
        }
    }

    fn is_sensitive(&self) -> bool {
        matches!(
            self,
            VideoError::Database(_)
                | VideoError::Internal(_)
                | VideoError::Config(_)
                | VideoError::RemoteAuth(_)
                | VideoError::Auth(_)
        )
    }

    fn log_level(&self) -> LogLevel {
        match self {
            VideoError::Validation(_)
            | VideoError::PermissionDenied(_)
            | VideoError::InvalidIdentifier(_)
            | VideoError::NotFound(_)
            | VideoError::InvalidTransition { .. } => LogLevel::Debug,
            VideoError::RateLimited { .. }
            | VideoError::Throttled { .. }
            | VideoError::TransientNetwork(_) => LogLevel::Warn,
            VideoError::Auth(_)
            | VideoError::RemoteAuth(_)
            | VideoError::MaxRetriesExceeded { .. }
            | VideoError::Config(_)
            | VideoError::InvalidResponse(_)
            | VideoError::Database(_)
            | VideoError::Internal(_) => LogLevel::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_error_code_is_stable() {
        let err = VideoError::PermissionDenied("not owner".to_string());
        assert_eq!(err.http_status_code(), 403);
        assert_eq!(err.error_code(), "permission_error");
        assert!(!err.retry_allowed());
    }

    #[test]
    fn exhausted_throttling_surfaces_as_rate_limit() {
        let err = VideoError::MaxRetriesExceeded {
            operation: "get_object_metadata".to_string(),
            attempts: 4,
            last_error: Box::new(VideoError::Throttled {
                message: "429".to_string(),
                retry_after: Some(30),
            }),
        };
        assert_eq!(err.http_status_code(), 429);
        assert_eq!(err.error_code(), "rate_limit");
        assert_eq!(err.retry_after(), Some(30));
        assert!(err.is_transient());
    }

    #[test]
    fn exhausted_network_is_service_unavailable() {
        let err = VideoError::MaxRetriesExceeded {
            operation: "delete_object".to_string(),
            attempts: 4,
            last_error: Box::new(VideoError::TransientNetwork("timeout".to_string())),
        };
        assert_eq!(err.http_status_code(), 503);
        assert_eq!(err.error_code(), "max_retries_exceeded");
        assert!(err.to_string().contains("delete_object"));
    }

    #[test]
    fn remote_credential_failure_is_not_a_caller_auth_error() {
        let err = VideoError::RemoteAuth("invalid API token".to_string());
        assert_eq!(err.http_status_code(), 503);
        assert_eq!(err.error_code(), "config_error");
        assert!(!err.retry_allowed());
        assert!(err.is_sensitive());
        assert!(!err.client_message().contains("API token"));
        assert_eq!(err.suggestions(), vec!["Contact your site administrator"]);

        assert_eq!(VideoError::Auth("expired".to_string()).http_status_code(), 401);
    }

    #[test]
    fn internal_errors_are_hidden() {
        let err = VideoError::Database("connection refused".to_string());
        assert!(err.is_sensitive());
        assert!(!err.client_message().contains("connection refused"));
        assert_eq!(err.error_code(), "database_error");
    }

    #[test]
    fn not_found_seen_through_retry_wrapper() {
        let err = VideoError::MaxRetriesExceeded {
            operation: "delete_object".to_string(),
            attempts: 1,
            last_error: Box::new(VideoError::NotFound("gone".to_string())),
        };
        assert!(err.is_not_found());
    }
}
