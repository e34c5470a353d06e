//! Remote storage abstraction
//!
//! Every backend implements [`RemoteStorage`]. Callers wrap these calls in the
//! retry engine, so implementations make exactly one attempt and report what
//! went wrong through [`StorageError`].

use crate::StorageBackend;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use vidsub_core::models::CredentialKind;
use vidsub_core::VideoError;

/// Storage operation errors
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("Remote store rejected credentials: {0}")]
    Auth(String),

    #[error("Remote object not found: {0}")]
    NotFound(String),

    #[error("Remote store throttled the request: {message}")]
    Throttled {
        message: String,
        retry_after: Option<u64>,
    },

    #[error("Remote store returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected response from remote store: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Invalid remote key: {0}")]
    InvalidKey(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Signing failed: {0}")]
    Signing(String),
}

impl StorageError {
    /// Transport failures, throttling and server-side errors are worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            StorageError::Network(_) | StorageError::Throttled { .. } => true,
            StorageError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Map a non-success HTTP status to an error.
    pub fn from_status(status: u16, message: String, retry_after: Option<u64>) -> Self {
        match status {
            401 | 403 => StorageError::Auth(message),
            404 => StorageError::NotFound(message),
            429 => StorageError::Throttled {
                message,
                retry_after,
            },
            _ => StorageError::Http { status, message },
        }
    }
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            StorageError::Network(err.to_string())
        } else if err.is_decode() {
            StorageError::InvalidResponse(err.to_string())
        } else if let Some(status) = err.status() {
            StorageError::from_status(status.as_u16(), err.to_string(), None)
        } else {
            StorageError::Network(err.to_string())
        }
    }
}

impl From<StorageError> for VideoError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Auth(msg) => VideoError::RemoteAuth(msg),
            StorageError::NotFound(msg) => VideoError::NotFound(msg),
            StorageError::Throttled {
                message,
                retry_after,
            } => VideoError::Throttled {
                message,
                retry_after,
            },
            StorageError::Http { status, message } if status >= 500 => {
                VideoError::TransientNetwork(format!("HTTP {}: {}", status, message))
            }
            StorageError::Http { status, message } => {
                VideoError::InvalidResponse(format!("HTTP {}: {}", status, message))
            }
            StorageError::Network(msg) => VideoError::TransientNetwork(msg),
            StorageError::InvalidResponse(msg) => VideoError::InvalidResponse(msg),
            StorageError::Validation(msg) => VideoError::Validation(msg),
            StorageError::InvalidKey(msg) => VideoError::InvalidIdentifier(msg),
            StorageError::ConfigError(msg) => VideoError::Config(msg),
            StorageError::Signing(msg) => VideoError::Internal(format!("Signing failed: {}", msg)),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Parameters for a new direct-upload session.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadSessionSpec {
    pub submission_id: i64,
    pub assignment_id: i64,
    pub user_id: i64,
    pub mime_type: Option<String>,
    pub file_size: Option<u64>,
    pub max_duration_seconds: u32,
}

/// Where the client sends the bytes, and how we refer to the object afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadTarget {
    pub upload_url: String,
    pub remote_key: String,
}

/// Processing state reported by the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteState {
    Ready,
    Processing,
    Error,
    Unknown(String),
}

impl RemoteState {
    /// Cloudflare Stream `status.state` values.
    pub fn from_stream_state(state: &str) -> Self {
        match state.to_ascii_lowercase().as_str() {
            "ready" => RemoteState::Ready,
            "queued" | "inprogress" | "pendingupload" | "downloading" => RemoteState::Processing,
            "error" => RemoteState::Error,
            other => RemoteState::Unknown(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteObjectMetadata {
    pub size_bytes: Option<i64>,
    pub duration_seconds: Option<f64>,
    pub content_type: Option<String>,
    pub state: RemoteState,
    /// Human-readable failure reason when `state` is `Error`.
    pub error_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackCredential {
    pub kind: CredentialKind,
    pub value: String,
    pub playback_url: Option<String>,
    pub expires_in_seconds: u64,
}

/// Remote video/object store abstraction
#[async_trait]
pub trait RemoteStorage: Send + Sync {
    /// Issue a direct-upload target for the client.
    async fn create_upload_session(&self, spec: &UploadSessionSpec)
        -> StorageResult<UploadTarget>;

    /// Size, duration and processing state of an uploaded object.
    async fn get_object_metadata(&self, remote_key: &str) -> StorageResult<RemoteObjectMetadata>;

    /// Delete an object. `NotFound` when it is already gone.
    async fn delete_object(&self, remote_key: &str) -> StorageResult<()>;

    /// Time-limited playback credential. `ttl` must be in (0, 7 days]; out of
    /// range values are rejected before any network call.
    async fn generate_playback_credential(
        &self,
        remote_key: &str,
        ttl: Duration,
    ) -> StorageResult<PlaybackCredential>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
