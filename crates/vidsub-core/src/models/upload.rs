//! Upload record and its lifecycle state machine.
//!
//! ```text
//! pending ──► uploading ──► ready ──► deleted
//!    │            │                      ▲
//!    └────────────┴──────► error ────────┘
//!                            │
//!                            └──► pending   (explicit user retry only)
//! ```

use crate::error::{VideoError, VideoResult};
use crate::storage_types::StorageBackend;
use crate::validation::sanitize_error_message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Uploading,
    Ready,
    Error,
    Deleted,
}

impl UploadStatus {
    /// Whether `self -> to` is an edge of the lifecycle graph.
    ///
    /// `uploading -> uploading` is allowed so repeated confirmations while the
    /// remote store is still processing are not rejected.
    pub fn can_transition_to(self, to: UploadStatus) -> bool {
        use UploadStatus::*;
        matches!(
            (self, to),
            (Pending, Uploading)
                | (Pending, Ready)
                | (Uploading, Uploading)
                | (Uploading, Ready)
                | (Pending, Error)
                | (Uploading, Error)
                | (Ready, Deleted)
                | (Error, Deleted)
                | (Error, Pending)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == UploadStatus::Deleted
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UploadStatus::Pending => "pending",
            UploadStatus::Uploading => "uploading",
            UploadStatus::Ready => "ready",
            UploadStatus::Error => "error",
            UploadStatus::Deleted => "deleted",
        }
    }
}

impl Display for UploadStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for UploadStatus {
    type Err = VideoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(UploadStatus::Pending),
            "uploading" => Ok(UploadStatus::Uploading),
            "ready" => Ok(UploadStatus::Ready),
            "error" => Ok(UploadStatus::Error),
            "deleted" => Ok(UploadStatus::Deleted),
            other => Err(VideoError::Internal(format!(
                "Unknown upload status in store: {}",
                other
            ))),
        }
    }
}

/// One video attached to one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub id: Uuid,
    pub submission_id: i64,
    pub assignment_id: i64,
    /// Owner of the submission.
    pub user_id: i64,
    pub backend: StorageBackend,
    pub remote_key: String,
    pub status: UploadStatus,
    pub file_size: Option<i64>,
    pub duration_seconds: Option<i64>,
    pub uploaded_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields a confirmation or sweep may change. Applied all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordUpdate {
    pub status: Option<UploadStatus>,
    pub file_size: Option<i64>,
    pub duration_seconds: Option<i64>,
    pub error_message: Option<String>,
}

impl RecordUpdate {
    pub fn status(status: UploadStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn with_file_size(mut self, size: Option<i64>) -> Self {
        self.file_size = size;
        self
    }

    pub fn with_duration(mut self, duration: Option<i64>) -> Self {
        self.duration_seconds = duration;
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

impl UploadRecord {
    /// A fresh record for a newly issued upload session.
    pub fn new_pending(
        submission_id: i64,
        assignment_id: i64,
        user_id: i64,
        backend: StorageBackend,
        remote_key: impl Into<String>,
        now: DateTime<Utc>,
    ) -> VideoResult<Self> {
        let remote_key = remote_key.into();
        if remote_key.trim().is_empty() {
            return Err(VideoError::InvalidResponse(
                "Remote store returned an empty video identifier".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            submission_id,
            assignment_id,
            user_id,
            backend,
            remote_key,
            status: UploadStatus::Pending,
            file_size: None,
            duration_seconds: None,
            uploaded_at: None,
            deleted_at: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Validate `update` against this record and return the resulting record.
    ///
    /// `self` is untouched on error, so a failed validation never produces a
    /// partially written record.
    pub fn applied(&self, update: RecordUpdate, now: DateTime<Utc>) -> VideoResult<Self> {
        if let Some(size) = update.file_size {
            if size < 0 {
                return Err(VideoError::Validation(format!(
                    "File size must not be negative (got {})",
                    size
                )));
            }
        }
        if let Some(duration) = update.duration_seconds {
            if duration < 0 {
                return Err(VideoError::Validation(format!(
                    "Duration must not be negative (got {})",
                    duration
                )));
            }
        }

        let mut next = self.clone();
        if let Some(to) = update.status {
            if to != self.status || to == UploadStatus::Uploading {
                if !self.status.can_transition_to(to) {
                    return Err(VideoError::InvalidTransition {
                        from: self.status,
                        to,
                    });
                }
                next.status = to;
            }
            match to {
                UploadStatus::Pending => next.error_message = None,
                UploadStatus::Ready | UploadStatus::Error => {
                    if next.uploaded_at.is_none() {
                        next.uploaded_at = Some(now);
                    }
                }
                UploadStatus::Deleted => next.deleted_at = Some(now),
                UploadStatus::Uploading => {}
            }
            if to == UploadStatus::Ready {
                next.error_message = None;
            }
        }
        if next.status.is_terminal() && self.status.is_terminal() {
            return Err(VideoError::InvalidTransition {
                from: self.status,
                to: update.status.unwrap_or(self.status),
            });
        }

        if update.file_size.is_some() {
            next.file_size = update.file_size;
        }
        if update.duration_seconds.is_some() {
            next.duration_seconds = update.duration_seconds;
        }
        if let Some(message) = update.error_message {
            next.error_message = Some(sanitize_error_message(&message));
        }
        next.updated_at = now;
        Ok(next)
    }

    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.user_id == user_id
    }
}

/// Client view of an upload record.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadRecordView {
    pub submission_id: i64,
    pub assignment_id: i64,
    pub remote_key: String,
    pub status: UploadStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl From<&UploadRecord> for UploadRecordView {
    fn from(record: &UploadRecord) -> Self {
        Self {
            submission_id: record.submission_id,
            assignment_id: record.assignment_id,
            remote_key: record.remote_key.clone(),
            status: record.status,
            file_size: record.file_size,
            duration_seconds: record.duration_seconds,
            uploaded_at: record.uploaded_at,
            deleted_at: record.deleted_at,
            error_message: record.error_message.clone(),
        }
    }
}
