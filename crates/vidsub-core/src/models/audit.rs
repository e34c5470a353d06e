//! Audit trail entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::VideoError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    UploadRequested,
    UploadConfirmed,
    UploadFailed,
    UploadRetried,
    UploadCleanedUp,
    PlaybackAccess,
    VideoDeleted,
    ReplacementDeleteFailed,
    UnknownRemoteState,
    CleanupSummary,
    PrivacyErasure,
    ApiError,
}

impl AuditEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditEventType::UploadRequested => "upload_requested",
            AuditEventType::UploadConfirmed => "upload_confirmed",
            AuditEventType::UploadFailed => "upload_failed",
            AuditEventType::UploadRetried => "upload_retried",
            AuditEventType::UploadCleanedUp => "upload_cleaned_up",
            AuditEventType::PlaybackAccess => "playback_access",
            AuditEventType::VideoDeleted => "video_deleted",
            AuditEventType::ReplacementDeleteFailed => "replacement_delete_failed",
            AuditEventType::UnknownRemoteState => "unknown_remote_state",
            AuditEventType::CleanupSummary => "cleanup_summary",
            AuditEventType::PrivacyErasure => "privacy_erasure",
            AuditEventType::ApiError => "api_error",
        }
    }
}

impl Display for AuditEventType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditEventType {
    type Err = VideoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let event = match s {
            "upload_requested" => AuditEventType::UploadRequested,
            "upload_confirmed" => AuditEventType::UploadConfirmed,
            "upload_failed" => AuditEventType::UploadFailed,
            "upload_retried" => AuditEventType::UploadRetried,
            "upload_cleaned_up" => AuditEventType::UploadCleanedUp,
            "playback_access" => AuditEventType::PlaybackAccess,
            "video_deleted" => AuditEventType::VideoDeleted,
            "replacement_delete_failed" => AuditEventType::ReplacementDeleteFailed,
            "unknown_remote_state" => AuditEventType::UnknownRemoteState,
            "cleanup_summary" => AuditEventType::CleanupSummary,
            "privacy_erasure" => AuditEventType::PrivacyErasure,
            "api_error" => AuditEventType::ApiError,
            other => {
                return Err(VideoError::Internal(format!(
                    "Unknown audit event type in store: {}",
                    other
                )))
            }
        };
        Ok(event)
    }
}

/// One row of the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub event_type: AuditEventType,
    /// Principal that triggered the event; `None` for scheduled jobs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<i64>,
    /// Owner of the affected data, used for privacy erasure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[schema(value_type = Object)]
    pub context: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn new(event_type: AuditEventType, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            actor_id: None,
            subject_user_id: None,
            submission_id: None,
            assignment_id: None,
            remote_key: None,
            error_code: None,
            error_message: None,
            context: serde_json::Value::Object(Default::default()),
            created_at: now,
        }
    }

    pub fn actor(mut self, user_id: i64) -> Self {
        self.actor_id = Some(user_id);
        self
    }

    pub fn subject(mut self, user_id: i64) -> Self {
        self.subject_user_id = Some(user_id);
        self
    }

    pub fn submission(mut self, submission_id: i64, assignment_id: i64) -> Self {
        self.submission_id = Some(submission_id);
        self.assignment_id = Some(assignment_id);
        self
    }

    pub fn remote_key(mut self, key: impl Into<String>) -> Self {
        self.remote_key = Some(key.into());
        self
    }

    pub fn error(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self.error_message = Some(crate::validation::sanitize_error_message(&message.into()));
        self
    }

    pub fn context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_round_trips_through_str() {
        let e: AuditEventType = "playback_access".parse().unwrap();
        assert_eq!(e, AuditEventType::PlaybackAccess);
        assert_eq!(e.to_string(), "playback_access");
        assert!("nope".parse::<AuditEventType>().is_err());
    }

    #[test]
    fn builder_sanitizes_error_message() {
        let entry = AuditLogEntry::new(AuditEventType::UploadFailed, Utc::now())
            .actor(5)
            .submission(42, 7)
            .error("network_error", "connection\nreset");
        assert_eq!(entry.actor_id, Some(5));
        assert_eq!(entry.submission_id, Some(42));
        assert_eq!(entry.error_message.as_deref(), Some("connection reset"));
    }
}
