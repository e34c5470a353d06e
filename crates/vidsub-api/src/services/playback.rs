//! Playback credential issuance.

use std::sync::Arc;
use std::time::Duration;
use validator::Validate;
use vidsub_core::constants::MAX_PLAYBACK_TTL_SECS;
use vidsub_core::models::{
    AuditEventType, PlaybackCredentialQuery, PlaybackCredentialResponse, Principal, UploadStatus,
};
use vidsub_core::validation::validate_remote_key;
use vidsub_core::{VideoError, VideoResult};
use vidsub_infra::{storage_error_class, AuditLogger, RateLimitPolicy, RetryEngine};
use vidsub_storage::RemoteStorage;

use super::AccessGate;

#[derive(Clone)]
pub struct PlaybackService {
    gate: AccessGate,
    storage: Arc<dyn RemoteStorage>,
    retry: Arc<RetryEngine>,
    rate_limits: RateLimitPolicy,
    audit: AuditLogger,
    default_ttl_secs: u64,
}

impl PlaybackService {
    pub fn new(
        gate: AccessGate,
        storage: Arc<dyn RemoteStorage>,
        retry: Arc<RetryEngine>,
        rate_limits: RateLimitPolicy,
        audit: AuditLogger,
        default_ttl_secs: u64,
    ) -> Self {
        Self {
            gate,
            storage,
            retry,
            rate_limits,
            audit,
            default_ttl_secs,
        }
    }

    #[tracing::instrument(skip(self, principal, query), fields(user_id = principal.user_id, submission_id = query.submission_id))]
    pub async fn issue_credential(
        &self,
        principal: &Principal,
        query: PlaybackCredentialQuery,
    ) -> VideoResult<PlaybackCredentialResponse> {
        query.validate()?;
        validate_remote_key(&query.remote_key)?;
        let ttl_secs = query.ttl_seconds.unwrap_or(self.default_ttl_secs);
        if ttl_secs == 0 || ttl_secs > MAX_PLAYBACK_TTL_SECS {
            return Err(VideoError::Validation(format!(
                "ttlSeconds must be between 1 and {}",
                MAX_PLAYBACK_TTL_SECS
            )));
        }

        let record = match self
            .gate
            .authorize_view(principal, query.submission_id, &query.remote_key)
            .await
        {
            Ok(record) => record,
            Err(e) => {
                self.audit
                    .record_error(
                        self.audit
                            .entry(AuditEventType::PlaybackAccess)
                            .actor(principal.user_id)
                            .remote_key(&query.remote_key)
                            .context(serde_json::json!({ "submissionId": query.submission_id })),
                        &e,
                    )
                    .await;
                return Err(e);
            }
        };

        match record.status {
            UploadStatus::Ready => {}
            UploadStatus::Deleted => {
                return Err(VideoError::NotFound(
                    "This video has been deleted".to_string(),
                ))
            }
            status => {
                return Err(VideoError::Validation(format!(
                    "Video is not ready for playback (status: {})",
                    status
                )))
            }
        }

        self.rate_limits
            .check_playback(principal, &record.remote_key)
            .await?;

        let storage = self.storage.clone();
        let remote_key = record.remote_key.clone();
        let ttl = Duration::from_secs(ttl_secs);
        let credential = self
            .retry
            .execute("generate_playback_credential", storage_error_class, || {
                let storage = storage.clone();
                let remote_key = remote_key.clone();
                async move { storage.generate_playback_credential(&remote_key, ttl).await }
            })
            .await?;

        self.audit
            .record(
                self.audit
                    .entry(AuditEventType::PlaybackAccess)
                    .actor(principal.user_id)
                    .subject(record.user_id)
                    .submission(record.submission_id, record.assignment_id)
                    .remote_key(&record.remote_key)
                    .context(serde_json::json!({
                        "credentialType": credential.kind,
                        "expiresInSeconds": credential.expires_in_seconds,
                    })),
            )
            .await;

        Ok(PlaybackCredentialResponse {
            credential: credential.value,
            credential_type: credential.kind,
            playback_url: credential.playback_url,
            expires_in_seconds: credential.expires_in_seconds,
        })
    }
}
