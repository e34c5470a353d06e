//! Upload session lifecycle.
//!
//! Every write to a submission's record happens while holding that
//! submission's lock, so a double-submitted upload request cannot leave two
//! records (or two live remote objects) behind.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use validator::Validate;
use vidsub_core::models::{
    AuditEventType, CleanupFailedUploadRequest, CleanupFailedUploadResponse, ConfirmUploadRequest,
    ConfirmUploadResponse, Principal, RecordUpdate, RetryUploadRequest, UploadRecord,
    UploadRecordView, UploadSessionRequest, UploadSessionResponse, UploadStatus,
};
use vidsub_core::validation::{validate_remote_key, validate_video_mime_type};
use vidsub_core::{Clock, Config, VideoError, VideoResult};
use vidsub_db::UploadRecordStore;
use vidsub_infra::{storage_error_class, AuditLogger, RateLimitPolicy, RetryEngine};
use vidsub_storage::{RemoteObjectMetadata, RemoteState, RemoteStorage, UploadSessionSpec};

use super::AccessGate;

const LOCK_TABLE_PRUNE_THRESHOLD: usize = 1024;

/// Size and duration bounds checked before any remote call.
#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    pub max_file_size_bytes: u64,
    pub max_duration_seconds: u32,
}

impl UploadLimits {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_file_size_bytes: config.max_file_size_bytes(),
            max_duration_seconds: config.max_duration_seconds(),
        }
    }
}

#[derive(Default)]
struct SubmissionLocks {
    inner: std::sync::Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl SubmissionLocks {
    async fn acquire(&self, submission_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            if locks.len() > LOCK_TABLE_PRUNE_THRESHOLD {
                locks.retain(|_, l| Arc::strong_count(l) > 1);
            }
            locks.entry(submission_id).or_default().clone()
        };
        lock.lock_owned().await
    }
}

#[derive(Clone)]
pub struct UploadTracker {
    records: Arc<dyn UploadRecordStore>,
    storage: Arc<dyn RemoteStorage>,
    retry: Arc<RetryEngine>,
    rate_limits: RateLimitPolicy,
    audit: AuditLogger,
    clock: Arc<dyn Clock>,
    limits: UploadLimits,
    locks: Arc<SubmissionLocks>,
}

impl UploadTracker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        records: Arc<dyn UploadRecordStore>,
        storage: Arc<dyn RemoteStorage>,
        retry: Arc<RetryEngine>,
        rate_limits: RateLimitPolicy,
        audit: AuditLogger,
        clock: Arc<dyn Clock>,
        limits: UploadLimits,
    ) -> Self {
        Self {
            records,
            storage,
            retry,
            rate_limits,
            audit,
            clock,
            limits,
            locks: Arc::new(SubmissionLocks::default()),
        }
    }

    /// Issue a direct-upload target for a submission, replacing any earlier video.
    ///
    /// Without a `submission_id` the caller's existing submission for the
    /// assignment is used.
    #[tracing::instrument(skip(self, principal, req), fields(user_id = principal.user_id, assignment_id = req.assignment_id))]
    pub async fn request_upload_session(
        &self,
        principal: &Principal,
        req: UploadSessionRequest,
    ) -> VideoResult<UploadSessionResponse> {
        req.validate()?;
        self.check_request_bounds(req.mime_type.as_deref(), req.file_size)?;
        let max_duration_seconds = self.resolve_duration(req.max_duration_seconds)?;

        let existing = match req.submission_id {
            Some(id) => self.records.get_by_submission(id).await?,
            None => {
                self.records
                    .find_for_owner(principal.user_id, req.assignment_id)
                    .await?
            }
        };
        let submission_id = match (req.submission_id, &existing) {
            (Some(id), _) => id,
            (None, Some(record)) => record.submission_id,
            (None, None) => {
                return Err(VideoError::Validation(
                    "submissionId is required for the first upload to an assignment".to_string(),
                ))
            }
        };

        let owner_id = match &existing {
            Some(record) => {
                if record.assignment_id != req.assignment_id {
                    return Err(VideoError::InvalidIdentifier(format!(
                        "Submission {} does not belong to assignment {}",
                        submission_id, req.assignment_id
                    )));
                }
                ensure_may_modify(principal, record)?;
                record.user_id
            }
            None => {
                first_upload_owner(principal, submission_id, req.assignment_id, req.owner_id)?
            }
        };

        self.rate_limits
            .check_upload(principal, req.assignment_id)
            .await?;

        let spec = UploadSessionSpec {
            submission_id,
            assignment_id: req.assignment_id,
            user_id: owner_id,
            mime_type: req.mime_type,
            file_size: req.file_size,
            max_duration_seconds,
        };
        let (record, upload_url) = self.issue_session(principal, spec, false).await?;

        self.audit
            .record(
                self.audit
                    .entry(AuditEventType::UploadRequested)
                    .actor(principal.user_id)
                    .subject(record.user_id)
                    .submission(record.submission_id, record.assignment_id)
                    .remote_key(&record.remote_key),
            )
            .await;

        Ok(UploadSessionResponse {
            submission_id: record.submission_id,
            upload_url,
            remote_key: record.remote_key,
            status: record.status,
        })
    }

    /// Fetch the remote object's metadata and move the record to the matching status.
    #[tracing::instrument(skip(self, principal, req), fields(user_id = principal.user_id, submission_id = req.submission_id))]
    pub async fn confirm_upload(
        &self,
        principal: &Principal,
        req: ConfirmUploadRequest,
    ) -> VideoResult<ConfirmUploadResponse> {
        req.validate()?;
        validate_remote_key(&req.remote_key)?;

        let record = self
            .matching_record(req.submission_id, &req.remote_key)
            .await?;
        ensure_may_modify(principal, &record)?;

        match record.status {
            // Already settled; repeat confirmations are answered from the record.
            UploadStatus::Ready | UploadStatus::Error => return Ok(confirm_response(&record)),
            UploadStatus::Deleted => {
                return Err(VideoError::InvalidTransition {
                    from: UploadStatus::Deleted,
                    to: UploadStatus::Ready,
                })
            }
            UploadStatus::Pending | UploadStatus::Uploading => {}
        }

        // No lock is held while the remote store is queried.
        let storage = self.storage.clone();
        let remote_key = record.remote_key.clone();
        let metadata = match self
            .retry
            .execute("get_object_metadata", storage_error_class, || {
                let storage = storage.clone();
                let remote_key = remote_key.clone();
                async move { storage.get_object_metadata(&remote_key).await }
            })
            .await
        {
            Ok(metadata) => metadata,
            Err(e) => {
                self.audit
                    .record_error(
                        self.audit
                            .entry(AuditEventType::UploadFailed)
                            .actor(principal.user_id)
                            .subject(record.user_id)
                            .submission(record.submission_id, record.assignment_id)
                            .remote_key(&record.remote_key),
                        &e,
                    )
                    .await;
                return Err(e);
            }
        };

        let (update, unknown_state) = self.update_from_metadata(&metadata);
        if let Some(state) = &unknown_state {
            tracing::warn!(
                submission_id = record.submission_id,
                remote_key = %record.remote_key,
                remote_state = %state,
                "Unrecognised remote state, treating upload as ready"
            );
            self.audit
                .record(
                    self.audit
                        .entry(AuditEventType::UnknownRemoteState)
                        .actor(principal.user_id)
                        .submission(record.submission_id, record.assignment_id)
                        .remote_key(&record.remote_key)
                        .context(serde_json::json!({ "remoteState": state })),
                )
                .await;
        }

        let settled = self.settle(&record, update).await?;

        match settled.status {
            UploadStatus::Ready => {
                self.audit
                    .record(
                        self.audit
                            .entry(AuditEventType::UploadConfirmed)
                            .actor(principal.user_id)
                            .subject(settled.user_id)
                            .submission(settled.submission_id, settled.assignment_id)
                            .remote_key(&settled.remote_key)
                            .context(serde_json::json!({
                                "fileSize": settled.file_size,
                                "durationSeconds": settled.duration_seconds,
                            })),
                    )
                    .await
            }
            UploadStatus::Error => {
                let mut entry = self
                    .audit
                    .entry(AuditEventType::UploadFailed)
                    .actor(principal.user_id)
                    .subject(settled.user_id)
                    .submission(settled.submission_id, settled.assignment_id)
                    .remote_key(&settled.remote_key);
                if let Some(message) = &settled.error_message {
                    entry = entry.error("processing_error", message.clone());
                }
                self.audit.record(entry).await
            }
            _ => tracing::debug!(
                submission_id = settled.submission_id,
                "Upload still processing"
            ),
        }

        Ok(confirm_response(&settled))
    }

    /// Start over after a failed upload: `error -> pending` with a fresh session.
    #[tracing::instrument(skip(self, principal, req), fields(user_id = principal.user_id, submission_id = req.submission_id))]
    pub async fn retry_upload(
        &self,
        principal: &Principal,
        req: RetryUploadRequest,
    ) -> VideoResult<UploadSessionResponse> {
        req.validate()?;
        self.check_request_bounds(req.mime_type.as_deref(), None)?;
        let max_duration_seconds = self.resolve_duration(req.max_duration_seconds)?;

        let record = self
            .records
            .get_by_submission(req.submission_id)
            .await?
            .ok_or_else(|| {
                VideoError::NotFound(format!(
                    "No upload exists for submission {}",
                    req.submission_id
                ))
            })?;
        ensure_may_modify(principal, &record)?;

        self.rate_limits
            .check_upload(principal, record.assignment_id)
            .await?;

        let spec = UploadSessionSpec {
            submission_id: record.submission_id,
            assignment_id: record.assignment_id,
            user_id: record.user_id,
            mime_type: req.mime_type,
            file_size: None,
            max_duration_seconds,
        };
        let (next, upload_url) = self.issue_session(principal, spec, true).await?;

        self.audit
            .record(
                self.audit
                    .entry(AuditEventType::UploadRetried)
                    .actor(principal.user_id)
                    .subject(next.user_id)
                    .submission(next.submission_id, next.assignment_id)
                    .remote_key(&next.remote_key)
                    .context(serde_json::json!({ "previousRemoteKey": record.remote_key })),
            )
            .await;

        Ok(UploadSessionResponse {
            submission_id: next.submission_id,
            upload_url,
            remote_key: next.remote_key,
            status: next.status,
        })
    }

    /// Best-effort removal of an upload that never completed.
    ///
    /// Remote and local failures are logged and reported through the flags;
    /// they never fail the request.
    #[tracing::instrument(skip(self, principal, req), fields(user_id = principal.user_id, submission_id = req.submission_id))]
    pub async fn cleanup_failed_upload(
        &self,
        principal: &Principal,
        req: CleanupFailedUploadRequest,
    ) -> VideoResult<CleanupFailedUploadResponse> {
        req.validate()?;
        validate_remote_key(&req.remote_key)?;

        let mut response = CleanupFailedUploadResponse::default();
        let _guard = self.locks.acquire(req.submission_id).await;

        let record = match self.records.get_by_submission(req.submission_id).await {
            Ok(Some(record)) if record.remote_key == req.remote_key => record,
            Ok(_) => {
                tracing::debug!(remote_key = %req.remote_key, "No matching upload to clean up");
                return Ok(response);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not load upload record for cleanup");
                return Ok(response);
            }
        };
        ensure_may_modify(principal, &record)?;

        if matches!(record.status, UploadStatus::Ready | UploadStatus::Deleted) {
            tracing::debug!(
                status = %record.status,
                "Upload is not a failed upload, leaving it in place"
            );
            return Ok(response);
        }

        match self.delete_remote(&record.remote_key).await {
            Ok(()) => response.deleted_remote = true,
            Err(e) if e.is_not_found() => {
                tracing::debug!(remote_key = %record.remote_key, "Remote object already gone")
            }
            Err(e) => tracing::warn!(
                error = %e,
                remote_key = %record.remote_key,
                "Failed to delete remote object of failed upload"
            ),
        }

        match self.records.delete_by_submission(record.submission_id).await {
            Ok(deleted) => response.deleted_local = deleted,
            Err(e) => tracing::warn!(error = %e, "Failed to delete upload record"),
        }

        self.audit
            .record(
                self.audit
                    .entry(AuditEventType::UploadCleanedUp)
                    .actor(principal.user_id)
                    .subject(record.user_id)
                    .submission(record.submission_id, record.assignment_id)
                    .remote_key(&record.remote_key)
                    .context(serde_json::json!({
                        "deletedRemote": response.deleted_remote,
                        "deletedLocal": response.deleted_local,
                    })),
            )
            .await;

        Ok(response)
    }

    pub async fn get_status(
        &self,
        principal: &Principal,
        submission_id: i64,
    ) -> VideoResult<UploadRecordView> {
        let record = self
            .records
            .get_by_submission(submission_id)
            .await?
            .ok_or_else(|| {
                VideoError::NotFound(format!("No upload exists for submission {}", submission_id))
            })?;
        if !AccessGate::can_view(principal, record.user_id, record.assignment_id) {
            return Err(VideoError::PermissionDenied(format!(
                "User {} may not view submission {}",
                principal.user_id, submission_id
            )));
        }
        Ok(UploadRecordView::from(&record))
    }

    fn check_request_bounds(&self, mime_type: Option<&str>, file_size: Option<u64>) -> VideoResult<()> {
        if let Some(mime_type) = mime_type {
            validate_video_mime_type(mime_type)?;
        }
        if let Some(size) = file_size {
            if size == 0 || size > self.limits.max_file_size_bytes {
                return Err(VideoError::Validation(format!(
                    "File size must be between 1 and {} bytes",
                    self.limits.max_file_size_bytes
                )));
            }
        }
        Ok(())
    }

    fn resolve_duration(&self, requested: Option<u32>) -> VideoResult<u32> {
        match requested {
            None => Ok(self.limits.max_duration_seconds),
            Some(secs) if secs >= 1 && secs <= self.limits.max_duration_seconds => Ok(secs),
            Some(_) => Err(VideoError::Validation(format!(
                "Videos may be at most {} seconds long",
                self.limits.max_duration_seconds
            ))),
        }
    }

    /// Create the remote session, remove the superseded object, then persist
    /// the new pending record, all under the submission lock.
    async fn issue_session(
        &self,
        principal: &Principal,
        spec: UploadSessionSpec,
        from_error: bool,
    ) -> VideoResult<(UploadRecord, String)> {
        let _guard = self.locks.acquire(spec.submission_id).await;
        let previous = self.records.get_by_submission(spec.submission_id).await?;

        if from_error {
            let previous = previous.as_ref().ok_or_else(|| {
                VideoError::NotFound(format!(
                    "No upload exists for submission {}",
                    spec.submission_id
                ))
            })?;
            if previous.status != UploadStatus::Error {
                return Err(VideoError::InvalidTransition {
                    from: previous.status,
                    to: UploadStatus::Pending,
                });
            }
            previous.applied(RecordUpdate::status(UploadStatus::Pending), self.clock.now())?;
        }

        let storage = self.storage.clone();
        let session_spec = spec.clone();
        let target = self
            .retry
            .execute("create_upload_session", storage_error_class, || {
                let storage = storage.clone();
                let spec = session_spec.clone();
                async move { storage.create_upload_session(&spec).await }
            })
            .await?;

        let record = UploadRecord::new_pending(
            spec.submission_id,
            spec.assignment_id,
            spec.user_id,
            self.storage.backend_type(),
            target.remote_key,
            self.clock.now(),
        )?;

        if let Some(previous) = &previous {
            if previous.status != UploadStatus::Deleted && previous.remote_key != record.remote_key
            {
                self.delete_replaced(principal, previous).await;
            }
        }

        self.records.replace_for_submission(&record).await?;
        tracing::info!(
            submission_id = record.submission_id,
            remote_key = %record.remote_key,
            replaced = previous.is_some(),
            "Upload session issued"
        );

        Ok((record, target.upload_url))
    }

    async fn delete_replaced(&self, principal: &Principal, previous: &UploadRecord) {
        match self.delete_remote(&previous.remote_key).await {
            Ok(()) => tracing::info!(
                remote_key = %previous.remote_key,
                "Deleted replaced video"
            ),
            Err(e) if e.is_not_found() => tracing::debug!(
                remote_key = %previous.remote_key,
                "Replaced video already gone"
            ),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    remote_key = %previous.remote_key,
                    "Failed to delete replaced video, continuing"
                );
                self.audit
                    .record_error(
                        self.audit
                            .entry(AuditEventType::ReplacementDeleteFailed)
                            .actor(principal.user_id)
                            .subject(previous.user_id)
                            .submission(previous.submission_id, previous.assignment_id)
                            .remote_key(&previous.remote_key),
                        &e,
                    )
                    .await;
            }
        }
    }

    async fn delete_remote(&self, remote_key: &str) -> VideoResult<()> {
        let storage = self.storage.clone();
        let remote_key = remote_key.to_string();
        self.retry
            .execute("delete_object", storage_error_class, || {
                let storage = storage.clone();
                let remote_key = remote_key.clone();
                async move { storage.delete_object(&remote_key).await }
            })
            .await
    }

    async fn matching_record(&self, submission_id: i64, remote_key: &str) -> VideoResult<UploadRecord> {
        self.records
            .get_by_submission(submission_id)
            .await?
            .filter(|r| r.remote_key == remote_key)
            .ok_or_else(|| {
                VideoError::InvalidIdentifier(
                    "The video identifier does not match this submission".to_string(),
                )
            })
    }

    /// Map remote metadata to a record update. Returns the raw state when it
    /// was not recognised.
    fn update_from_metadata(&self, metadata: &RemoteObjectMetadata) -> (RecordUpdate, Option<String>) {
        // Stream reports -1 for values it does not know yet.
        let size = metadata.size_bytes.filter(|s| *s >= 0);
        let duration = metadata
            .duration_seconds
            .filter(|d| d.is_finite() && *d >= 0.0)
            .map(|d| d.round() as i64);

        let (status, unknown) = match &metadata.state {
            RemoteState::Ready => (UploadStatus::Ready, None),
            RemoteState::Processing => (UploadStatus::Uploading, None),
            RemoteState::Error => (UploadStatus::Error, None),
            RemoteState::Unknown(state) => (UploadStatus::Ready, Some(state.clone())),
        };

        let update = RecordUpdate::status(status)
            .with_file_size(size)
            .with_duration(duration);

        if status == UploadStatus::Error {
            let reason = metadata
                .error_reason
                .clone()
                .unwrap_or_else(|| "The video service could not process this video".to_string());
            return (update.with_error(reason), unknown);
        }

        if status == UploadStatus::Ready {
            if size.is_some_and(|s| s as u64 > self.limits.max_file_size_bytes) {
                let update = RecordUpdate::status(UploadStatus::Error)
                    .with_file_size(size)
                    .with_duration(duration)
                    .with_error("The uploaded file exceeds the maximum allowed size");
                return (update, unknown);
            }
            if duration.is_some_and(|d| d > self.limits.max_duration_seconds as i64) {
                let update = RecordUpdate::status(UploadStatus::Error)
                    .with_file_size(size)
                    .with_duration(duration)
                    .with_error("The uploaded video exceeds the maximum allowed duration");
                return (update, unknown);
            }
        }

        (update, unknown)
    }

    /// Apply `update` to the current version of `record`. Fails if the record
    /// was replaced since it was read.
    async fn settle(&self, record: &UploadRecord, update: RecordUpdate) -> VideoResult<UploadRecord> {
        let _guard = self.locks.acquire(record.submission_id).await;
        let current = self
            .records
            .get_by_submission(record.submission_id)
            .await?
            .filter(|r| r.id == record.id)
            .ok_or_else(|| {
                VideoError::InvalidIdentifier(
                    "This upload was replaced by a newer one".to_string(),
                )
            })?;
        let next = current.applied(update, self.clock.now())?;
        self.records.update(&next).await?;
        Ok(next)
    }
}

fn ensure_may_modify(principal: &Principal, record: &UploadRecord) -> VideoResult<()> {
    if record.is_owned_by(principal.user_id) || principal.is_site_admin() {
        Ok(())
    } else {
        Err(VideoError::PermissionDenied(format!(
            "User {} does not own submission {}",
            principal.user_id, record.submission_id
        )))
    }
}

/// Owner of a submission that has no record yet, taken from the host's claims.
fn first_upload_owner(
    principal: &Principal,
    submission_id: i64,
    assignment_id: i64,
    owner_id: Option<i64>,
) -> VideoResult<i64> {
    if principal.owns_submission(submission_id) {
        return match owner_id {
            Some(id) if id != principal.user_id => Err(VideoError::InvalidIdentifier(format!(
                "Submission {} does not belong to user {}",
                submission_id, id
            ))),
            _ => Ok(principal.user_id),
        };
    }
    if principal.can_grade(assignment_id) {
        return owner_id.ok_or_else(|| {
            VideoError::Validation(
                "ownerId is required to start another user's submission".to_string(),
            )
        });
    }
    Err(VideoError::PermissionDenied(format!(
        "User {} does not own submission {}",
        principal.user_id, submission_id
    )))
}

fn confirm_response(record: &UploadRecord) -> ConfirmUploadResponse {
    ConfirmUploadResponse {
        submission_id: record.submission_id,
        status: record.status,
        duration_seconds: record.duration_seconds,
        file_size: record.file_size,
        error_message: record.error_message.clone(),
    }
}
