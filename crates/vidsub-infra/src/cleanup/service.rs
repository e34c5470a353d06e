use crate::audit::AuditLogger;
use crate::retry::{storage_error_class, RetryEngine};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use uuid::Uuid;
use vidsub_core::models::{AuditEventType, RecordUpdate, UploadRecord, UploadStatus};
use vidsub_core::{Clock, Config, VideoError, VideoResult};
use vidsub_db::UploadRecordStore;
use vidsub_storage::RemoteStorage;

const DEFAULT_BATCH_SIZE: i64 = 100;

/// Counts from one retention sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupSummary {
    /// Remote object deleted and record marked deleted.
    pub deleted: u64,
    /// Remote object was already gone; record marked deleted anyway.
    pub not_found: u64,
    /// Left in place for the next sweep.
    pub failed: u64,
}

/// Deletes videos whose retention period has elapsed.
///
/// A record qualifies when it is ready or errored, not yet deleted, and was
/// uploaded more than `retention` ago. One failing video never stops the sweep.
#[derive(Clone)]
pub struct CleanupService {
    records: Arc<dyn UploadRecordStore>,
    storage: Arc<dyn RemoteStorage>,
    retry: Arc<RetryEngine>,
    audit: AuditLogger,
    clock: Arc<dyn Clock>,
    retention: chrono::Duration,
    interval: Duration,
    batch_size: i64,
}

impl CleanupService {
    pub fn new(
        records: Arc<dyn UploadRecordStore>,
        storage: Arc<dyn RemoteStorage>,
        retry: Arc<RetryEngine>,
        audit: AuditLogger,
        clock: Arc<dyn Clock>,
        retention: chrono::Duration,
        interval: Duration,
    ) -> Self {
        Self {
            records,
            storage,
            retry,
            audit,
            clock,
            retention,
            interval,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn from_config(
        config: &Config,
        records: Arc<dyn UploadRecordStore>,
        storage: Arc<dyn RemoteStorage>,
        retry: Arc<RetryEngine>,
        audit: AuditLogger,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::new(
            records,
            storage,
            retry,
            audit,
            clock,
            chrono::Duration::days(config.retention_days()),
            Duration::from_secs(config.cleanup_interval_secs()),
        )
    }

    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Start the background cleanup task.
    /// Returns a JoinHandle for graceful shutdown
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut cleanup_interval = interval(self.interval);

            loop {
                cleanup_interval.tick().await;

                tracing::info!("Starting scheduled cleanup of expired videos");

                match self.run_sweep().await {
                    Ok(summary) => tracing::info!(
                        deleted = summary.deleted,
                        not_found = summary.not_found,
                        failed = summary.failed,
                        "Cleanup task completed"
                    ),
                    Err(e) => tracing::error!(error = %e, "Cleanup task failed"),
                }
            }
        })
    }

    /// Run one sweep over every expired record.
    #[tracing::instrument(skip(self), fields(cleanup.operation = "retention"))]
    pub async fn run_sweep(&self) -> VideoResult<CleanupSummary> {
        let cutoff = self.clock.now() - self.retention;
        let mut summary = CleanupSummary::default();
        let mut skipped: HashSet<Uuid> = HashSet::new();
        let mut aborted: Option<VideoError> = None;

        loop {
            let limit = self.batch_size + skipped.len() as i64;
            let batch: Vec<UploadRecord> = match self.records.find_expired(cutoff, limit).await {
                Ok(batch) => batch
                    .into_iter()
                    .filter(|r| !skipped.contains(&r.id))
                    .collect(),
                Err(e) => {
                    aborted = Some(e);
                    break;
                }
            };

            if batch.is_empty() {
                break;
            }

            for record in batch {
                match self.expire_record(&record).await {
                    Ok(true) => summary.deleted += 1,
                    Ok(false) => summary.not_found += 1,
                    Err(e) => {
                        tracing::error!(
                            error = %e,
                            submission_id = record.submission_id,
                            remote_key = %record.remote_key,
                            "Failed to delete expired video, will retry next sweep"
                        );
                        summary.failed += 1;
                        skipped.insert(record.id);
                    }
                }
            }
        }

        tracing::info!(
            deleted = summary.deleted,
            not_found = summary.not_found,
            failed = summary.failed,
            cutoff = %cutoff,
            aborted = aborted.is_some(),
            "Cleanup completed"
        );

        let entry = self
            .audit
            .entry(AuditEventType::CleanupSummary)
            .context(serde_json::json!({
                "deleted": summary.deleted,
                "notFound": summary.not_found,
                "failed": summary.failed,
                "cutoff": cutoff,
            }));
        match aborted {
            Some(e) => {
                self.audit.record_error(entry, &e).await;
                Err(e)
            }
            None => {
                self.audit.record(entry).await;
                Ok(summary)
            }
        }
    }

    /// Delete the remote object and mark the record deleted.
    ///
    /// Returns `false` when the remote object was already gone.
    async fn expire_record(&self, record: &UploadRecord) -> VideoResult<bool> {
        tracing::info!(
            submission_id = record.submission_id,
            remote_key = %record.remote_key,
            uploaded_at = ?record.uploaded_at,
            "Deleting expired video"
        );

        let storage = self.storage.clone();
        let remote_key = record.remote_key.clone();
        let existed = match self
            .retry
            .execute("delete_object", storage_error_class, || {
                let storage = storage.clone();
                let remote_key = remote_key.clone();
                async move { storage.delete_object(&remote_key).await }
            })
            .await
        {
            Ok(()) => true,
            Err(e) if e.is_not_found() => {
                tracing::debug!(
                    remote_key = %record.remote_key,
                    "Remote object already gone"
                );
                false
            }
            Err(e) => return Err(e),
        };

        let deleted = record.applied(RecordUpdate::status(UploadStatus::Deleted), self.clock.now())?;
        match self.records.update(&deleted).await {
            Ok(()) => {}
            // Replaced by a newer upload while we were deleting; nothing left to mark.
            Err(VideoError::NotFound(_)) => {
                tracing::debug!(
                    submission_id = record.submission_id,
                    "Record replaced during cleanup"
                );
            }
            Err(e) => return Err(e),
        }

        self.audit
            .record(
                self.audit
                    .entry(AuditEventType::VideoDeleted)
                    .subject(record.user_id)
                    .submission(record.submission_id, record.assignment_id)
                    .remote_key(&record.remote_key)
                    .context(serde_json::json!({
                        "reason": "retention",
                        "remoteExisted": existed,
                    })),
            )
            .await;

        Ok(existed)
    }
}
