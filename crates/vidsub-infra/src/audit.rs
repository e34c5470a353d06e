//! Audit trail writer.
//!
//! Audit writes never fail the operation being audited: a store error is
//! logged and swallowed.

use std::sync::Arc;
use vidsub_core::models::{AuditEventType, AuditLogEntry};
use vidsub_core::{Clock, VideoError};
use vidsub_db::AuditLogStore;

#[derive(Clone)]
pub struct AuditLogger {
    store: Arc<dyn AuditLogStore>,
    clock: Arc<dyn Clock>,
}

impl AuditLogger {
    pub fn new(store: Arc<dyn AuditLogStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &Arc<dyn AuditLogStore> {
        &self.store
    }

    /// A new entry stamped with the current time.
    pub fn entry(&self, event_type: AuditEventType) -> AuditLogEntry {
        AuditLogEntry::new(event_type, self.clock.now())
    }

    pub async fn record(&self, entry: AuditLogEntry) {
        tracing::info!(
            target: "audit",
            event_type = %entry.event_type,
            actor_id = ?entry.actor_id,
            subject_user_id = ?entry.subject_user_id,
            submission_id = ?entry.submission_id,
            remote_key = ?entry.remote_key,
            error_code = ?entry.error_code,
            "Audit event"
        );

        if let Err(e) = self.store.insert(&entry).await {
            tracing::warn!(
                error = %e,
                event_type = %entry.event_type,
                "Failed to persist audit entry"
            );
        }
    }

    /// Record a failed operation with the error's code and message.
    pub async fn record_error(&self, entry: AuditLogEntry, err: &VideoError) {
        use vidsub_core::ErrorMetadata;
        self.record(entry.error(err.error_code(), err.to_string()))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use vidsub_core::{ManualClock, VideoResult};
    use vidsub_db::InMemoryAuditLogStore;

    struct FailingStore;

    #[async_trait]
    impl AuditLogStore for FailingStore {
        async fn insert(&self, _entry: &AuditLogEntry) -> VideoResult<()> {
            Err(VideoError::Database("connection refused".into()))
        }

        async fn list_by_submission(
            &self,
            _submission_id: i64,
            _limit: i64,
        ) -> VideoResult<Vec<AuditLogEntry>> {
            Ok(Vec::new())
        }

        async fn delete_for_user(&self, _user_id: i64) -> VideoResult<u64> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn records_with_clock_time() {
        let now = Utc::now();
        let store = Arc::new(InMemoryAuditLogStore::new());
        let logger = AuditLogger::new(store.clone(), Arc::new(ManualClock::new(now)));

        logger
            .record(
                logger
                    .entry(AuditEventType::PlaybackAccess)
                    .actor(5)
                    .submission(42, 7),
            )
            .await;

        let entries = store.all().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].created_at, now);
        assert_eq!(entries[0].submission_id, Some(42));
    }

    #[tokio::test]
    async fn error_entries_carry_code() {
        let store = Arc::new(InMemoryAuditLogStore::new());
        let logger = AuditLogger::new(store.clone(), Arc::new(ManualClock::new(Utc::now())));
        let err = VideoError::PermissionDenied("not owner".into());

        logger
            .record_error(logger.entry(AuditEventType::ApiError).actor(9), &err)
            .await;

        let entries = store.all().await;
        assert_eq!(entries[0].error_code.as_deref(), Some("permission_error"));
    }

    #[tokio::test]
    async fn store_failure_is_swallowed() {
        let logger = AuditLogger::new(Arc::new(FailingStore), Arc::new(ManualClock::new(Utc::now())));
        logger.record(logger.entry(AuditEventType::UploadRequested)).await;
    }
}
