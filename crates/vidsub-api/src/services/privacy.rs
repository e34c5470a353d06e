//! Erasure of a user's videos, records and audit entries.

use std::sync::Arc;
use vidsub_core::models::{AuditEventType, Principal, PrivacyEraseResponse, UploadStatus};
use vidsub_core::{VideoError, VideoResult};
use vidsub_db::{AuditLogStore, UploadRecordStore};
use vidsub_infra::{storage_error_class, AuditLogger, RetryEngine};
use vidsub_storage::RemoteStorage;

#[derive(Clone)]
pub struct PrivacyService {
    records: Arc<dyn UploadRecordStore>,
    audit_store: Arc<dyn AuditLogStore>,
    storage: Arc<dyn RemoteStorage>,
    retry: Arc<RetryEngine>,
    audit: AuditLogger,
}

impl PrivacyService {
    pub fn new(
        records: Arc<dyn UploadRecordStore>,
        audit_store: Arc<dyn AuditLogStore>,
        storage: Arc<dyn RemoteStorage>,
        retry: Arc<RetryEngine>,
        audit: AuditLogger,
    ) -> Self {
        Self {
            records,
            audit_store,
            storage,
            retry,
            audit,
        }
    }

    /// Remove everything held about `user_id`. Admin only.
    ///
    /// Remote objects that cannot be deleted are counted, not fatal: the
    /// local data is erased regardless.
    #[tracing::instrument(skip(self, principal), fields(actor_id = principal.user_id))]
    pub async fn erase(&self, principal: &Principal, user_id: i64) -> VideoResult<PrivacyEraseResponse> {
        if !principal.is_site_admin() {
            return Err(VideoError::PermissionDenied(
                "Only site administrators may erase user data".to_string(),
            ));
        }

        let mut response = PrivacyEraseResponse::default();
        for record in self.records.list_for_user(user_id).await? {
            if record.status == UploadStatus::Deleted {
                continue;
            }
            let storage = self.storage.clone();
            let remote_key = record.remote_key.clone();
            let result = self
                .retry
                .execute("delete_object", storage_error_class, || {
                    let storage = storage.clone();
                    let remote_key = remote_key.clone();
                    async move { storage.delete_object(&remote_key).await }
                })
                .await;
            match result {
                Ok(()) => response.remote_objects_deleted += 1,
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        remote_key = %record.remote_key,
                        "Failed to delete remote object during erasure"
                    );
                    response.remote_delete_failures += 1;
                }
            }
        }

        response.records_deleted = self.records.delete_for_user(user_id).await?;
        response.audit_entries_deleted = self.audit_store.delete_for_user(user_id).await?;

        // No subject, so later erasures never match this entry.
        self.audit
            .record(
                self.audit
                    .entry(AuditEventType::PrivacyErasure)
                    .actor(principal.user_id)
                    .context(serde_json::json!({
                        "recordsDeleted": response.records_deleted,
                        "remoteObjectsDeleted": response.remote_objects_deleted,
                        "remoteDeleteFailures": response.remote_delete_failures,
                        "auditEntriesDeleted": response.audit_entries_deleted,
                    })),
            )
            .await;

        tracing::info!(
            records_deleted = response.records_deleted,
            remote_delete_failures = response.remote_delete_failures,
            "User data erased"
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vidsub_core::models::{AuditLogEntry, Role, UploadRecord};
    use vidsub_core::{Clock, FixedJitter, ManualClock, StorageBackend};
    use vidsub_db::{InMemoryAuditLogStore, InMemoryUploadRecordStore};
    use vidsub_infra::RetryPolicy;
    use vidsub_storage::{MemoryStorage, ScriptedFailure, StorageOp};

    struct Fixture {
        service: PrivacyService,
        records: Arc<InMemoryUploadRecordStore>,
        audit: Arc<InMemoryAuditLogStore>,
        storage: Arc<MemoryStorage>,
    }

    async fn fixture() -> Fixture {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(Utc::now()));
        let records = Arc::new(InMemoryUploadRecordStore::new());
        let audit = Arc::new(InMemoryAuditLogStore::new());
        let storage = Arc::new(MemoryStorage::new());

        for (submission, user, key) in [(42, 100, "R1"), (43, 100, "R2"), (44, 200, "R3")] {
            let record =
                UploadRecord::new_pending(submission, 7, user, StorageBackend::Memory, key, clock.now())
                    .unwrap();
            records.replace_for_submission(&record).await.unwrap();
            storage.insert_object(key);
            audit
                .insert(
                    &AuditLogEntry::new(AuditEventType::UploadRequested, clock.now())
                        .actor(user)
                        .subject(user)
                        .submission(submission, 7),
                )
                .await
                .unwrap();
        }

        let service = PrivacyService::new(
            records.clone(),
            audit.clone(),
            storage.clone(),
            Arc::new(RetryEngine::with_jitter(
                RetryPolicy {
                    max_retries: 0,
                    ..RetryPolicy::default()
                },
                Arc::new(FixedJitter(1.0)),
            )),
            AuditLogger::new(audit.clone(), clock),
        );
        Fixture {
            service,
            records,
            audit,
            storage,
        }
    }

    #[tokio::test]
    async fn only_admins_may_erase() {
        let f = fixture().await;
        let err = f
            .service
            .erase(&Principal::new(100, Role::Student), 100)
            .await
            .unwrap_err();
        assert!(matches!(err, VideoError::PermissionDenied(_)));
        assert_eq!(f.records.len().await, 3);
    }

    #[tokio::test]
    async fn erases_only_the_named_user() {
        let f = fixture().await;
        let response = f
            .service
            .erase(&Principal::new(1, Role::Admin), 100)
            .await
            .unwrap();

        assert_eq!(response.records_deleted, 2);
        assert_eq!(response.remote_objects_deleted, 2);
        assert_eq!(response.audit_entries_deleted, 2);
        assert_eq!(f.records.len().await, 1);
        assert!(f.storage.contains("R3"));
        assert!(!f.storage.contains("R1"));

        let remaining = f.audit.all().await;
        assert!(remaining
            .iter()
            .all(|e| e.actor_id != Some(100) && e.subject_user_id != Some(100)));
        let erasure = remaining.last().unwrap();
        assert_eq!(erasure.event_type, AuditEventType::PrivacyErasure);
        assert_eq!(erasure.actor_id, Some(1));
    }

    #[tokio::test]
    async fn remote_failures_are_counted_not_fatal() {
        let f = fixture().await;
        f.storage
            .fail_next(StorageOp::DeleteObject, [ScriptedFailure::Auth]);
        let response = f
            .service
            .erase(&Principal::new(1, Role::Admin), 100)
            .await
            .unwrap();
        assert_eq!(response.remote_delete_failures, 1);
        assert_eq!(response.remote_objects_deleted, 1);
        assert_eq!(response.records_deleted, 2);
    }
}
