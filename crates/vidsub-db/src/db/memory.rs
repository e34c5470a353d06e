//! In-memory stores used when no `DATABASE_URL` is configured, and by tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use vidsub_core::models::{AuditLogEntry, UploadRecord, UploadStatus};
use vidsub_core::{VideoError, VideoResult};

use super::audit_log::AuditLogStore;
use super::upload_record::UploadRecordStore;

/// Records keyed by submission id.
#[derive(Default)]
pub struct InMemoryUploadRecordStore {
    records: RwLock<HashMap<i64, UploadRecord>>,
}

impl InMemoryUploadRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl UploadRecordStore for InMemoryUploadRecordStore {
    async fn get_by_submission(&self, submission_id: i64) -> VideoResult<Option<UploadRecord>> {
        Ok(self.records.read().await.get(&submission_id).cloned())
    }

    async fn get_by_remote_key(&self, remote_key: &str) -> VideoResult<Option<UploadRecord>> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.remote_key == remote_key)
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn find_for_owner(
        &self,
        user_id: i64,
        assignment_id: i64,
    ) -> VideoResult<Option<UploadRecord>> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.user_id == user_id && r.assignment_id == assignment_id)
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn replace_for_submission(
        &self,
        record: &UploadRecord,
    ) -> VideoResult<Option<UploadRecord>> {
        let mut records = self.records.write().await;
        Ok(records.insert(record.submission_id, record.clone()))
    }

    async fn update(&self, record: &UploadRecord) -> VideoResult<()> {
        let mut records = self.records.write().await;
        match records.get_mut(&record.submission_id) {
            Some(existing) if existing.id == record.id => {
                *existing = record.clone();
                Ok(())
            }
            _ => Err(VideoError::NotFound(format!(
                "Upload record for submission {} no longer exists",
                record.submission_id
            ))),
        }
    }

    async fn delete_by_submission(&self, submission_id: i64) -> VideoResult<bool> {
        Ok(self.records.write().await.remove(&submission_id).is_some())
    }

    async fn find_expired(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> VideoResult<Vec<UploadRecord>> {
        let records = self.records.read().await;
        let mut expired: Vec<UploadRecord> = records
            .values()
            .filter(|r| matches!(r.status, UploadStatus::Ready | UploadStatus::Error))
            .filter(|r| r.deleted_at.is_none())
            .filter(|r| r.uploaded_at.is_some_and(|at| at < cutoff))
            .cloned()
            .collect();
        expired.sort_by_key(|r| r.uploaded_at);
        expired.truncate(limit.max(0) as usize);
        Ok(expired)
    }

    async fn list_for_user(&self, user_id: i64) -> VideoResult<Vec<UploadRecord>> {
        let mut records: Vec<UploadRecord> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }

    async fn delete_for_user(&self, user_id: i64) -> VideoResult<u64> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, r| r.user_id != user_id);
        Ok((before - records.len()) as u64)
    }

    async fn ping(&self) -> VideoResult<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryAuditLogStore {
    entries: RwLock<Vec<AuditLogEntry>>,
}

impl InMemoryAuditLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every entry, oldest first.
    pub async fn all(&self) -> Vec<AuditLogEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl AuditLogStore for InMemoryAuditLogStore {
    async fn insert(&self, entry: &AuditLogEntry) -> VideoResult<()> {
        self.entries.write().await.push(entry.clone());
        Ok(())
    }

    async fn list_by_submission(
        &self,
        submission_id: i64,
        limit: i64,
    ) -> VideoResult<Vec<AuditLogEntry>> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .rev()
            .filter(|e| e.submission_id == Some(submission_id))
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn delete_for_user(&self, user_id: i64) -> VideoResult<u64> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|e| e.actor_id != Some(user_id) && e.subject_user_id != Some(user_id));
        Ok((before - entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use vidsub_core::models::{AuditEventType, RecordUpdate};
    use vidsub_core::StorageBackend;

    fn pending(submission_id: i64, key: &str, now: DateTime<Utc>) -> UploadRecord {
        UploadRecord::new_pending(submission_id, 7, 100, StorageBackend::Memory, key, now).unwrap()
    }

    #[tokio::test]
    async fn replace_keeps_one_record_per_submission() {
        let store = InMemoryUploadRecordStore::new();
        let now = Utc::now();

        assert!(store
            .replace_for_submission(&pending(42, "R1", now))
            .await
            .unwrap()
            .is_none());
        let previous = store
            .replace_for_submission(&pending(42, "R2", now))
            .await
            .unwrap();

        assert_eq!(previous.unwrap().remote_key, "R1");
        assert_eq!(store.len().await, 1);
        let current = store.get_by_submission(42).await.unwrap().unwrap();
        assert_eq!(current.remote_key, "R2");
        assert!(store.get_by_remote_key("R1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_of_replaced_record_is_not_found() {
        let store = InMemoryUploadRecordStore::new();
        let now = Utc::now();
        let stale = pending(42, "R1", now);
        store.replace_for_submission(&stale).await.unwrap();
        store
            .replace_for_submission(&pending(42, "R2", now))
            .await
            .unwrap();

        let err = store.update(&stale).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn find_expired_honours_status_and_cutoff() {
        let store = InMemoryUploadRecordStore::new();
        let t0 = Utc::now() - Duration::days(100);

        let old_ready = pending(1, "A", t0)
            .applied(RecordUpdate::status(UploadStatus::Ready), t0)
            .unwrap();
        let old_pending = pending(2, "B", t0);
        let fresh_ready = pending(3, "C", Utc::now())
            .applied(RecordUpdate::status(UploadStatus::Ready), Utc::now())
            .unwrap();
        for r in [&old_ready, &old_pending, &fresh_ready] {
            store.replace_for_submission(r).await.unwrap();
        }

        let cutoff = Utc::now() - Duration::days(90);
        let expired = store.find_expired(cutoff, 100).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].submission_id, 1);
    }

    #[tokio::test]
    async fn audit_delete_for_user_matches_actor_and_subject() {
        let store = InMemoryAuditLogStore::new();
        let now = Utc::now();
        store
            .insert(&AuditLogEntry::new(AuditEventType::PlaybackAccess, now).actor(5).subject(100).submission(42, 7))
            .await
            .unwrap();
        store
            .insert(&AuditLogEntry::new(AuditEventType::UploadRequested, now).actor(100).submission(42, 7))
            .await
            .unwrap();
        store
            .insert(&AuditLogEntry::new(AuditEventType::UploadRequested, now).actor(200).submission(43, 7))
            .await
            .unwrap();

        assert_eq!(store.delete_for_user(100).await.unwrap(), 2);
        assert_eq!(store.list_by_submission(42, 10).await.unwrap().len(), 0);
        assert_eq!(store.list_by_submission(43, 10).await.unwrap().len(), 1);
    }
}
