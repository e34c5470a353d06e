//! In-process remote store.
//!
//! Backs the `memory` storage backend in development and lets tests script
//! remote behaviour: failures per operation, fixed remote keys, artificial
//! latency and the state an uploaded object reports.

use crate::keys::{check_playback_ttl, check_remote_key};
use crate::traits::{
    PlaybackCredential, RemoteObjectMetadata, RemoteState, RemoteStorage, StorageError,
    StorageResult, UploadSessionSpec, UploadTarget,
};
use crate::StorageBackend;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;
use vidsub_core::models::CredentialKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageOp {
    CreateUploadSession,
    GetObjectMetadata,
    DeleteObject,
    GeneratePlaybackCredential,
}

/// Failure to inject into the next call of an operation.
#[derive(Debug, Clone)]
pub enum ScriptedFailure {
    Network,
    Throttled { retry_after: Option<u64> },
    Server(u16),
    Auth,
    NotFound,
}

impl ScriptedFailure {
    fn into_error(self, key: &str) -> StorageError {
        match self {
            ScriptedFailure::Network => StorageError::Network("connection reset by peer".into()),
            ScriptedFailure::Throttled { retry_after } => StorageError::Throttled {
                message: "too many requests".into(),
                retry_after,
            },
            ScriptedFailure::Server(status) => StorageError::Http {
                status,
                message: "internal error".into(),
            },
            ScriptedFailure::Auth => StorageError::Auth("invalid API token".into()),
            ScriptedFailure::NotFound => StorageError::NotFound(key.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
struct MemoryObject {
    size_bytes: Option<i64>,
    duration_seconds: Option<f64>,
    state: RemoteState,
}

#[derive(Default)]
struct Inner {
    objects: HashMap<String, MemoryObject>,
    failures: HashMap<StorageOp, VecDeque<ScriptedFailure>>,
    calls: HashMap<StorageOp, usize>,
    next_keys: VecDeque<String>,
    latency: Option<Duration>,
}

#[derive(Default)]
pub struct MemoryStorage {
    inner: Mutex<Inner>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remote keys handed out by upcoming upload sessions, in order.
    pub fn with_keys<I, S>(self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock().next_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Sleep this long inside every call.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.lock().latency = Some(latency);
        self
    }

    /// Make the next `failures.len()` calls of `op` fail, in order.
    pub fn fail_next(&self, op: StorageOp, failures: impl IntoIterator<Item = ScriptedFailure>) {
        self.lock()
            .failures
            .entry(op)
            .or_default()
            .extend(failures);
    }

    /// Simulate the client finishing its upload and the store processing it.
    pub fn complete_upload(&self, remote_key: &str, size_bytes: i64, duration_seconds: f64) {
        self.lock().objects.insert(
            remote_key.to_string(),
            MemoryObject {
                size_bytes: Some(size_bytes),
                duration_seconds: Some(duration_seconds),
                state: RemoteState::Ready,
            },
        );
    }

    /// Override the state an object reports.
    pub fn set_state(&self, remote_key: &str, state: RemoteState) {
        if let Some(object) = self.lock().objects.get_mut(remote_key) {
            object.state = state;
        }
    }

    /// Add an object without going through an upload session.
    pub fn insert_object(&self, remote_key: &str) {
        self.complete_upload(remote_key, 0, 0.0);
    }

    pub fn contains(&self, remote_key: &str) -> bool {
        self.lock().objects.contains_key(remote_key)
    }

    pub fn object_count(&self) -> usize {
        self.lock().objects.len()
    }

    pub fn calls(&self, op: StorageOp) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A panic while holding the lock only happens in a failing test.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Count the call and pop a scripted failure, if any.
    async fn enter(&self, op: StorageOp, key: &str) -> StorageResult<()> {
        let (latency, failure) = {
            let mut inner = self.lock();
            *inner.calls.entry(op).or_insert(0) += 1;
            let failure = inner.failures.get_mut(&op).and_then(|q| q.pop_front());
            (inner.latency, failure)
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        match failure {
            Some(failure) => Err(failure.into_error(key)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RemoteStorage for MemoryStorage {
    async fn create_upload_session(
        &self,
        spec: &UploadSessionSpec,
    ) -> StorageResult<UploadTarget> {
        self.enter(StorageOp::CreateUploadSession, "").await?;
        let mut inner = self.lock();
        let key = inner
            .next_keys
            .pop_front()
            .unwrap_or_else(|| format!("mem-{}-{}", spec.submission_id, Uuid::new_v4().simple()));
        inner.objects.insert(
            key.clone(),
            MemoryObject {
                size_bytes: None,
                duration_seconds: None,
                state: RemoteState::Processing,
            },
        );
        Ok(UploadTarget {
            upload_url: format!("http://localhost/memory-upload/{}", key),
            remote_key: key,
        })
    }

    async fn get_object_metadata(&self, remote_key: &str) -> StorageResult<RemoteObjectMetadata> {
        check_remote_key(remote_key)?;
        self.enter(StorageOp::GetObjectMetadata, remote_key).await?;
        let inner = self.lock();
        let object = inner
            .objects
            .get(remote_key)
            .ok_or_else(|| StorageError::NotFound(remote_key.to_string()))?;
        Ok(RemoteObjectMetadata {
            size_bytes: object.size_bytes,
            duration_seconds: object.duration_seconds,
            content_type: Some("video/mp4".to_string()),
            error_reason: (object.state == RemoteState::Error)
                .then(|| "processing failed".to_string()),
            state: object.state.clone(),
        })
    }

    async fn delete_object(&self, remote_key: &str) -> StorageResult<()> {
        check_remote_key(remote_key)?;
        self.enter(StorageOp::DeleteObject, remote_key).await?;
        match self.lock().objects.remove(remote_key) {
            Some(_) => Ok(()),
            None => Err(StorageError::NotFound(remote_key.to_string())),
        }
    }

    async fn generate_playback_credential(
        &self,
        remote_key: &str,
        ttl: Duration,
    ) -> StorageResult<PlaybackCredential> {
        let ttl_secs = check_playback_ttl(ttl)?;
        check_remote_key(remote_key)?;
        self.enter(StorageOp::GeneratePlaybackCredential, remote_key)
            .await?;
        let expires = Utc::now().timestamp() + ttl_secs as i64;
        let url = format!(
            "http://localhost/memory-playback/{}?expires={}&sig={}",
            remote_key,
            expires,
            Uuid::new_v4().simple()
        );
        Ok(PlaybackCredential {
            kind: CredentialKind::SignedUrl,
            playback_url: Some(url.clone()),
            value: url,
            expires_in_seconds: ttl_secs,
        })
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}
