//! Application state shared by every handler.

use crate::auth::middleware::AuthState;
use crate::services::{AccessGate, PlaybackService, PrivacyService, UploadTracker};
use std::sync::Arc;
use vidsub_core::{Clock, Config};
use vidsub_db::{AuditLogStore, UploadRecordStore};
use vidsub_infra::{AuditLogger, CleanupService, SlidingWindowLimiter};
use vidsub_storage::RemoteStorage;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub records: Arc<dyn UploadRecordStore>,
    pub audit_store: Arc<dyn AuditLogStore>,
    pub storage: Arc<dyn RemoteStorage>,
    pub clock: Arc<dyn Clock>,
    pub auth: Arc<AuthState>,
    pub gate: AccessGate,
    pub tracker: UploadTracker,
    pub playback: PlaybackService,
    pub privacy: PrivacyService,
    pub audit: AuditLogger,
    pub limiter: Arc<SlidingWindowLimiter>,
    /// Retention sweep; started by `setup::services::initialize_services`.
    pub cleanup: Arc<CleanupService>,
}
