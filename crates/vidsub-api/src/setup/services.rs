//! Service wiring

use anyhow::Result;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use vidsub_core::{Clock, Config, SystemClock};
use vidsub_db::{
    AuditLogRepository, AuditLogStore, InMemoryAuditLogStore, InMemoryUploadRecordStore,
    UploadRecordRepository, UploadRecordStore,
};
use vidsub_infra::{
    AuditLogger, CleanupService, RateLimitPolicy, RetryEngine, RetryPolicy, SlidingWindowLimiter,
};
use vidsub_storage::RemoteStorage;

use crate::auth::middleware::AuthState;
use crate::services::upload_tracker::UploadLimits;
use crate::services::{AccessGate, PlaybackService, PrivacyService, UploadTracker};
use crate::state::AppState;

const RATE_LIMIT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Build the state and start its background tasks (retention sweep and
/// rate-limit window sweeper).
pub async fn initialize_services(
    config: &Config,
    pool: Option<PgPool>,
    storage: Arc<dyn RemoteStorage>,
) -> Result<Arc<AppState>> {
    let (records, audit_store): (Arc<dyn UploadRecordStore>, Arc<dyn AuditLogStore>) = match pool
    {
        Some(pool) => (
            Arc::new(UploadRecordRepository::new(pool.clone())),
            Arc::new(AuditLogRepository::new(pool)),
        ),
        None => (
            Arc::new(InMemoryUploadRecordStore::new()),
            Arc::new(InMemoryAuditLogStore::new()),
        ),
    };

    let retry = Arc::new(RetryEngine::new(RetryPolicy::from_config(config)));
    tracing::info!(
        max_retries = retry.policy().max_retries,
        base_delay_ms = retry.policy().base_delay.as_millis() as u64,
        max_delay_ms = retry.policy().max_delay.as_millis() as u64,
        "Retry policy configured"
    );

    let state = build_state(
        config.clone(),
        records,
        audit_store,
        storage,
        Arc::new(SystemClock),
        retry,
    );

    state.cleanup.clone().start();
    tracing::info!(
        retention_days = config.retention_days(),
        interval_secs = config.cleanup_interval_secs(),
        "Video retention cleanup started"
    );

    state.limiter.clone().start_sweeper(RATE_LIMIT_SWEEP_INTERVAL);
    tracing::info!(
        upload_limit = config.upload_rate_limit(),
        playback_limit = config.playback_rate_limit(),
        window_secs = config.rate_limit_window_secs(),
        "Rate limiting enabled"
    );

    Ok(state)
}

/// Wire every service over the given stores. No background task is started.
pub fn build_state(
    config: Config,
    records: Arc<dyn UploadRecordStore>,
    audit_store: Arc<dyn AuditLogStore>,
    storage: Arc<dyn RemoteStorage>,
    clock: Arc<dyn Clock>,
    retry: Arc<RetryEngine>,
) -> Arc<AppState> {
    let audit = AuditLogger::new(audit_store.clone(), clock.clone());
    let limiter = Arc::new(SlidingWindowLimiter::new(clock.clone()));
    let rate_limits = RateLimitPolicy::from_config(limiter.clone(), &config);
    let gate = AccessGate::new(records.clone());

    let tracker = UploadTracker::new(
        records.clone(),
        storage.clone(),
        retry.clone(),
        rate_limits.clone(),
        audit.clone(),
        clock.clone(),
        UploadLimits::from_config(&config),
    );
    let playback = PlaybackService::new(
        gate.clone(),
        storage.clone(),
        retry.clone(),
        rate_limits,
        audit.clone(),
        config.playback_token_ttl_secs(),
    );
    let privacy = PrivacyService::new(
        records.clone(),
        audit_store.clone(),
        storage.clone(),
        retry.clone(),
        audit.clone(),
    );
    let cleanup = Arc::new(CleanupService::from_config(
        &config,
        records.clone(),
        storage.clone(),
        retry,
        audit.clone(),
        clock.clone(),
    ));

    Arc::new(AppState {
        auth: Arc::new(AuthState::new(config.jwt_secret())),
        config,
        records,
        audit_store,
        storage,
        clock,
        gate,
        tracker,
        playback,
        privacy,
        audit,
        limiter,
        cleanup,
    })
}
