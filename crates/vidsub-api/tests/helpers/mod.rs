//! Test helpers: build AppState and router over in-memory stores.
//!
//! Run from workspace root: `cargo test -p vidsub-api`.

pub mod auth;

use axum_test::TestServer;
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use vidsub_api::constants;
use vidsub_api::setup::{routes, services};
use vidsub_api::state::AppState;
use vidsub_core::{Clock, Config, FixedJitter, ManualClock, VideoConfig};
use vidsub_db::{InMemoryAuditLogStore, InMemoryUploadRecordStore};
use vidsub_infra::{RetryEngine, RetryPolicy};
use vidsub_storage::MemoryStorage;

/// API path prefix for tests (e.g. `/api/v1/upload-session`).
pub fn api_path(path: &str) -> String {
    format!("{}{}", constants::API_PREFIX, path)
}

pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub records: Arc<InMemoryUploadRecordStore>,
    pub audit: Arc<InMemoryAuditLogStore>,
    pub storage: Arc<MemoryStorage>,
    pub clock: Arc<ManualClock>,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }
}

pub async fn setup_test_app(storage: MemoryStorage) -> TestApp {
    setup_test_app_with(storage, |_| {}).await
}

/// Like [`setup_test_app`], with a hook to adjust configuration first.
pub async fn setup_test_app_with(
    storage: MemoryStorage,
    configure: impl FnOnce(&mut VideoConfig),
) -> TestApp {
    let mut video_config = VideoConfig::for_development(auth::TEST_JWT_SECRET);
    configure(&mut video_config);
    let config = Config(Box::new(video_config));

    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
    ));
    let records = Arc::new(InMemoryUploadRecordStore::new());
    let audit = Arc::new(InMemoryAuditLogStore::new());
    let storage = Arc::new(storage);
    let retry = Arc::new(RetryEngine::with_jitter(
        RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
        },
        Arc::new(FixedJitter(1.0)),
    ));

    let state = services::build_state(
        config.clone(),
        records.clone(),
        audit.clone(),
        storage.clone(),
        clock.clone() as Arc<dyn Clock>,
        retry,
    );
    let router = routes::setup_routes(&config, state.clone()).expect("Failed to build router");
    let server = TestServer::new(router).expect("Failed to start test server");

    TestApp {
        server,
        state,
        records,
        audit,
        storage,
        clock,
    }
}
