use super::SlidingWindowLimiter;
use std::sync::Arc;
use std::time::Duration;
use vidsub_core::models::Principal;
use vidsub_core::{Config, VideoResult};

/// Upload and playback limits applied on top of the limiter.
///
/// Uploads are counted per (user, assignment) and playback per (user, video).
/// Site admins and principals holding the bypass capability are never limited.
#[derive(Clone)]
pub struct RateLimitPolicy {
    limiter: Arc<SlidingWindowLimiter>,
    upload_limit: u32,
    playback_limit: u32,
    window: Duration,
}

impl RateLimitPolicy {
    pub fn new(
        limiter: Arc<SlidingWindowLimiter>,
        upload_limit: u32,
        playback_limit: u32,
        window: Duration,
    ) -> Self {
        Self {
            limiter,
            upload_limit,
            playback_limit,
            window,
        }
    }

    pub fn from_config(limiter: Arc<SlidingWindowLimiter>, config: &Config) -> Self {
        Self::new(
            limiter,
            config.upload_rate_limit(),
            config.playback_rate_limit(),
            Duration::from_secs(config.rate_limit_window_secs()),
        )
    }

    pub fn limiter(&self) -> &Arc<SlidingWindowLimiter> {
        &self.limiter
    }

    pub async fn check_upload(&self, principal: &Principal, assignment_id: i64) -> VideoResult<()> {
        if principal.bypasses_rate_limit() {
            return Ok(());
        }
        self.limiter
            .check(
                principal.user_id,
                &format!("upload:{}", assignment_id),
                self.upload_limit,
                self.window,
            )
            .await
    }

    pub async fn check_playback(&self, principal: &Principal, remote_key: &str) -> VideoResult<()> {
        if principal.bypasses_rate_limit() {
            return Ok(());
        }
        self.limiter
            .check(
                principal.user_id,
                &format!("playback:{}", remote_key),
                self.playback_limit,
                self.window,
            )
            .await
    }
}
