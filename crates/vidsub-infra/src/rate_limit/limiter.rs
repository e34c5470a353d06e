use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use vidsub_core::{Clock, VideoError, VideoResult};

/// Timestamps (epoch millis) of accepted requests inside the trailing window.
#[derive(Debug)]
struct Window {
    hits: VecDeque<i64>,
    window_ms: i64,
}

impl Window {
    fn evict_before(&mut self, cutoff_ms: i64) {
        while self.hits.front().is_some_and(|t| *t <= cutoff_ms) {
            self.hits.pop_front();
        }
    }

    fn is_expired(&self, now_ms: i64) -> bool {
        self.hits
            .back()
            .map_or(true, |newest| *newest <= now_ms - self.window_ms)
    }
}

/// Sharded sliding-window limiter.
///
/// Keys hash to one of several shards so unrelated users rarely contend on the
/// same lock. Expired windows are dropped by [`sweep_expired`](Self::sweep_expired)
/// and opportunistically when a shard grows past its key budget.
#[derive(Clone)]
pub struct SlidingWindowLimiter {
    shards: Vec<Arc<Mutex<HashMap<String, Window>>>>,
    shard_count: usize,
    max_keys_per_shard: usize,
    clock: Arc<dyn Clock>,
}

impl SlidingWindowLimiter {
    /// Create a new limiter (default 16 shards).
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_shards(clock, 16, 10_000)
    }

    pub fn with_shards(clock: Arc<dyn Clock>, shard_count: usize, max_keys_per_shard: usize) -> Self {
        let shard_count = shard_count.max(1);
        let shards = (0..shard_count)
            .map(|_| Arc::new(Mutex::new(HashMap::new())))
            .collect();
        Self {
            shards,
            shard_count,
            max_keys_per_shard,
            clock,
        }
    }

    fn shard_index(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.shard_count
    }

    /// Admit or reject one request for `(user_id, scope_key)`.
    ///
    /// Rejection carries the number of seconds until the oldest request in the
    /// window ages out (at least 1).
    #[tracing::instrument(skip(self))]
    pub async fn check(
        &self,
        user_id: i64,
        scope_key: &str,
        limit: u32,
        window: Duration,
    ) -> VideoResult<()> {
        let key = format!("{}:{}", user_id, scope_key);
        let now_ms = self.clock.now().timestamp_millis();
        let window_ms = window.as_millis().min(i64::MAX as u128) as i64;
        let cutoff_ms = now_ms - window_ms;

        let shard = &self.shards[self.shard_index(&key)];
        let mut windows = shard.lock().await;

        if windows.len() >= self.max_keys_per_shard && !windows.contains_key(&key) {
            windows.retain(|_, w| !w.is_expired(now_ms));
        }

        let entry = windows.entry(key).or_insert_with(|| Window {
            hits: VecDeque::new(),
            window_ms,
        });
        entry.window_ms = window_ms;
        entry.evict_before(cutoff_ms);

        if entry.hits.len() >= limit as usize {
            let oldest = entry.hits.front().copied().unwrap_or(now_ms);
            let wait_ms = (oldest + window_ms - now_ms).max(0);
            let retry_after = ((wait_ms + 999) / 1000).max(1) as u64;
            tracing::debug!(
                user_id,
                scope = scope_key,
                limit,
                retry_after,
                "Rate limit exceeded"
            );
            return Err(VideoError::RateLimited {
                scope: scope_key
                    .split(':')
                    .next()
                    .unwrap_or(scope_key)
                    .to_string(),
                retry_after,
            });
        }

        entry.hits.push_back(now_ms);
        Ok(())
    }

    /// Drop every window with no request inside it. Returns how many were removed.
    pub async fn sweep_expired(&self) -> usize {
        let now_ms = self.clock.now().timestamp_millis();
        let mut removed = 0;
        for shard in &self.shards {
            let mut windows = shard.lock().await;
            let before = windows.len();
            windows.retain(|_, w| !w.is_expired(now_ms));
            removed += before - windows.len();
        }
        removed
    }

    pub async fn tracked_keys(&self) -> usize {
        let mut total = 0;
        for shard in &self.shards {
            total += shard.lock().await.len();
        }
        total
    }

    /// Periodically sweep expired windows so memory stays bounded.
    pub fn start_sweeper(self: Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let removed = self.sweep_expired().await;
                if removed > 0 {
                    tracing::debug!(removed, "Swept expired rate limit windows");
                }
            }
        })
    }
}
