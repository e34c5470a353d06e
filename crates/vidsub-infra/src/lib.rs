//! vidsub Infrastructure Library
//!
//! Shared infrastructure used by the API service:
//! - Retry with exponential backoff and jitter
//! - Sliding-window rate limiting
//! - Audit trail writer
//! - Retention cleanup
//! - Telemetry initialization

#[cfg(feature = "retry")]
pub mod retry;

#[cfg(feature = "rate-limit")]
pub mod rate_limit;

#[cfg(feature = "audit")]
pub mod audit;

#[cfg(feature = "cleanup")]
pub mod cleanup;

#[cfg(feature = "observability-basic")]
pub mod telemetry;

// Re-export commonly used types
#[cfg(feature = "retry")]
pub use retry::{storage_error_class, video_error_class, ErrorClass, RetryEngine, RetryPolicy};

#[cfg(feature = "rate-limit")]
pub use rate_limit::{RateLimitPolicy, SlidingWindowLimiter};

#[cfg(feature = "audit")]
pub use audit::AuditLogger;

#[cfg(feature = "cleanup")]
pub use cleanup::{CleanupService, CleanupSummary};

#[cfg(feature = "observability-basic")]
pub use telemetry::{init_telemetry, shutdown_telemetry};
