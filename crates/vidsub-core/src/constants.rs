//! Defaults and hard limits.

/// Longest lifetime a playback credential may be issued for.
pub const MAX_PLAYBACK_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Default lifetime of an issued playback credential.
pub const DEFAULT_PLAYBACK_TTL_SECS: u64 = 24 * 60 * 60;

/// Cloudflare Stream refuses direct uploads longer than six hours.
pub const MAX_UPLOAD_DURATION_SECS: u32 = 6 * 60 * 60;

pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 5 * 1024 * 1024 * 1024;

pub const DEFAULT_RETENTION_DAYS: i64 = 90;

pub const DEFAULT_UPLOAD_RATE_LIMIT: u32 = 10;
pub const DEFAULT_PLAYBACK_RATE_LIMIT: u32 = 100;
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 3600;

pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1000;
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 30_000;

/// Stored error messages are truncated to this many characters.
pub const ERROR_MESSAGE_MAX_LEN: usize = 1000;

/// Lifetime of a presigned direct-upload URL.
pub const UPLOAD_URL_TTL_SECS: u64 = 60 * 60;
