//! API constants
//!
//! Routes and the OpenAPI document are both built from these values.

/// API base path prefix (version-independent)
pub const API_BASE: &str = "/api";

pub const API_VERSION: &str = "v1";

/// Prefix every protected route is nested under.
pub const API_PREFIX: &str = "/api/v1";

/// Maximum number of audit entries returned by the audit query.
pub const AUDIT_QUERY_LIMIT: i64 = 100;

/// Timeout for each dependency probed by the readiness check.
pub const READINESS_TIMEOUT_SECS: u64 = 5;
