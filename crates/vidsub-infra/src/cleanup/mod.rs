//! Retention cleanup of expired videos.

mod service;

pub use service::{CleanupService, CleanupSummary};
