//! Database repositories for data access layer
//
// PostgreSQL repositories
pub mod audit_log;
pub mod upload_record;
//
// In-process stores
pub mod memory;

pub use audit_log::{AuditLogRepository, AuditLogStore};
pub use memory::{InMemoryAuditLogStore, InMemoryUploadRecordStore};
pub use upload_record::{UploadRecordRepository, UploadRecordStore};
