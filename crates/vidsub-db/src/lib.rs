//! vidsub persistence
//!
//! Upload records and the audit trail, behind store traits with a PostgreSQL
//! implementation and an in-memory one for development and tests.

pub mod db;

pub use db::{
    AuditLogRepository, AuditLogStore, InMemoryAuditLogStore, InMemoryUploadRecordStore,
    UploadRecordRepository, UploadRecordStore,
};
