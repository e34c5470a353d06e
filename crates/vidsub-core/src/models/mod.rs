pub mod audit;
pub mod playback;
pub mod principal;
pub mod privacy;
pub mod upload;
pub mod upload_session;

pub use audit::{AuditEventType, AuditLogEntry};
pub use playback::{CredentialKind, PlaybackCredentialQuery, PlaybackCredentialResponse};
pub use principal::{Principal, Role};
pub use privacy::{PrivacyEraseRequest, PrivacyEraseResponse};
pub use upload::{RecordUpdate, UploadRecord, UploadRecordView, UploadStatus};
pub use upload_session::{
    CleanupFailedUploadRequest, CleanupFailedUploadResponse, ConfirmUploadRequest,
    ConfirmUploadResponse, RetryUploadRequest, UploadSessionRequest, UploadSessionResponse,
    UploadStatusQuery,
};
