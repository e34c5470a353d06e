//! OpenAPI documentation, served at `/api/openapi.json` and rendered at `/docs`.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error;
use crate::handlers;
use vidsub_core::models;

pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "vidsub API",
        version = "0.1.0",
        description = "Video submissions for assignments: direct uploads to Cloudflare Stream or S3, upload status tracking, signed playback credentials, audit trail and retention cleanup. All endpoints are versioned under /api/v1/."
    ),
    paths(
        // Uploads
        handlers::upload_session::request_upload_session,
        handlers::upload_confirm::confirm_upload,
        handlers::upload_retry::retry_upload,
        handlers::upload_cleanup::cleanup_failed_upload,
        handlers::upload_status::get_upload_status,
        // Playback
        handlers::playback::get_playback_credential,
        // Audit
        handlers::audit::list_audit_entries,
        // Privacy
        handlers::privacy::erase_user_data,
    ),
    components(
        schemas(
            models::UploadSessionRequest,
            models::UploadSessionResponse,
            models::ConfirmUploadRequest,
            models::ConfirmUploadResponse,
            models::RetryUploadRequest,
            models::CleanupFailedUploadRequest,
            models::CleanupFailedUploadResponse,
            models::UploadRecordView,
            models::UploadStatus,
            models::PlaybackCredentialResponse,
            models::CredentialKind,
            models::AuditLogEntry,
            models::AuditEventType,
            models::PrivacyEraseRequest,
            models::PrivacyEraseResponse,
            error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "uploads", description = "Direct upload sessions and upload lifecycle"),
        (name = "playback", description = "Signed playback credentials"),
        (name = "audit", description = "Audit trail for graders and administrators"),
        (name = "privacy", description = "User data erasure")
    )
)]
pub struct ApiDoc;
