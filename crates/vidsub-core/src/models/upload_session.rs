//! Request and response bodies for the upload endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::upload::UploadStatus;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadSessionRequest {
    #[validate(range(min = 1))]
    pub assignment_id: i64,
    /// Omit to reuse the caller's existing submission for this assignment.
    #[validate(range(min = 1))]
    pub submission_id: Option<i64>,
    /// Student the submission belongs to, when a grader starts it on their behalf.
    #[validate(range(min = 1))]
    pub owner_id: Option<i64>,
    /// Only used by the S3 backend to pick the object extension.
    pub mime_type: Option<String>,
    pub file_size: Option<u64>,
    #[validate(range(min = 1))]
    pub max_duration_seconds: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadSessionResponse {
    pub submission_id: i64,
    pub upload_url: String,
    pub remote_key: String,
    pub status: UploadStatus,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmUploadRequest {
    #[validate(range(min = 1))]
    pub submission_id: i64,
    #[validate(length(min = 1, max = 255))]
    pub remote_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmUploadResponse {
    pub submission_id: i64,
    pub status: UploadStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CleanupFailedUploadRequest {
    #[validate(range(min = 1))]
    pub submission_id: i64,
    #[validate(length(min = 1, max = 255))]
    pub remote_key: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CleanupFailedUploadResponse {
    pub deleted_remote: bool,
    pub deleted_local: bool,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RetryUploadRequest {
    #[validate(range(min = 1))]
    pub submission_id: i64,
    pub mime_type: Option<String>,
    #[validate(range(min = 1))]
    pub max_duration_seconds: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Validate, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct UploadStatusQuery {
    #[validate(range(min = 1))]
    pub submission_id: i64,
}
