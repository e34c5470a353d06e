use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// How the client presents the credential to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    /// Cloudflare Stream signed token, used in place of the video id.
    Token,
    /// Fully signed URL (CloudFront or S3 presigned GET).
    SignedUrl,
}

#[derive(Debug, Clone, Deserialize, Validate, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PlaybackCredentialQuery {
    #[validate(range(min = 1))]
    pub submission_id: i64,
    #[validate(length(min = 1, max = 255))]
    pub remote_key: String,
    /// Requested lifetime in seconds; defaults to one day, capped at seven.
    pub ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackCredentialResponse {
    pub credential: String,
    pub credential_type: CredentialKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playback_url: Option<String>,
    pub expires_in_seconds: u64,
}
