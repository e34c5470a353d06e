use crate::keys::{check_playback_ttl, check_remote_key};
use crate::stream_token::StreamTokenSigner;
use crate::traits::{
    PlaybackCredential, RemoteObjectMetadata, RemoteState, RemoteStorage, StorageError,
    StorageResult, UploadSessionSpec, UploadTarget,
};
use crate::StorageBackend;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use vidsub_core::models::CredentialKind;

const PLAYBACK_BASE_URL: &str = "https://videodelivery.net";

/// Cloudflare Stream client using direct creator uploads.
pub struct CloudflareStreamStorage {
    http_client: Client,
    base_url: String,
    account_id: String,
    api_token: String,
    signer: Option<StreamTokenSigner>,
}

impl std::fmt::Debug for CloudflareStreamStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareStreamStorage")
            .field("base_url", &self.base_url)
            .field("account_id", &self.account_id)
            .field("local_signing", &self.signer.is_some())
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: Option<i64>,
    message: String,
}

#[derive(Debug, Deserialize)]
struct DirectUploadResult {
    #[serde(rename = "uploadURL")]
    upload_url: String,
    uid: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoStatus {
    state: String,
    #[serde(default)]
    error_reason_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoDetails {
    #[serde(default)]
    status: Option<VideoStatus>,
    /// `-1` until the video has been processed.
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    size: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TokenResult {
    token: String,
}

fn describe(errors: &[ApiMessage]) -> String {
    if errors.is_empty() {
        return "no error details".to_string();
    }
    errors
        .iter()
        .map(|e| match e.code {
            Some(code) => format!("{} ({})", e.message, code),
            None => e.message.clone(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn retry_after_secs(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}

/// Turn a non-2xx response into the matching error.
async fn error_from_response(response: Response) -> StorageError {
    let status = response.status().as_u16();
    let retry_after = retry_after_secs(&response);
    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<Envelope<serde_json::Value>>(&body) {
        Ok(envelope) if !envelope.errors.is_empty() => describe(&envelope.errors),
        _ if body.is_empty() => "empty response body".to_string(),
        _ => body.chars().take(200).collect(),
    };
    StorageError::from_status(status, message, retry_after)
}

async fn read_result<T: DeserializeOwned>(response: Response) -> StorageResult<T> {
    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }
    let envelope: Envelope<T> = response
        .json()
        .await
        .map_err(|e| StorageError::InvalidResponse(e.to_string()))?;
    if !envelope.success {
        return Err(StorageError::InvalidResponse(describe(&envelope.errors)));
    }
    envelope
        .result
        .ok_or_else(|| StorageError::InvalidResponse("response has no result".to_string()))
}

impl CloudflareStreamStorage {
    pub fn new(
        base_url: impl Into<String>,
        account_id: impl Into<String>,
        api_token: impl Into<String>,
        timeout: Duration,
        signer: Option<StreamTokenSigner>,
    ) -> StorageResult<Self> {
        let account_id = account_id.into();
        let api_token = api_token.into();
        if account_id.trim().is_empty() || api_token.trim().is_empty() {
            return Err(StorageError::ConfigError(
                "Cloudflare account id and API token are required".to_string(),
            ));
        }
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            account_id,
            api_token,
            signer,
        })
    }

    fn stream_url(&self, suffix: &str) -> String {
        format!(
            "{}/accounts/{}/stream{}",
            self.base_url, self.account_id, suffix
        )
    }

    async fn fetch_token(&self, uid: &str, ttl_secs: u64) -> StorageResult<String> {
        let exp = Utc::now().timestamp() + ttl_secs as i64;
        let response = self
            .http_client
            .post(self.stream_url(&format!("/{}/token", uid)))
            .bearer_auth(&self.api_token)
            .json(&json!({ "exp": exp }))
            .send()
            .await?;
        let result: TokenResult = read_result(response).await?;
        Ok(result.token)
    }
}

#[async_trait]
impl RemoteStorage for CloudflareStreamStorage {
    async fn create_upload_session(
        &self,
        spec: &UploadSessionSpec,
    ) -> StorageResult<UploadTarget> {
        let start = std::time::Instant::now();
        let response = self
            .http_client
            .post(self.stream_url("/direct_upload"))
            .bearer_auth(&self.api_token)
            .json(&json!({
                "maxDurationSeconds": spec.max_duration_seconds,
                "requireSignedURLs": true,
                "meta": {
                    "submissionId": spec.submission_id.to_string(),
                    "assignmentId": spec.assignment_id.to_string(),
                },
            }))
            .send()
            .await?;
        let result: DirectUploadResult = read_result(response).await?;

        if result.uid.trim().is_empty() || result.upload_url.trim().is_empty() {
            return Err(StorageError::InvalidResponse(
                "direct upload response is missing uid or uploadURL".to_string(),
            ));
        }

        tracing::info!(
            uid = %result.uid,
            submission_id = spec.submission_id,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Cloudflare direct upload created"
        );

        Ok(UploadTarget {
            upload_url: result.upload_url,
            remote_key: result.uid,
        })
    }

    async fn get_object_metadata(&self, remote_key: &str) -> StorageResult<RemoteObjectMetadata> {
        check_remote_key(remote_key)?;
        let response = self
            .http_client
            .get(self.stream_url(&format!("/{}", remote_key)))
            .bearer_auth(&self.api_token)
            .send()
            .await?;
        let details: VideoDetails = read_result(response).await?;

        let (state, error_reason) = match details.status {
            Some(status) => (
                RemoteState::from_stream_state(&status.state),
                status.error_reason_text.filter(|s| !s.is_empty()),
            ),
            None => (RemoteState::Unknown("missing".to_string()), None),
        };

        Ok(RemoteObjectMetadata {
            size_bytes: details.size.filter(|s| *s >= 0),
            duration_seconds: details.duration.filter(|d| *d >= 0.0),
            content_type: None,
            state,
            error_reason,
        })
    }

    async fn delete_object(&self, remote_key: &str) -> StorageResult<()> {
        check_remote_key(remote_key)?;
        let response = self
            .http_client
            .delete(self.stream_url(&format!("/{}", remote_key)))
            .bearer_auth(&self.api_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        tracing::info!(uid = %remote_key, "Cloudflare video deleted");
        Ok(())
    }

    async fn generate_playback_credential(
        &self,
        remote_key: &str,
        ttl: Duration,
    ) -> StorageResult<PlaybackCredential> {
        let ttl_secs = check_playback_ttl(ttl)?;
        check_remote_key(remote_key)?;

        let token = match &self.signer {
            Some(signer) => signer.sign(remote_key, Utc::now(), ttl_secs)?,
            None => self.fetch_token(remote_key, ttl_secs).await?,
        };

        Ok(PlaybackCredential {
            kind: CredentialKind::Token,
            playback_url: Some(format!(
                "{}/{}/manifest/video.m3u8",
                PLAYBACK_BASE_URL, token
            )),
            value: token,
            expires_in_seconds: ttl_secs,
        })
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Cloudflare
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PRIVATE_PEM: &str = include_str!("../tests/fixtures/test_rsa_key.pem");

    fn client(server: &MockServer, signer: Option<StreamTokenSigner>) -> CloudflareStreamStorage {
        CloudflareStreamStorage::new(
            server.uri(),
            "acct",
            "api-token",
            Duration::from_secs(5),
            signer,
        )
        .unwrap()
    }

    fn spec() -> UploadSessionSpec {
        UploadSessionSpec {
            submission_id: 42,
            assignment_id: 7,
            user_id: 100,
            mime_type: None,
            file_size: None,
            max_duration_seconds: 21600,
        }
    }

    #[tokio::test]
    async fn direct_upload_returns_uid_and_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/accounts/acct/stream/direct_upload"))
            .and(header("authorization", "Bearer api-token"))
            .and(body_partial_json(
                json!({"maxDurationSeconds": 21600, "requireSignedURLs": true}),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "errors": [],
                "result": {"uploadURL": "https://upload.example/R1", "uid": "R1"}
            })))
            .mount(&server)
            .await;

        let target = client(&server, None)
            .create_upload_session(&spec())
            .await
            .unwrap();
        assert_eq!(target.remote_key, "R1");
        assert_eq!(target.upload_url, "https://upload.example/R1");
    }

    #[tokio::test]
    async fn metadata_maps_ready_state() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/accounts/acct/stream/R1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "result": {
                    "uid": "R1",
                    "status": {"state": "ready"},
                    "duration": 120.0,
                    "size": 1024000
                }
            })))
            .mount(&server)
            .await;

        let meta = client(&server, None).get_object_metadata("R1").await.unwrap();
        assert_eq!(meta.state, RemoteState::Ready);
        assert_eq!(meta.duration_seconds, Some(120.0));
        assert_eq!(meta.size_bytes, Some(1_024_000));
    }

    #[tokio::test]
    async fn unprocessed_duration_is_dropped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/accounts/acct/stream/R1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "result": {"uid": "R1", "status": {"state": "inprogress"}, "duration": -1}
            })))
            .mount(&server)
            .await;

        let meta = client(&server, None).get_object_metadata("R1").await.unwrap();
        assert_eq!(meta.state, RemoteState::Processing);
        assert!(meta.duration_seconds.is_none());
    }

    #[tokio::test]
    async fn http_errors_are_classified() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/accounts/acct/stream/gone"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "success": false,
                "errors": [{"code": 10005, "message": "video not found"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/accounts/acct/stream/busy"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/accounts/acct/stream/denied"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let storage = client(&server, None);
        match storage.delete_object("gone").await.unwrap_err() {
            StorageError::NotFound(msg) => assert!(msg.contains("video not found")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(matches!(
            storage.delete_object("busy").await.unwrap_err(),
            StorageError::Throttled {
                retry_after: Some(7),
                ..
            }
        ));
        assert!(matches!(
            storage.delete_object("denied").await.unwrap_err(),
            StorageError::Auth(_)
        ));
    }

    #[tokio::test]
    async fn unsuccessful_envelope_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/accounts/acct/stream/direct_upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "errors": [{"code": 1, "message": "quota"}],
                "result": null
            })))
            .mount(&server)
            .await;

        let err = client(&server, None)
            .create_upload_session(&spec())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn token_endpoint_used_without_signing_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/accounts/acct/stream/R1/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "result": {"token": "tok.en.value"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let cred = client(&server, None)
            .generate_playback_credential("R1", Duration::from_secs(86400))
            .await
            .unwrap();
        assert_eq!(cred.kind, CredentialKind::Token);
        assert_eq!(cred.value, "tok.en.value");
        assert_eq!(cred.expires_in_seconds, 86400);
    }

    #[tokio::test]
    async fn local_signing_skips_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let signer = StreamTokenSigner::new("kid-1", PRIVATE_PEM).unwrap();
        let cred = client(&server, Some(signer))
            .generate_playback_credential("R1", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cred.value.split('.').count(), 3);
    }

    #[tokio::test]
    async fn oversized_ttl_rejected_before_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = client(&server, None)
            .generate_playback_credential("R1", Duration::from_secs(8 * 24 * 3600))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)));
    }
}
