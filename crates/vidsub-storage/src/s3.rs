use crate::cloudfront::CloudFrontSigner;
use crate::keys::{check_playback_ttl, check_remote_key, submission_object_key};
use crate::traits::{
    PlaybackCredential, RemoteObjectMetadata, RemoteState, RemoteStorage, StorageError,
    StorageResult, UploadSessionSpec, UploadTarget,
};
use crate::StorageBackend;
use async_trait::async_trait;
use chrono::Utc;
use http::Method;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::Error as ObjectStoreError;
use object_store::{ObjectStoreExt, Result as ObjectResult};
use std::time::Duration;
use vidsub_core::constants::UPLOAD_URL_TTL_SECS;
use vidsub_core::models::CredentialKind;

/// S3 storage for submission videos. Uploads go straight to the bucket via a
/// presigned PUT; playback goes through CloudFront when a signer is set and
/// falls back to a presigned GET otherwise.
pub struct S3VideoStorage {
    store: AmazonS3,
    bucket: String,
    cloudfront: Option<CloudFrontSigner>,
}

fn map_object_error(err: ObjectStoreError, key: &str) -> StorageError {
    match err {
        ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.to_string()),
        ObjectStoreError::PermissionDenied { .. } | ObjectStoreError::Unauthenticated { .. } => {
            StorageError::Auth(err.to_string())
        }
        ObjectStoreError::InvalidPath { .. } => StorageError::InvalidKey(err.to_string()),
        ObjectStoreError::Precondition { .. } => StorageError::Http {
            status: 412,
            message: err.to_string(),
        },
        ObjectStoreError::AlreadyExists { .. } => StorageError::Http {
            status: 409,
            message: err.to_string(),
        },
        ObjectStoreError::NotImplemented { .. }
        | ObjectStoreError::NotSupported { .. }
        | ObjectStoreError::UnknownConfigurationKey { .. } => {
            StorageError::ConfigError(err.to_string())
        }
        other => StorageError::Network(other.to_string()),
    }
}

impl S3VideoStorage {
    /// Create a new S3VideoStorage instance
    ///
    /// `endpoint_url` points at S3-compatible providers such as MinIO.
    pub fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
        cloudfront: Option<CloudFrontSigner>,
    ) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region)
            .with_bucket_name(bucket.clone());

        if let Some(ref endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(Self {
            store,
            bucket,
            cloudfront,
        })
    }
}

#[async_trait]
impl RemoteStorage for S3VideoStorage {
    async fn create_upload_session(
        &self,
        spec: &UploadSessionSpec,
    ) -> StorageResult<UploadTarget> {
        let key = submission_object_key(
            spec.assignment_id,
            spec.submission_id,
            spec.mime_type.as_deref(),
        )?;
        let location = Path::from(key.clone());

        let url_result: ObjectResult<_> = self
            .store
            .signed_url(
                Method::PUT,
                &location,
                Duration::from_secs(UPLOAD_URL_TTL_SECS),
            )
            .await;
        let url = url_result
            .map_err(|e| StorageError::Signing(e.to_string()))?
            .to_string();

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            submission_id = spec.submission_id,
            "S3 presigned upload created"
        );

        Ok(UploadTarget {
            upload_url: url,
            remote_key: key,
        })
    }

    async fn get_object_metadata(&self, remote_key: &str) -> StorageResult<RemoteObjectMetadata> {
        check_remote_key(remote_key)?;
        let location = Path::from(remote_key.to_string());
        let meta = self
            .store
            .head(&location)
            .await
            .map_err(|e| map_object_error(e, remote_key))?;

        // S3 has no processing step; an object that exists is playable.
        Ok(RemoteObjectMetadata {
            size_bytes: i64::try_from(meta.size).ok(),
            duration_seconds: None,
            content_type: None,
            state: RemoteState::Ready,
            error_reason: None,
        })
    }

    async fn delete_object(&self, remote_key: &str) -> StorageResult<()> {
        check_remote_key(remote_key)?;
        let start = std::time::Instant::now();
        let location = Path::from(remote_key.to_string());

        // S3 deletes are idempotent, so probe first to report absence.
        self.store
            .head(&location)
            .await
            .map_err(|e| map_object_error(e, remote_key))?;

        let result: ObjectResult<_> = self.store.delete(&location).await;
        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %remote_key,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 delete failed"
            );
            map_object_error(e, remote_key)
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %remote_key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );
        Ok(())
    }

    async fn generate_playback_credential(
        &self,
        remote_key: &str,
        ttl: Duration,
    ) -> StorageResult<PlaybackCredential> {
        let ttl_secs = check_playback_ttl(ttl)?;
        check_remote_key(remote_key)?;

        let url = match &self.cloudfront {
            Some(signer) => signer.sign_url(remote_key, Utc::now(), ttl_secs)?,
            None => {
                let location = Path::from(remote_key.to_string());
                let url_result: ObjectResult<_> =
                    self.store.signed_url(Method::GET, &location, ttl).await;
                url_result
                    .map_err(|e| StorageError::Signing(e.to_string()))?
                    .to_string()
            }
        };

        Ok(PlaybackCredential {
            kind: CredentialKind::SignedUrl,
            playback_url: Some(url.clone()),
            value: url,
            expires_in_seconds: ttl_secs,
        })
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> S3VideoStorage {
        // Static credentials so presigning works without touching the network.
        std::env::set_var("AWS_ACCESS_KEY_ID", "AKIDEXAMPLE");
        std::env::set_var("AWS_SECRET_ACCESS_KEY", "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY");
        S3VideoStorage::new("videos".into(), "us-east-1".into(), None, None).unwrap()
    }

    #[test]
    fn client_side_object_store_errors_are_terminal() {
        let precondition = map_object_error(
            ObjectStoreError::Precondition {
                path: "submissions/7/42/a.mp4".into(),
                source: "etag mismatch".into(),
            },
            "submissions/7/42/a.mp4",
        );
        assert!(matches!(precondition, StorageError::Http { status: 412, .. }));
        assert!(!precondition.is_retryable());

        let unsupported = map_object_error(
            ObjectStoreError::NotImplemented {
                operation: "put_multipart".into(),
                implementer: "s3".into(),
            },
            "k",
        );
        assert!(matches!(unsupported, StorageError::ConfigError(_)));
        assert!(!unsupported.is_retryable());

        let transient = map_object_error(
            ObjectStoreError::Generic {
                store: "S3",
                source: "connection reset".into(),
            },
            "k",
        );
        assert!(transient.is_retryable());
    }

    #[tokio::test]
    async fn upload_session_is_presigned_put() {
        let spec = UploadSessionSpec {
            submission_id: 42,
            assignment_id: 7,
            user_id: 100,
            mime_type: Some("video/webm".into()),
            file_size: Some(1024),
            max_duration_seconds: 600,
        };
        let target = storage().create_upload_session(&spec).await.unwrap();
        assert!(target.remote_key.starts_with("submissions/7/42/"));
        assert!(target.remote_key.ends_with(".webm"));
        assert!(target.upload_url.contains("X-Amz-Signature="));
        assert!(target.upload_url.contains("X-Amz-Expires=3600"));
    }

    #[tokio::test]
    async fn presigned_get_without_cloudfront() {
        let cred = storage()
            .generate_playback_credential("submissions/7/42/a.mp4", Duration::from_secs(600))
            .await
            .unwrap();
        assert_eq!(cred.kind, CredentialKind::SignedUrl);
        assert!(cred.value.contains("X-Amz-Expires=600"));
        assert_eq!(cred.expires_in_seconds, 600);
    }

    #[tokio::test]
    async fn traversal_key_rejected() {
        let err = storage()
            .generate_playback_credential("../etc/passwd", Duration::from_secs(60))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }
}
