#[cfg(feature = "storage-cloudflare")]
use crate::{CloudflareStreamStorage, StreamTokenSigner};
#[cfg(feature = "storage-s3")]
use crate::{CloudFrontSigner, S3VideoStorage};
use crate::{MemoryStorage, RemoteStorage, StorageBackend, StorageError, StorageResult};
use std::sync::Arc;
use std::time::Duration;
use vidsub_core::Config;

/// Create the remote storage backend selected by configuration
pub fn create_remote_storage(config: &Config) -> StorageResult<Arc<dyn RemoteStorage>> {
    let settings = config.inner();

    match config.storage_backend() {
        #[cfg(feature = "storage-cloudflare")]
        StorageBackend::Cloudflare => {
            let account_id = settings.cloudflare_account_id.clone().ok_or_else(|| {
                StorageError::ConfigError("CLOUDFLARE_ACCOUNT_ID not configured".to_string())
            })?;
            let api_token = settings.cloudflare_api_token.clone().ok_or_else(|| {
                StorageError::ConfigError("CLOUDFLARE_API_TOKEN not configured".to_string())
            })?;
            let signer = match (
                &settings.cloudflare_signing_key_id,
                &settings.cloudflare_signing_key_pem,
            ) {
                (Some(key_id), Some(pem)) => Some(StreamTokenSigner::new(key_id.clone(), pem)?),
                _ => None,
            };
            tracing::info!(
                local_signing = signer.is_some(),
                "Using Cloudflare Stream storage backend"
            );

            let storage = CloudflareStreamStorage::new(
                settings.cloudflare_api_base_url.clone(),
                account_id,
                api_token,
                Duration::from_secs(config.http_timeout_secs()),
                signer,
            )?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-cloudflare"))]
        StorageBackend::Cloudflare => Err(StorageError::ConfigError(
            "Cloudflare backend not available (storage-cloudflare feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            let bucket = settings
                .s3_bucket
                .clone()
                .ok_or_else(|| StorageError::ConfigError("S3_BUCKET not configured".to_string()))?;
            let region = settings.s3_region.clone().ok_or_else(|| {
                StorageError::ConfigError("S3_REGION or AWS_REGION not configured".to_string())
            })?;
            let cloudfront = match (
                &settings.cloudfront_domain,
                &settings.cloudfront_key_pair_id,
                &settings.cloudfront_private_key_pem,
            ) {
                (Some(domain), Some(key_pair_id), Some(pem)) => Some(CloudFrontSigner::new(
                    domain.clone(),
                    key_pair_id.clone(),
                    pem,
                )?),
                _ => None,
            };
            tracing::info!(
                bucket = %bucket,
                cloudfront = cloudfront.is_some(),
                "Using S3 storage backend"
            );

            let storage =
                S3VideoStorage::new(bucket, region, settings.s3_endpoint.clone(), cloudfront)?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 => Err(StorageError::ConfigError(
            "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
        )),

        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage backend; uploads are not persisted");
            Ok(Arc::new(MemoryStorage::new()))
        }
    }
}
