//! vidsub remote storage
//!
//! The `RemoteStorage` trait and its backends: Cloudflare Stream direct
//! uploads, S3 with optional CloudFront signed playback, and an in-process
//! fake used for development and tests.
//!
//! # Remote key format
//!
//! - **Cloudflare Stream**: the video uid returned by the direct-upload call.
//! - **S3**: `submissions/{assignment_id}/{submission_id}/{uuid}.{ext}`.
//!
//! Keys must not contain `..` or a leading `/`.

#[cfg(feature = "storage-cloudflare")]
pub mod cloudflare;
#[cfg(feature = "storage-s3")]
pub mod cloudfront;
pub mod factory;
pub(crate) mod keys;
pub mod memory;
#[cfg(feature = "storage-s3")]
pub mod s3;
#[cfg(feature = "storage-cloudflare")]
pub mod stream_token;
pub mod traits;

// Re-export commonly used types
#[cfg(feature = "storage-cloudflare")]
pub use cloudflare::CloudflareStreamStorage;
#[cfg(feature = "storage-s3")]
pub use cloudfront::CloudFrontSigner;
pub use factory::create_remote_storage;
pub use memory::{MemoryStorage, ScriptedFailure, StorageOp};
#[cfg(feature = "storage-s3")]
pub use s3::S3VideoStorage;
#[cfg(feature = "storage-cloudflare")]
pub use stream_token::StreamTokenSigner;
pub use traits::{
    PlaybackCredential, RemoteObjectMetadata, RemoteState, RemoteStorage, StorageError,
    StorageResult, UploadSessionSpec, UploadTarget,
};
pub use vidsub_core::StorageBackend;
