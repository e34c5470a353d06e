use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Remote video/object store backends.
///
/// Defined in core because configuration selects it and records are tagged with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Cloudflare Stream direct creator uploads.
    Cloudflare,
    /// S3 bucket, optionally fronted by CloudFront for playback.
    S3,
    /// In-process store for local development and tests.
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cloudflare" | "cloudflare_stream" | "stream" => Ok(StorageBackend::Cloudflare),
            "s3" | "aws" => Ok(StorageBackend::S3),
            "memory" => Ok(StorageBackend::Memory),
            _ => Err(anyhow::anyhow!("Invalid storage backend: {}", s)),
        }
    }
}

impl Display for StorageBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            StorageBackend::Cloudflare => write!(f, "cloudflare"),
            StorageBackend::S3 => write!(f, "s3"),
            StorageBackend::Memory => write!(f, "memory"),
        }
    }
}
