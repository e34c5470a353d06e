//! Locally signed Cloudflare Stream playback tokens.
//!
//! With a signing key configured, tokens are RS256 JWTs minted without a
//! round trip to the Stream API.

use crate::traits::{StorageError, StorageResult};
use base64::Engine as _;
use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct StreamTokenClaims {
    /// Video uid.
    pub sub: String,
    /// Signing key id.
    pub kid: String,
    pub exp: i64,
    pub nbf: i64,
}

pub struct StreamTokenSigner {
    key_id: String,
    key: EncodingKey,
}

impl std::fmt::Debug for StreamTokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamTokenSigner")
            .field("key_id", &self.key_id)
            .finish()
    }
}

impl StreamTokenSigner {
    /// `pem` may be the PEM text itself or the base64-encoded PEM that the
    /// Stream keys API returns.
    pub fn new(key_id: impl Into<String>, pem: &str) -> StorageResult<Self> {
        let pem = decode_pem(pem)?;
        let key = EncodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| StorageError::ConfigError(format!("Invalid Stream signing key: {}", e)))?;
        Ok(Self {
            key_id: key_id.into(),
            key,
        })
    }

    pub fn sign(&self, video_uid: &str, now: DateTime<Utc>, ttl_secs: u64) -> StorageResult<String> {
        let claims = StreamTokenClaims {
            sub: video_uid.to_string(),
            kid: self.key_id.clone(),
            exp: now.timestamp() + ttl_secs as i64,
            nbf: now.timestamp(),
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.key_id.clone());
        encode(&header, &claims, &self.key).map_err(|e| StorageError::Signing(e.to_string()))
    }
}

fn decode_pem(raw: &str) -> StorageResult<String> {
    let trimmed = raw.trim();
    if trimmed.starts_with("-----BEGIN") {
        return Ok(trimmed.to_string());
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(trimmed)
        .map_err(|e| StorageError::ConfigError(format!("Stream signing key is not PEM or base64: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|e| StorageError::ConfigError(format!("Stream signing key is not UTF-8: {}", e)))
}
