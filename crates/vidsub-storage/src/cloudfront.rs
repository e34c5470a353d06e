//! CloudFront signed URLs with a custom policy.
//!
//! Signature is RSA-SHA1 (PKCS#1 v1.5) over the policy JSON. Policy and
//! signature use CloudFront's URL-safe base64 variant: `+` -> `-`, `=` -> `_`,
//! `/` -> `~`.

use crate::traits::{StorageError, StorageResult};
use base64::Engine as _;
use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use serde_json::json;
use sha1::Sha1;

/// Characters escaped in object-key path segments.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'?')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'{')
    .add(b'}');

pub struct CloudFrontSigner {
    domain: String,
    key_pair_id: String,
    signing_key: SigningKey<Sha1>,
}

impl std::fmt::Debug for CloudFrontSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudFrontSigner")
            .field("domain", &self.domain)
            .field("key_pair_id", &self.key_pair_id)
            .finish()
    }
}

pub(crate) fn cloudfront_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD
        .encode(bytes)
        .replace('+', "-")
        .replace('=', "_")
        .replace('/', "~")
}

impl CloudFrontSigner {
    /// `private_key_pem` may be PKCS#1 (`BEGIN RSA PRIVATE KEY`) or PKCS#8.
    pub fn new(
        domain: impl Into<String>,
        key_pair_id: impl Into<String>,
        private_key_pem: &str,
    ) -> StorageResult<Self> {
        let pem = private_key_pem.trim();
        let key = RsaPrivateKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
            .map_err(|e| StorageError::ConfigError(format!("Invalid CloudFront private key: {}", e)))?;

        let domain = domain.into();
        let domain = domain
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            domain,
            key_pair_id: key_pair_id.into(),
            signing_key: SigningKey::<Sha1>::new(key),
        })
    }

    pub fn resource_url(&self, object_key: &str) -> String {
        format!(
            "https://{}/{}",
            self.domain,
            utf8_percent_encode(object_key, PATH_SEGMENT)
        )
    }

    pub(crate) fn policy(resource: &str, expires_at: i64) -> String {
        json!({
            "Statement": [{
                "Resource": resource,
                "Condition": {"DateLessThan": {"AWS:EpochTime": expires_at}}
            }]
        })
        .to_string()
    }

    /// Signed URL for `object_key` valid until `now + ttl_secs`.
    pub fn sign_url(&self, object_key: &str, now: DateTime<Utc>, ttl_secs: u64) -> StorageResult<String> {
        let resource = self.resource_url(object_key);
        let expires_at = now.timestamp() + ttl_secs as i64;
        let policy = Self::policy(&resource, expires_at);

        let signature = self
            .signing_key
            .try_sign(policy.as_bytes())
            .map_err(|e| StorageError::Signing(e.to_string()))?;

        Ok(format!(
            "{}?Policy={}&Signature={}&Key-Pair-Id={}",
            resource,
            cloudfront_base64(policy.as_bytes()),
            cloudfront_base64(&signature.to_bytes()),
            self.key_pair_id
        ))
    }
}
