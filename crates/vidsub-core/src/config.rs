//! Configuration module
//!
//! Server, database, remote storage and policy settings, read from the
//! environment (optionally via a `.env` file).

use std::env;
use std::str::FromStr;

use crate::constants::{
    DEFAULT_MAX_FILE_SIZE_BYTES, DEFAULT_PLAYBACK_RATE_LIMIT, DEFAULT_PLAYBACK_TTL_SECS,
    DEFAULT_RATE_LIMIT_WINDOW_SECS, DEFAULT_RETENTION_DAYS, DEFAULT_RETRY_BASE_DELAY_MS,
    DEFAULT_RETRY_MAX_ATTEMPTS, DEFAULT_RETRY_MAX_DELAY_MS, DEFAULT_UPLOAD_RATE_LIMIT,
    MAX_PLAYBACK_TTL_SECS, MAX_UPLOAD_DURATION_SECS,
};
use crate::storage_types::StorageBackend;

const SERVER_PORT: u16 = 3000;
const MAX_CONNECTIONS: u32 = 10;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const CLEANUP_INTERVAL_SECS: u64 = 24 * 60 * 60;
const HTTP_TIMEOUT_SECS: u64 = 30;
const HTTP_CONCURRENCY_LIMIT: usize = 10_000;
const CLOUDFLARE_API_BASE_URL: &str = "https://api.cloudflare.com/client/v4";

/// Server-level settings.
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    /// In-flight request cap for the HTTP server.
    pub http_concurrency_limit: usize,
    pub jwt_secret: String,
    pub environment: String,
}

/// Video submission settings.
#[derive(Clone, Debug)]
pub struct VideoConfig {
    pub base: BaseConfig,
    /// When unset the service keeps records in memory.
    pub database_url: Option<String>,
    pub storage_backend: StorageBackend,
    // Cloudflare Stream
    pub cloudflare_account_id: Option<String>,
    pub cloudflare_api_token: Option<String>,
    pub cloudflare_api_base_url: String,
    pub cloudflare_signing_key_id: Option<String>,
    pub cloudflare_signing_key_pem: Option<String>,
    // S3 and CloudFront
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>,
    pub cloudfront_domain: Option<String>,
    pub cloudfront_key_pair_id: Option<String>,
    pub cloudfront_private_key_pem: Option<String>,
    // Upload policy
    pub max_file_size_bytes: u64,
    pub max_duration_seconds: u32,
    pub retention_days: i64,
    pub cleanup_interval_secs: u64,
    // Rate limiting
    pub upload_rate_limit: u32,
    pub playback_rate_limit: u32,
    pub rate_limit_window_secs: u64,
    pub playback_token_ttl_secs: u64,
    // Retry policy for remote calls
    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub http_timeout_secs: u64,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<VideoConfig>);

impl Config {
    fn as_video(&self) -> &VideoConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.as_video().base.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = VideoConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.as_video().validate()
    }

    pub fn inner(&self) -> &VideoConfig {
        self.as_video()
    }

    pub fn server_port(&self) -> u16 {
        self.as_video().base.server_port
    }

    pub fn jwt_secret(&self) -> &str {
        &self.as_video().base.jwt_secret
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.as_video().base.cors_origins
    }

    pub fn db_max_connections(&self) -> u32 {
        self.as_video().base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.as_video().base.db_timeout_seconds
    }

    pub fn http_concurrency_limit(&self) -> usize {
        self.as_video().base.http_concurrency_limit
    }

    pub fn database_url(&self) -> Option<&str> {
        self.as_video().database_url.as_deref()
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.as_video().storage_backend
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.as_video().max_file_size_bytes
    }

    pub fn max_duration_seconds(&self) -> u32 {
        self.as_video().max_duration_seconds
    }

    pub fn retention_days(&self) -> i64 {
        self.as_video().retention_days
    }

    pub fn cleanup_interval_secs(&self) -> u64 {
        self.as_video().cleanup_interval_secs
    }

    pub fn upload_rate_limit(&self) -> u32 {
        self.as_video().upload_rate_limit
    }

    pub fn playback_rate_limit(&self) -> u32 {
        self.as_video().playback_rate_limit
    }

    pub fn rate_limit_window_secs(&self) -> u64 {
        self.as_video().rate_limit_window_secs
    }

    pub fn playback_token_ttl_secs(&self) -> u64 {
        self.as_video().playback_token_ttl_secs
    }

    pub fn retry_max_attempts(&self) -> u32 {
        self.as_video().retry_max_attempts
    }

    pub fn retry_base_delay_ms(&self) -> u64 {
        self.as_video().retry_base_delay_ms
    }

    pub fn retry_max_delay_ms(&self) -> u64 {
        self.as_video().retry_max_delay_ms
    }

    pub fn http_timeout_secs(&self) -> u64 {
        self.as_video().http_timeout_secs
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// PEM keys are often passed with literal `\n` sequences in env files.
fn env_pem(key: &str) -> Option<String> {
    env_opt(key).map(|v| v.replace("\\n", "\n"))
}

impl VideoConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        let is_production =
            environment.to_lowercase() == "production" || environment.to_lowercase() == "prod";
        if is_production && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }
        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let base = BaseConfig {
            server_port: env::var("SERVER_PORT")
                .or_else(|_| env::var("PORT"))
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SERVER_PORT must be a valid number"))?,
            cors_origins,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", MAX_CONNECTIONS),
            db_timeout_seconds: env_or("DB_TIMEOUT_SECONDS", CONNECTION_TIMEOUT_SECS),
            http_concurrency_limit: env_or("HTTP_CONCURRENCY_LIMIT", HTTP_CONCURRENCY_LIMIT).max(1),
            jwt_secret: env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set for authentication"))?,
            environment,
        };

        let storage_backend = match env_opt("STORAGE_BACKEND") {
            Some(raw) => StorageBackend::from_str(&raw)?,
            None => StorageBackend::Cloudflare,
        };

        Ok(VideoConfig {
            base,
            database_url: env_opt("DATABASE_URL"),
            storage_backend,
            cloudflare_account_id: env_opt("CLOUDFLARE_ACCOUNT_ID"),
            cloudflare_api_token: env_opt("CLOUDFLARE_API_TOKEN"),
            cloudflare_api_base_url: env_opt("CLOUDFLARE_API_BASE_URL")
                .unwrap_or_else(|| CLOUDFLARE_API_BASE_URL.to_string()),
            cloudflare_signing_key_id: env_opt("CLOUDFLARE_SIGNING_KEY_ID"),
            cloudflare_signing_key_pem: env_pem("CLOUDFLARE_SIGNING_KEY_PEM"),
            s3_bucket: env_opt("S3_BUCKET"),
            s3_region: env_opt("S3_REGION").or_else(|| env_opt("AWS_REGION")),
            s3_endpoint: env_opt("S3_ENDPOINT"),
            cloudfront_domain: env_opt("CLOUDFRONT_DOMAIN"),
            cloudfront_key_pair_id: env_opt("CLOUDFRONT_KEY_PAIR_ID"),
            cloudfront_private_key_pem: env_pem("CLOUDFRONT_PRIVATE_KEY_PEM"),
            max_file_size_bytes: env_or("MAX_FILE_SIZE_BYTES", DEFAULT_MAX_FILE_SIZE_BYTES),
            max_duration_seconds: env_or("MAX_DURATION_SECONDS", MAX_UPLOAD_DURATION_SECS),
            retention_days: env_or("RETENTION_DAYS", DEFAULT_RETENTION_DAYS),
            cleanup_interval_secs: env_or("CLEANUP_INTERVAL_SECS", CLEANUP_INTERVAL_SECS),
            upload_rate_limit: env_or("UPLOAD_RATE_LIMIT", DEFAULT_UPLOAD_RATE_LIMIT),
            playback_rate_limit: env_or("PLAYBACK_RATE_LIMIT", DEFAULT_PLAYBACK_RATE_LIMIT),
            rate_limit_window_secs: env_or(
                "RATE_LIMIT_WINDOW_SECS",
                DEFAULT_RATE_LIMIT_WINDOW_SECS,
            ),
            playback_token_ttl_secs: env_or("PLAYBACK_TOKEN_TTL_SECS", DEFAULT_PLAYBACK_TTL_SECS),
            retry_max_attempts: env_or("RETRY_MAX_ATTEMPTS", DEFAULT_RETRY_MAX_ATTEMPTS),
            retry_base_delay_ms: env_or("RETRY_BASE_DELAY_MS", DEFAULT_RETRY_BASE_DELAY_MS),
            retry_max_delay_ms: env_or("RETRY_MAX_DELAY_MS", DEFAULT_RETRY_MAX_DELAY_MS),
            http_timeout_secs: env_or("HTTP_TIMEOUT_SECS", HTTP_TIMEOUT_SECS),
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.base.jwt_secret.len() < 32 {
            return Err(anyhow::anyhow!(
                "JWT_SECRET must be at least 32 characters long"
            ));
        }

        if let Some(url) = &self.database_url {
            if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                return Err(anyhow::anyhow!(
                    "DATABASE_URL must be a valid PostgreSQL connection string"
                ));
            }
        }

        match self.storage_backend {
            StorageBackend::Cloudflare => {
                if self.cloudflare_account_id.is_none() || self.cloudflare_api_token.is_none() {
                    return Err(anyhow::anyhow!(
                        "CLOUDFLARE_ACCOUNT_ID and CLOUDFLARE_API_TOKEN must be set when using the Cloudflare backend"
                    ));
                }
                if self.cloudflare_signing_key_id.is_some()
                    != self.cloudflare_signing_key_pem.is_some()
                {
                    return Err(anyhow::anyhow!(
                        "CLOUDFLARE_SIGNING_KEY_ID and CLOUDFLARE_SIGNING_KEY_PEM must be set together"
                    ));
                }
            }
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.s3_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
                let cloudfront_parts = [
                    self.cloudfront_domain.is_some(),
                    self.cloudfront_key_pair_id.is_some(),
                    self.cloudfront_private_key_pem.is_some(),
                ];
                if cloudfront_parts.iter().any(|p| *p) && !cloudfront_parts.iter().all(|p| *p) {
                    return Err(anyhow::anyhow!(
                        "CLOUDFRONT_DOMAIN, CLOUDFRONT_KEY_PAIR_ID and CLOUDFRONT_PRIVATE_KEY_PEM must be set together"
                    ));
                }
            }
            StorageBackend::Memory => {
                if self.base.environment.to_lowercase().starts_with("prod") {
                    return Err(anyhow::anyhow!(
                        "The memory storage backend cannot be used in production"
                    ));
                }
            }
        }

        if self.max_duration_seconds == 0 || self.max_duration_seconds > MAX_UPLOAD_DURATION_SECS {
            return Err(anyhow::anyhow!(
                "MAX_DURATION_SECONDS must be between 1 and {}",
                MAX_UPLOAD_DURATION_SECS
            ));
        }

        if self.playback_token_ttl_secs == 0 || self.playback_token_ttl_secs > MAX_PLAYBACK_TTL_SECS
        {
            return Err(anyhow::anyhow!(
                "PLAYBACK_TOKEN_TTL_SECS must be between 1 and {}",
                MAX_PLAYBACK_TTL_SECS
            ));
        }

        if self.retention_days < 1 {
            return Err(anyhow::anyhow!("RETENTION_DAYS must be at least 1"));
        }

        if self.upload_rate_limit == 0
            || self.playback_rate_limit == 0
            || self.rate_limit_window_secs == 0
        {
            return Err(anyhow::anyhow!(
                "Rate limits and RATE_LIMIT_WINDOW_SECS must be positive"
            ));
        }

        if self.retry_base_delay_ms > self.retry_max_delay_ms {
            return Err(anyhow::anyhow!(
                "RETRY_BASE_DELAY_MS must not exceed RETRY_MAX_DELAY_MS"
            ));
        }

        Ok(())
    }

    /// Settings suitable for tests and local development: memory backend,
    /// in-memory records, default policy values.
    pub fn for_development(jwt_secret: impl Into<String>) -> Self {
        VideoConfig {
            base: BaseConfig {
                server_port: SERVER_PORT,
                cors_origins: vec!["*".to_string()],
                db_max_connections: MAX_CONNECTIONS,
                db_timeout_seconds: CONNECTION_TIMEOUT_SECS,
                http_concurrency_limit: HTTP_CONCURRENCY_LIMIT,
                jwt_secret: jwt_secret.into(),
                environment: "development".to_string(),
            },
            database_url: None,
            storage_backend: StorageBackend::Memory,
            cloudflare_account_id: None,
            cloudflare_api_token: None,
            cloudflare_api_base_url: CLOUDFLARE_API_BASE_URL.to_string(),
            cloudflare_signing_key_id: None,
            cloudflare_signing_key_pem: None,
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            cloudfront_domain: None,
            cloudfront_key_pair_id: None,
            cloudfront_private_key_pem: None,
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            max_duration_seconds: MAX_UPLOAD_DURATION_SECS,
            retention_days: DEFAULT_RETENTION_DAYS,
            cleanup_interval_secs: CLEANUP_INTERVAL_SECS,
            upload_rate_limit: DEFAULT_UPLOAD_RATE_LIMIT,
            playback_rate_limit: DEFAULT_PLAYBACK_RATE_LIMIT,
            rate_limit_window_secs: DEFAULT_RATE_LIMIT_WINDOW_SECS,
            playback_token_ttl_secs: DEFAULT_PLAYBACK_TTL_SECS,
            retry_max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            retry_max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
            http_timeout_secs: HTTP_TIMEOUT_SECS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn development_config_is_valid() {
        assert!(VideoConfig::for_development(SECRET).validate().is_ok());
    }

    #[test]
    fn short_jwt_secret_is_rejected() {
        assert!(VideoConfig::for_development("short").validate().is_err());
    }

    #[test]
    fn cloudflare_requires_credentials() {
        let mut config = VideoConfig::for_development(SECRET);
        config.storage_backend = StorageBackend::Cloudflare;
        assert!(config.validate().is_err());

        config.cloudflare_account_id = Some("acct".into());
        config.cloudflare_api_token = Some("token".into());
        assert!(config.validate().is_ok());

        config.cloudflare_signing_key_id = Some("kid".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_cloudfront_config_is_rejected() {
        let mut config = VideoConfig::for_development(SECRET);
        config.storage_backend = StorageBackend::S3;
        config.s3_bucket = Some("videos".into());
        config.s3_region = Some("us-east-1".into());
        assert!(config.validate().is_ok());

        config.cloudfront_domain = Some("d111.cloudfront.net".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn playback_ttl_is_capped_at_seven_days() {
        let mut config = VideoConfig::for_development(SECRET);
        config.playback_token_ttl_secs = MAX_PLAYBACK_TTL_SECS + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn memory_backend_refused_in_production() {
        let mut config = VideoConfig::for_development(SECRET);
        config.base.environment = "production".into();
        assert!(config.validate().is_err());
    }
}
