//! Upload and API configuration.

use std::path::PathBuf;
use std::time::Duration;

use nexus_models::metadata::DEFAULT_CATEGORY_ID;
use nexus_models::Privacy;

use crate::error::{PublishError, PublishResult};

/// Resumable uploads require chunks in multiples of this size.
pub const CHUNK_GRANULARITY: usize = 256 * 1024;
/// Default chunk size (10 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 10 * 1024 * 1024;
pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_BACKOFF_BASE: f64 = 2.0;

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com";
pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_CREDENTIALS_PATH: &str = "config/youtube_credentials.json";

fn env_parse<T: std::str::FromStr>(key: &str) -> PublishResult<Option<T>> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| PublishError::config(format!("{} has an invalid value: {}", key, raw))),
        _ => Ok(None),
    }
}

/// Transfer policy for one upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadConfig {
    /// Bytes per chunk
    pub chunk_size: usize,
    /// Retry ceiling across the whole upload
    pub max_retries: u32,
    /// Backoff for retry `n` is `backoff_base^n` seconds
    pub backoff_base: f64,
    pub privacy: Privacy,
    pub category_id: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base: DEFAULT_BACKOFF_BASE,
            privacy: Privacy::default(),
            category_id: DEFAULT_CATEGORY_ID.to_string(),
        }
    }
}

impl UploadConfig {
    /// Create config from environment variables.
    pub fn from_env() -> PublishResult<Self> {
        let defaults = Self::default();
        let privacy = match std::env::var("NEXUS_UPLOAD_PRIVACY") {
            Ok(raw) if !raw.trim().is_empty() => raw
                .parse::<Privacy>()
                .map_err(|e| PublishError::config(e.to_string()))?,
            _ => defaults.privacy,
        };

        let config = Self {
            chunk_size: env_parse("NEXUS_UPLOAD_CHUNK_BYTES")?.unwrap_or(defaults.chunk_size),
            max_retries: env_parse("NEXUS_UPLOAD_MAX_RETRIES")?.unwrap_or(defaults.max_retries),
            backoff_base: env_parse("NEXUS_UPLOAD_BACKOFF_BASE")?.unwrap_or(defaults.backoff_base),
            privacy,
            category_id: std::env::var("NEXUS_UPLOAD_CATEGORY_ID")
                .ok()
                .filter(|c| !c.trim().is_empty())
                .unwrap_or(defaults.category_id),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> PublishResult<()> {
        if self.chunk_size == 0 || self.chunk_size % CHUNK_GRANULARITY != 0 {
            return Err(PublishError::config(format!(
                "chunk size {} must be a positive multiple of {}",
                self.chunk_size, CHUNK_GRANULARITY
            )));
        }
        if !(self.backoff_base.is_finite() && self.backoff_base > 1.0) {
            return Err(PublishError::config(format!(
                "backoff base {} must be greater than 1",
                self.backoff_base
            )));
        }
        Ok(())
    }

    pub fn with_privacy(mut self, privacy: Privacy) -> Self {
        self.privacy = privacy;
        self
    }
}

/// YouTube Data API endpoints and credentials.
#[derive(Debug, Clone)]
pub struct YouTubeConfig {
    /// Authorized-user credentials JSON
    pub credentials_path: PathBuf,
    pub api_base: String,
    pub token_url: String,
    /// Per-request timeout; must cover one chunk
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::from(DEFAULT_CREDENTIALS_PATH),
            api_base: DEFAULT_API_BASE.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl YouTubeConfig {
    /// Create config from environment variables.
    pub fn from_env() -> PublishResult<Self> {
        let defaults = Self::default();
        let config = Self {
            credentials_path: std::env::var("YOUTUBE_CREDENTIALS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.credentials_path),
            api_base: std::env::var("YOUTUBE_API_BASE").unwrap_or(defaults.api_base),
            token_url: std::env::var("YOUTUBE_TOKEN_URL").unwrap_or(defaults.token_url),
            timeout: env_parse::<u64>("YOUTUBE_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            connect_timeout: env_parse::<u64>("YOUTUBE_CONNECT_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> PublishResult<()> {
        for (name, value) in [("API base", &self.api_base), ("token URL", &self.token_url)] {
            url::Url::parse(value)
                .map_err(|e| PublishError::config(format!("{} {:?} is not a URL: {}", name, value, e)))?;
        }
        Ok(())
    }

    /// Point both endpoints at one server (used against mock servers).
    pub fn with_base_url(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.api_base = base.to_string();
        self.token_url = format!("{}/token", base);
        self
    }

    pub fn with_credentials(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_path = path.into();
        self
    }
}
