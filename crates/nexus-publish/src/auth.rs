//! OAuth access tokens for the YouTube Data API.
//!
//! Credentials are an authorized-user JSON file holding a long-lived refresh
//! token. Access tokens obtained from it are cached with:
//! - Refresh margin to avoid expiry in the middle of a chunk
//! - Single-flight refresh under a write lock
//! - Fallback to the existing token while it is still usable

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{PublishError, PublishResult};

/// Refresh this long before the token expires.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// TTL assumed when the token endpoint omits `expires_in`.
const TOKEN_DEFAULT_TTL: Duration = Duration::from_secs(50 * 60);

/// Authorized-user credentials as written by Google's OAuth tooling.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizedUser {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    /// Token endpoint recorded with the credentials; the configured one wins
    #[serde(default)]
    pub token_uri: Option<String>,
    /// Last access token, reused while still valid
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub expiry: Option<String>,
}

impl AuthorizedUser {
    /// Load credentials; a missing or malformed file is an auth failure.
    pub fn from_file(path: &Path) -> PublishResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            PublishError::auth_failed(format!(
                "cannot read credentials {}: {}",
                path.display(),
                e
            ))
        })?;
        let creds: Self = serde_json::from_str(&text).map_err(|e| {
            PublishError::auth_failed(format!(
                "invalid credentials {}: {}",
                path.display(),
                e
            ))
        })?;
        if creds.refresh_token.trim().is_empty() {
            return Err(PublishError::auth_failed("credentials carry no refresh token"));
        }
        Ok(creds)
    }

    /// The stored access token, if it has not expired yet.
    pub fn stored_token(&self) -> Option<AccessToken> {
        let token = self.token.as_ref().filter(|t| !t.is_empty())?;
        let expiry = self.expiry.as_deref().and_then(parse_expiry)?;
        (expiry > Utc::now()).then(|| AccessToken {
            value: token.clone(),
            expires_at: expiry,
        })
    }
}

/// Google writes expiry with or without a zone suffix.
fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

/// A bearer token and its expiry.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    fn remaining(&self) -> Duration {
        (self.expires_at - Utc::now()).to_std().unwrap_or(Duration::ZERO)
    }

    fn is_valid(&self) -> bool {
        self.remaining() > TOKEN_REFRESH_MARGIN
    }

    fn is_usable(&self) -> bool {
        self.remaining() > Duration::ZERO
    }
}

/// Source of fresh access tokens.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn fetch_token(&self) -> PublishResult<AccessToken>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Exchanges the refresh token at the OAuth token endpoint.
///
/// The access token stored alongside the credentials is offered once; every
/// later fetch goes to the token endpoint.
pub struct RefreshTokenProvider {
    http: Client,
    credentials_path: PathBuf,
    token_url: String,
    stored_offered: AtomicBool,
}

impl RefreshTokenProvider {
    pub fn new(
        http: Client,
        credentials_path: impl Into<PathBuf>,
        token_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            credentials_path: credentials_path.into(),
            token_url: token_url.into(),
            stored_offered: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl TokenProvider for RefreshTokenProvider {
    async fn fetch_token(&self) -> PublishResult<AccessToken> {
        let creds = AuthorizedUser::from_file(&self.credentials_path)?;

        if !self.stored_offered.swap(true, Ordering::SeqCst) {
            if let Some(token) = creds.stored_token().filter(AccessToken::is_valid) {
                debug!("Reusing stored YouTube access token");
                return Ok(token);
            }
        }

        debug!(token_url = %self.token_url, "Refreshing YouTube access token");

        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", creds.client_id.as_str()),
                ("client_secret", creds.client_secret.as_str()),
                ("refresh_token", creds.refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| PublishError::auth_failed(format!("token endpoint unreachable: {}", e)))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            let reason = serde_json::from_str::<TokenErrorResponse>(&body)
                .map(|e| match e.error_description {
                    Some(desc) => format!("{}: {}", e.error, desc),
                    None => e.error,
                })
                .unwrap_or(body);
            return Err(PublishError::auth_failed(format!(
                "token refresh rejected ({}): {}",
                status.as_u16(),
                reason
            )));
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| PublishError::auth_failed(format!("malformed token response: {}", e)))?;
        let ttl = token
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(TOKEN_DEFAULT_TTL);
        let expires_at = Utc::now()
            + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::minutes(50));

        Ok(AccessToken {
            value: token.access_token,
            expires_at,
        })
    }
}

/// Caches access tokens from a provider.
pub struct TokenCache {
    provider: Arc<dyn TokenProvider>,
    cache: RwLock<Option<AccessToken>>,
}

impl TokenCache {
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            provider,
            cache: RwLock::new(None),
        }
    }

    /// Drop the cached token, forcing a refresh on next use.
    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }

    /// Get a valid access token, refreshing if necessary.
    pub async fn get_token(&self) -> PublishResult<String> {
        {
            let cache = self.cache.read().await;
            if let Some(token) = cache.as_ref().filter(|t| t.is_valid()) {
                return Ok(token.value.clone());
            }
        }

        let mut cache = self.cache.write().await;

        // Another task may have refreshed while we waited.
        if let Some(token) = cache.as_ref().filter(|t| t.is_valid()) {
            return Ok(token.value.clone());
        }

        match self.provider.fetch_token().await {
            Ok(token) => {
                debug!(
                    valid_for_secs = token.remaining().as_secs(),
                    "Refreshed YouTube access token"
                );
                let value = token.value.clone();
                *cache = Some(token);
                Ok(value)
            }
            Err(e) => {
                if let Some(token) = cache.as_ref().filter(|t| t.is_usable()) {
                    warn!("Token refresh failed, using existing token: {}", e);
                    return Ok(token.value.clone());
                }
                Err(e)
            }
        }
    }
}
