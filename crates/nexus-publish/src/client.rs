//! YouTube Data API v3 client for resumable uploads.
//!
//! - `POST /upload/youtube/v3/videos?uploadType=resumable` opens a session
//! - `PUT <session>` with `Content-Range` sends each chunk; `308` means more
//!   bytes are expected and `Range` reports what the server holds
//! - `POST /upload/youtube/v3/thumbnails/set` attaches the thumbnail

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_RANGE, CONTENT_TYPE, LOCATION, RANGE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use nexus_models::VideoMetadata;

use crate::api::{ChunkAck, UploadApi};
use crate::auth::{RefreshTokenProvider, TokenCache, TokenProvider};
use crate::config::YouTubeConfig;
use crate::error::{PublishError, PublishResult};

/// Longest error body echoed into an error message.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Deserialize)]
struct VideoResource {
    id: String,
}

/// Bytes held by the server according to a `Range: bytes=0-N` header.
fn received_from_range(value: Option<&str>) -> PublishResult<u64> {
    let Some(value) = value else {
        return Ok(0);
    };
    value
        .trim()
        .strip_prefix("bytes=")
        .and_then(|r| r.split_once('-'))
        .and_then(|(_, last)| last.trim().parse::<u64>().ok())
        .map(|last| last + 1)
        .ok_or_else(|| PublishError::invalid_response(format!("unparseable Range header {:?}", value)))
}

/// YouTube upload client.
pub struct YouTubeClient {
    http: Client,
    config: YouTubeConfig,
    tokens: Arc<TokenCache>,
}

impl YouTubeClient {
    /// Create a client that refreshes tokens from the configured credentials.
    pub fn new(config: YouTubeConfig) -> PublishResult<Self> {
        let http = Self::build_http(&config)?;
        let provider = RefreshTokenProvider::new(
            http.clone(),
            config.credentials_path.clone(),
            config.token_url.clone(),
        );
        Self::with_token_provider(config, http, Arc::new(provider))
    }

    /// Create a client with a custom token source.
    pub fn with_token_provider(
        config: YouTubeConfig,
        http: Client,
        provider: Arc<dyn TokenProvider>,
    ) -> PublishResult<Self> {
        config.validate()?;
        Ok(Self {
            http,
            config,
            tokens: Arc::new(TokenCache::new(provider)),
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> PublishResult<Self> {
        Self::new(YouTubeConfig::from_env()?)
    }

    /// HTTP client tuned for long chunk transfers.
    pub fn build_http(config: &YouTubeConfig) -> PublishResult<Client> {
        Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            // 308 is the resumable-upload "keep going" reply, not a redirect.
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("nexus-publish/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(PublishError::Network)
    }

    fn videos_url(&self) -> String {
        format!("{}/upload/youtube/v3/videos", self.config.api_base)
    }

    fn thumbnails_url(&self) -> String {
        format!("{}/upload/youtube/v3/thumbnails/set", self.config.api_base)
    }

    /// Send a request with a bearer token, refreshing once on `401`.
    async fn send_authorized<F>(&self, build: F) -> PublishResult<Response>
    where
        F: Fn(&str) -> RequestBuilder,
    {
        let token = self.tokens.get_token().await?;
        let response = build(&token).send().await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        debug!("Access token rejected, refreshing");
        self.tokens.invalidate().await;
        let token = self.tokens.get_token().await?;
        Ok(build(&token).send().await?)
    }

    async fn error_from(response: Response) -> PublishError {
        let status = response.status().as_u16();
        let url = response.url().path().to_string();
        let body = response.text().await.unwrap_or_default();
        let body: String = body.chars().take(MAX_ERROR_BODY).collect();
        PublishError::from_http_status(status, format!("{} failed: {}", url, body))
    }
}

#[async_trait]
impl UploadApi for YouTubeClient {
    async fn authenticate(&self) -> PublishResult<()> {
        self.tokens.get_token().await.map(|_| ())
    }

    async fn begin_session(
        &self,
        metadata: &VideoMetadata,
        total_bytes: u64,
        content_type: &str,
    ) -> PublishResult<String> {
        let url = self.videos_url();
        let body = metadata.to_insert_body();

        let response = self
            .send_authorized(|token| {
                self.http
                    .post(&url)
                    .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
                    .bearer_auth(token)
                    .header("X-Upload-Content-Length", total_bytes)
                    .header("X-Upload-Content-Type", content_type)
                    .json(&body)
            })
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| PublishError::invalid_response("resumable session has no Location"))?;

        debug!(session = location, "Opened resumable upload session");
        Ok(location.to_string())
    }

    async fn upload_chunk(
        &self,
        session_uri: &str,
        offset: u64,
        total_bytes: u64,
        chunk: Vec<u8>,
    ) -> PublishResult<ChunkAck> {
        if chunk.is_empty() {
            return Err(PublishError::invalid_response(format!(
                "refusing to send an empty chunk at byte {}",
                offset
            )));
        }

        let last = offset + chunk.len() as u64 - 1;
        let content_range = format!("bytes {}-{}/{}", offset, last, total_bytes);

        let response = self
            .send_authorized(|token| {
                self.http
                    .put(session_uri)
                    .bearer_auth(token)
                    .header(CONTENT_RANGE, content_range.as_str())
                    .body(chunk.clone())
            })
            .await?;

        match response.status().as_u16() {
            308 => {
                let range = response.headers().get(RANGE).and_then(|v| v.to_str().ok());
                let received = received_from_range(range)?;
                Ok(ChunkAck::Incomplete { received })
            }
            200 | 201 => {
                let video: VideoResource = response.json().await?;
                Ok(ChunkAck::Complete { video_id: video.id })
            }
            _ => Err(Self::error_from(response).await),
        }
    }

    async fn set_thumbnail(&self, video_id: &str, jpeg: Vec<u8>) -> PublishResult<()> {
        let url = self.thumbnails_url();

        let response = self
            .send_authorized(|token| {
                self.http
                    .post(&url)
                    .query(&[("videoId", video_id), ("uploadType", "media")])
                    .bearer_auth(token)
                    .header(CONTENT_TYPE, "image/jpeg")
                    .body(jpeg.clone())
            })
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            let err = Self::error_from(response).await;
            warn!(video_id, "Thumbnail upload rejected: {}", err);
            Err(err)
        }
    }
}
