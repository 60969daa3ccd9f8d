//! Resumable upload driver.
//!
//! Walks an [`UploadSession`] through
//! `Init -> Authenticated -> Uploading -> {RetryWait -> Uploading}* -> Complete | Failed`.
//! Transient failures back off exponentially and resend from the last byte
//! the server acknowledged. The thumbnail is attached after the video is
//! complete; its failure never fails the upload.

use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info, warn};

use nexus_models::{UploadSession, UploadState, VideoMetadata};

use crate::api::{ChunkAck, UploadApi};
use crate::config::UploadConfig;
use crate::error::{PublishError, PublishResult};
use crate::retry::{Backoff, Sleeper, TokioSleeper};

pub const VIDEO_CONTENT_TYPE: &str = "video/mp4";
pub const WATCH_URL_BASE: &str = "https://www.youtube.com/watch?v=";

/// What happened to the thumbnail after the video upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailStatus {
    Attached,
    /// No thumbnail was supplied or the file does not exist
    Skipped,
    /// The attach call failed; the upload still counts as successful
    Failed(String),
}

/// Result of a completed upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    pub video_id: String,
    pub watch_url: String,
    pub bytes_sent: u64,
    pub retry_count: u32,
    pub thumbnail: ThumbnailStatus,
}

pub fn watch_url(video_id: &str) -> String {
    format!("{}{}", WATCH_URL_BASE, video_id)
}

async fn video_size(path: &Path) -> PublishResult<u64> {
    let meta = match tokio::fs::metadata(path).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(PublishError::FileNotFound(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };
    if !meta.is_file() {
        return Err(PublishError::FileNotFound(path.to_path_buf()));
    }
    if meta.len() == 0 {
        return Err(PublishError::EmptyVideo(path.to_path_buf()));
    }
    Ok(meta.len())
}

async fn read_chunk(file: &mut File, offset: u64, len: usize) -> PublishResult<Vec<u8>> {
    file.seek(SeekFrom::Start(offset)).await?;
    let mut buf = vec![0u8; len];
    file.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Drives resumable uploads against an [`UploadApi`].
pub struct UploadTransport {
    api: Arc<dyn UploadApi>,
    sleeper: Arc<dyn Sleeper>,
    config: UploadConfig,
    backoff: Backoff,
}

impl UploadTransport {
    pub fn new(api: Arc<dyn UploadApi>, sleeper: Arc<dyn Sleeper>, config: UploadConfig) -> Self {
        let backoff = Backoff::new(config.backoff_base);
        Self {
            api,
            sleeper,
            config,
            backoff,
        }
    }

    /// Transport with default policy that really sleeps between retries.
    pub fn with_defaults(api: Arc<dyn UploadApi>) -> Self {
        Self::new(api, Arc::new(TokioSleeper), UploadConfig::default())
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Upload `video`, then attach `thumbnail` if given.
    pub async fn upload(
        &self,
        video: &Path,
        metadata: &VideoMetadata,
        thumbnail: Option<&Path>,
    ) -> PublishResult<UploadOutcome> {
        let total_bytes = video_size(video).await?;
        let mut session = UploadSession::new(total_bytes, self.config.max_retries);

        info!(
            video = %video.display(),
            total_bytes,
            title = %metadata.title,
            "Starting upload"
        );

        let video_id = self.upload_session(&mut session, video, metadata).await?;
        let thumbnail = self.attach_thumbnail(&video_id, thumbnail).await;

        info!(
            video_id = %video_id,
            retries = session.retry_count,
            "Upload complete"
        );

        Ok(UploadOutcome {
            watch_url: watch_url(&video_id),
            video_id,
            bytes_sent: session.bytes_sent,
            retry_count: session.retry_count,
            thumbnail,
        })
    }

    /// Run `session` to a terminal state, returning the remote video id.
    pub async fn upload_session(
        &self,
        session: &mut UploadSession,
        video: &Path,
        metadata: &VideoMetadata,
    ) -> PublishResult<String> {
        let mut file = match File::open(video).await {
            Ok(file) => file,
            Err(e) => {
                session.transition(UploadState::Failed)?;
                return Err(e.into());
            }
        };

        if let Err(e) = self.api.authenticate().await {
            warn!("Upload authentication failed: {}", e);
            session.transition(UploadState::Failed)?;
            return Err(e);
        }
        session.transition(UploadState::Authenticated)?;
        session.transition(UploadState::Uploading)?;

        loop {
            match self.step(session, &mut file, metadata).await {
                Ok(Some(video_id)) => {
                    session.video_id = Some(video_id.clone());
                    session.transition(UploadState::Complete)?;
                    return Ok(video_id);
                }
                Ok(None) => {}
                Err(e) if e.is_retryable() && session.can_retry() => {
                    let attempt = session.record_retry()?;
                    session.transition(UploadState::RetryWait)?;
                    let delay = self.backoff.delay_for_attempt(attempt);
                    warn!(
                        attempt,
                        max_retries = session.max_retries,
                        delay_secs = delay.as_secs_f64(),
                        offset = session.bytes_sent,
                        "Upload interrupted, retrying: {}",
                        e
                    );
                    self.sleeper.sleep(delay).await;
                    session.transition(UploadState::Uploading)?;
                }
                Err(e) => {
                    session.transition(UploadState::Failed)?;
                    if e.is_retryable() {
                        return Err(PublishError::RetriesExhausted {
                            retries: session.retry_count,
                            source: Box::new(e),
                        });
                    }
                    return Err(e);
                }
            }
        }
    }

    /// Open the session or send the next chunk. `Some(id)` once complete.
    async fn step(
        &self,
        session: &mut UploadSession,
        file: &mut File,
        metadata: &VideoMetadata,
    ) -> PublishResult<Option<String>> {
        let Some(session_uri) = session.session_uri.clone() else {
            let uri = self
                .api
                .begin_session(metadata, session.total_bytes, VIDEO_CONTENT_TYPE)
                .await?;
            debug!("Resumable session opened");
            session.session_uri = Some(uri);
            return Ok(None);
        };

        let offset = session.bytes_sent;
        if offset >= session.total_bytes {
            return Err(PublishError::invalid_response(format!(
                "server holds all {} bytes but did not complete the upload",
                session.total_bytes
            )));
        }

        let remaining = session.total_bytes - offset;
        let len = usize::try_from(remaining)
            .map_or(self.config.chunk_size, |r| r.min(self.config.chunk_size));
        let chunk = read_chunk(file, offset, len).await?;

        match self
            .api
            .upload_chunk(&session_uri, offset, session.total_bytes, chunk)
            .await?
        {
            ChunkAck::Complete { video_id } => {
                session.record_ack(session.total_bytes);
                Ok(Some(video_id))
            }
            ChunkAck::Incomplete { received } => {
                if received <= offset {
                    return Err(PublishError::NoProgress { offset });
                }
                session.record_ack(received);
                info!(
                    bytes_sent = session.bytes_sent,
                    total_bytes = session.total_bytes,
                    "Upload progress: {:.0}%",
                    session.progress() * 100.0
                );
                Ok(None)
            }
        }
    }

    async fn attach_thumbnail(&self, video_id: &str, thumbnail: Option<&Path>) -> ThumbnailStatus {
        let Some(path) = thumbnail else {
            return ThumbnailStatus::Skipped;
        };

        let jpeg = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(thumbnail = %path.display(), "Thumbnail missing, skipping");
                return ThumbnailStatus::Skipped;
            }
            Err(e) => {
                let err = PublishError::ThumbnailAttach(e.to_string());
                warn!(thumbnail = %path.display(), "{}", err);
                return ThumbnailStatus::Failed(err.to_string());
            }
        };

        match self.api.set_thumbnail(video_id, jpeg).await {
            Ok(()) => {
                info!(video_id, "Thumbnail attached");
                ThumbnailStatus::Attached
            }
            Err(e) => {
                let err = PublishError::ThumbnailAttach(e.to_string());
                warn!(video_id, "{}", err);
                ThumbnailStatus::Failed(err.to_string())
            }
        }
    }
}
