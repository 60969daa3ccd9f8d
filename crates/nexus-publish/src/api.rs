//! The remote upload capability the transport drives.

use async_trait::async_trait;

use nexus_models::VideoMetadata;

use crate::error::PublishResult;

/// Server acknowledgement of one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkAck {
    /// More bytes expected; `received` bytes are durably stored.
    Incomplete { received: u64 },
    /// Upload finished; the server assigned this id.
    Complete { video_id: String },
}

/// Resumable-upload operations of a video platform.
#[async_trait]
pub trait UploadApi: Send + Sync {
    /// Obtain or refresh credentials.
    async fn authenticate(&self) -> PublishResult<()>;

    /// Start a resumable session, returning its location.
    async fn begin_session(
        &self,
        metadata: &VideoMetadata,
        total_bytes: u64,
        content_type: &str,
    ) -> PublishResult<String>;

    /// Send `chunk`, which starts at byte `offset` of a `total_bytes` upload.
    async fn upload_chunk(
        &self,
        session_uri: &str,
        offset: u64,
        total_bytes: u64,
        chunk: Vec<u8>,
    ) -> PublishResult<ChunkAck>;

    /// Attach a JPEG thumbnail to an uploaded video.
    async fn set_thumbnail(&self, video_id: &str, jpeg: Vec<u8>) -> PublishResult<()>;
}
