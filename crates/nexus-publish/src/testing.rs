//! Scripted stand-ins for the upload API and the retry sleeper.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use nexus_models::VideoMetadata;

use crate::api::{ChunkAck, UploadApi};
use crate::error::{PublishError, PublishResult};
use crate::retry::Sleeper;

/// One call observed by [`FakeUploadApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    Authenticate,
    BeginSession { title: String, total_bytes: u64 },
    UploadChunk { offset: u64, len: usize },
    SetThumbnail { video_id: String, bytes: usize },
}

#[derive(Debug, Default)]
struct FakeState {
    auth_error: Option<String>,
    begin_failures: VecDeque<u16>,
    chunk_failures: VecDeque<u16>,
    offset_failures: Vec<(u64, u16)>,
    always_fail_chunks: Option<u16>,
    stalled_acks: usize,
    thumbnail_status: Option<u16>,
    received: u64,
    calls: Vec<ApiCall>,
}

/// In-memory resumable-upload server.
///
/// Accepts every chunk that starts at the stored offset. Failures are
/// scripted as HTTP statuses and consumed in order.
#[derive(Debug, Clone)]
pub struct FakeUploadApi {
    state: Arc<Mutex<FakeState>>,
    video_id: String,
}

impl Default for FakeUploadApi {
    fn default() -> Self {
        Self::new("fake-video-id")
    }
}

impl FakeUploadApi {
    pub fn new(video_id: impl Into<String>) -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState::default())),
            video_id: video_id.into(),
        }
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake upload state poisoned")
    }

    pub fn fail_auth(&self, message: impl Into<String>) {
        self.state().auth_error = Some(message.into());
    }

    /// Fail the next session starts with these statuses.
    pub fn fail_begin_with(&self, statuses: &[u16]) {
        self.state().begin_failures.extend(statuses);
    }

    /// Fail the next chunk sends with these statuses.
    pub fn fail_chunks_with(&self, statuses: &[u16]) {
        self.state().chunk_failures.extend(statuses);
    }

    /// Fail the first chunk sent at `offset` with `status`.
    pub fn fail_once_at_offset(&self, offset: u64, status: u16) {
        self.state().offset_failures.push((offset, status));
    }

    /// Fail every chunk send with `status`.
    pub fn always_fail_chunks(&self, status: u16) {
        self.state().always_fail_chunks = Some(status);
    }

    /// Acknowledge the next `count` chunks without storing them.
    pub fn stall_acks(&self, count: usize) {
        self.state().stalled_acks = count;
    }

    /// Reject thumbnail uploads with `status`.
    pub fn fail_thumbnail(&self, status: u16) {
        self.state().thumbnail_status = Some(status);
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.state().calls.clone()
    }

    /// Offsets of every chunk send, in order.
    pub fn chunk_offsets(&self) -> Vec<u64> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| match c {
                ApiCall::UploadChunk { offset, .. } => Some(*offset),
                _ => None,
            })
            .collect()
    }

    pub fn received(&self) -> u64 {
        self.state().received
    }
}

fn scripted(status: u16) -> PublishError {
    PublishError::from_http_status(status, format!("scripted {}", status))
}

#[async_trait]
impl UploadApi for FakeUploadApi {
    async fn authenticate(&self) -> PublishResult<()> {
        let mut state = self.state();
        state.calls.push(ApiCall::Authenticate);
        match &state.auth_error {
            Some(message) => Err(PublishError::auth_failed(message.clone())),
            None => Ok(()),
        }
    }

    async fn begin_session(
        &self,
        metadata: &VideoMetadata,
        total_bytes: u64,
        _content_type: &str,
    ) -> PublishResult<String> {
        let mut state = self.state();
        state.calls.push(ApiCall::BeginSession {
            title: metadata.title.clone(),
            total_bytes,
        });
        if let Some(status) = state.begin_failures.pop_front() {
            return Err(scripted(status));
        }
        state.received = 0;
        Ok("fake://session/1".to_string())
    }

    async fn upload_chunk(
        &self,
        _session_uri: &str,
        offset: u64,
        total_bytes: u64,
        chunk: Vec<u8>,
    ) -> PublishResult<ChunkAck> {
        let mut state = self.state();
        state.calls.push(ApiCall::UploadChunk {
            offset,
            len: chunk.len(),
        });

        if let Some(status) = state.always_fail_chunks {
            return Err(scripted(status));
        }
        if let Some(status) = state.chunk_failures.pop_front() {
            return Err(scripted(status));
        }
        if let Some(i) = state.offset_failures.iter().position(|(o, _)| *o == offset) {
            let (_, status) = state.offset_failures.remove(i);
            return Err(scripted(status));
        }
        if offset != state.received {
            return Err(PublishError::Rejected {
                status: 400,
                message: format!("expected offset {}, got {}", state.received, offset),
            });
        }
        if state.stalled_acks > 0 {
            state.stalled_acks -= 1;
            return Ok(ChunkAck::Incomplete {
                received: state.received,
            });
        }

        state.received = offset + chunk.len() as u64;
        if state.received >= total_bytes {
            Ok(ChunkAck::Complete {
                video_id: self.video_id.clone(),
            })
        } else {
            Ok(ChunkAck::Incomplete {
                received: state.received,
            })
        }
    }

    async fn set_thumbnail(&self, video_id: &str, jpeg: Vec<u8>) -> PublishResult<()> {
        let mut state = self.state();
        state.calls.push(ApiCall::SetThumbnail {
            video_id: video_id.to_string(),
            bytes: jpeg.len(),
        });
        match state.thumbnail_status {
            Some(status) => Err(scripted(status)),
            None => Ok(()),
        }
    }
}

/// Records requested delays and returns immediately.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().expect("sleeper state poisoned").clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, delay: Duration) {
        self.delays.lock().expect("sleeper state poisoned").push(delay);
    }
}
