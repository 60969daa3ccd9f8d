//! Upload session state machine.
//!
//! `Init -> Authenticated -> Uploading -> {RetryWait -> Uploading}* -> Complete | Failed`

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// State of an in-progress upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    #[default]
    Init,
    Authenticated,
    Uploading,
    RetryWait,
    Complete,
    Failed,
}

impl UploadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadState::Init => "init",
            UploadState::Authenticated => "authenticated",
            UploadState::Uploading => "uploading",
            UploadState::RetryWait => "retry_wait",
            UploadState::Complete => "complete",
            UploadState::Failed => "failed",
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadState::Complete | UploadState::Failed)
    }

    /// Whether `next` is a legal successor of this state.
    pub fn can_transition_to(&self, next: UploadState) -> bool {
        use UploadState::*;
        matches!(
            (self, next),
            (Init, Authenticated)
                | (Init, Failed)
                | (Authenticated, Uploading)
                | (Authenticated, Failed)
                | (Uploading, RetryWait)
                | (Uploading, Complete)
                | (Uploading, Failed)
                | (RetryWait, Uploading)
                | (RetryWait, Failed)
        )
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rejected state-machine operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Illegal upload transition {from} -> {to}")]
    IllegalTransition { from: UploadState, to: UploadState },

    #[error("Retry budget of {0} exhausted")]
    RetryBudgetExhausted(u32),
}

/// In-progress transfer state for one upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadSession {
    /// Resumable session location, set once the server accepts the insert
    pub session_uri: Option<String>,
    /// Remote video id, set once the last chunk is acknowledged
    pub video_id: Option<String>,
    /// Bytes acknowledged by the server
    pub bytes_sent: u64,
    pub total_bytes: u64,
    pub retry_count: u32,
    pub max_retries: u32,
    pub state: UploadState,
    /// Every state entered, starting with `Init`
    pub history: Vec<UploadState>,
}

impl UploadSession {
    pub fn new(total_bytes: u64, max_retries: u32) -> Self {
        Self {
            session_uri: None,
            video_id: None,
            bytes_sent: 0,
            total_bytes,
            retry_count: 0,
            max_retries,
            state: UploadState::Init,
            history: vec![UploadState::Init],
        }
    }

    /// Move to `next`, rejecting transitions the state machine does not allow.
    pub fn transition(&mut self, next: UploadState) -> Result<(), SessionError> {
        if !self.state.can_transition_to(next) {
            return Err(SessionError::IllegalTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        self.history.push(next);
        Ok(())
    }

    /// Whether another retry fits in the budget.
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// Consume one retry, returning the new attempt number (1-based).
    pub fn record_retry(&mut self) -> Result<u32, SessionError> {
        if !self.can_retry() {
            return Err(SessionError::RetryBudgetExhausted(self.max_retries));
        }
        self.retry_count += 1;
        Ok(self.retry_count)
    }

    /// Record the server-acknowledged byte count. Never moves backwards.
    pub fn record_ack(&mut self, acknowledged: u64) {
        self.bytes_sent = self.bytes_sent.max(acknowledged.min(self.total_bytes));
    }

    /// Fraction of bytes acknowledged, 0.0..=1.0.
    pub fn progress(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.bytes_sent as f64 / self.total_bytes as f64
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}
