//! Pipeline error types.

use std::path::PathBuf;

use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Media error: {0}")]
    Media(#[from] nexus_media::MediaError),

    #[error("Publish error: {0}")]
    Publish(#[from] nexus_publish::PublishError),

    #[error("Failed to load {path}: {message}")]
    InputLoad { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn input_load(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::InputLoad {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
