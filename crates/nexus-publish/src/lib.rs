//! Resumable YouTube uploads for Nexus.
//!
//! This crate provides:
//! - OAuth refresh-token authentication with a cached access token
//! - A YouTube Data API v3 client behind the `UploadApi` seam
//! - `UploadTransport`, the chunked upload state machine with exponential
//!   backoff and best-effort thumbnail attachment

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod retry;
pub mod transport;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use api::{ChunkAck, UploadApi};
pub use auth::{AccessToken, RefreshTokenProvider, TokenCache, TokenProvider};
pub use client::YouTubeClient;
pub use config::{UploadConfig, YouTubeConfig};
pub use error::{PublishError, PublishResult};
pub use retry::{Backoff, Sleeper, TokioSleeper};
pub use transport::{ThumbnailStatus, UploadOutcome, UploadTransport};
