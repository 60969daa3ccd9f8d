//! Shared data models for the Nexus render-and-publish pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Script records and footage manifests
//! - Render artifacts (section clips, slates, timeline, final video, thumbnail)
//! - Encoding configuration and canonical output format
//! - Publish metadata and the upload session state machine

pub mod encoding;
pub mod media;
pub mod metadata;
pub mod run;
pub mod script;
pub mod upload;

// Re-export common types
pub use encoding::EncodingConfig;
pub use media::{AudioTrack, FinalVideo, RawClip, SectionClip, Slate, Thumbnail, TargetSpec, Timeline};
pub use metadata::{Privacy, VideoMetadata};
pub use run::RunId;
pub use script::{FootageManifest, Script, Section};
pub use upload::{SessionError, UploadSession, UploadState};
