//! FFmpeg CLI wrapper and still compositing for Nexus renders.
//!
//! This crate provides:
//! - Multi-input FFmpeg command building behind a narrow `Transcoder` seam
//! - Duration probing that degrades to zero instead of failing
//! - Duration-exact section clips, intro/outro slates and final assembly
//! - Deterministic title thumbnails

pub mod assemble;
pub mod command;
pub mod error;
pub mod filters;
pub mod fs_utils;
pub mod probe;
pub mod section;
pub mod slate;
pub mod thumbnail;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use assemble::FinalAssembler;
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner, Transcoder};
pub use error::{MediaError, MediaResult};
pub use filters::CaptionStyle;
pub use probe::{probe_media, DurationProbe, FfprobeDurationProbe, MediaInfo};
pub use section::{plan_clips, ClipPlan, SectionClipSynthesizer};
pub use slate::{outro_caption, SlateGenerator};
pub use thumbnail::ThumbnailCompositor;
