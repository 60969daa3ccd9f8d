//! Canonical output format and encoding configuration.

use serde::{Deserialize, Serialize};

/// Canonical video width in pixels.
pub const CANONICAL_WIDTH: u32 = 1920;
/// Canonical video height in pixels.
pub const CANONICAL_HEIGHT: u32 = 1080;
/// Canonical frame rate.
pub const CANONICAL_FPS: u32 = 24;

/// Thumbnail canvas size.
pub const THUMBNAIL_WIDTH: u32 = 1280;
pub const THUMBNAIL_HEIGHT: u32 = 720;

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "fast";
/// Default CRF (Constant Rate Factor)
pub const DEFAULT_CRF: u8 = 20;
/// Default audio bitrate
pub const DEFAULT_AUDIO_BITRATE: &str = "192k";
/// Pixel format every rendered segment is normalized to.
pub const DEFAULT_PIXEL_FORMAT: &str = "yuv420p";

/// One frame interval at the canonical frame rate, in seconds.
pub fn frame_interval() -> f64 {
    1.0 / CANONICAL_FPS as f64
}

/// Video encoding configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingConfig {
    /// Video codec (e.g., "libx264")
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// Encoding preset (e.g., "fast", "medium")
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Constant Rate Factor (quality, 0-51, lower is better)
    #[serde(default = "default_crf")]
    pub crf: u8,

    /// Audio codec used when muxing narration
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Audio bitrate
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    /// Output width
    #[serde(default = "default_width")]
    pub width: u32,

    /// Output height
    #[serde(default = "default_height")]
    pub height: u32,

    /// Output frame rate
    #[serde(default = "default_fps")]
    pub fps: u32,
}

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}
fn default_crf() -> u8 {
    DEFAULT_CRF
}
fn default_audio_codec() -> String {
    DEFAULT_AUDIO_CODEC.to_string()
}
fn default_audio_bitrate() -> String {
    DEFAULT_AUDIO_BITRATE.to_string()
}
fn default_width() -> u32 {
    CANONICAL_WIDTH
}
fn default_height() -> u32 {
    CANONICAL_HEIGHT
}
fn default_fps() -> u32 {
    CANONICAL_FPS
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            preset: DEFAULT_PRESET.to_string(),
            crf: DEFAULT_CRF,
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            audio_bitrate: DEFAULT_AUDIO_BITRATE.to_string(),
            width: CANONICAL_WIDTH,
            height: CANONICAL_HEIGHT,
            fps: CANONICAL_FPS,
        }
    }
}

impl EncodingConfig {
    /// Create a new encoding configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new config with updated CRF.
    pub fn with_crf(mut self, crf: u8) -> Self {
        self.crf = crf;
        self
    }

    /// Duration of a single frame at this config's frame rate.
    pub fn frame_interval(&self) -> f64 {
        1.0 / self.fps.max(1) as f64
    }

    /// Resolution as `WxH`, the form lavfi sources expect.
    pub fn size_arg(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// FFmpeg arguments for a silent H.264 video stream.
    pub fn video_args(&self) -> Vec<String> {
        vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-crf".to_string(),
            self.crf.to_string(),
            "-pix_fmt".to_string(),
            DEFAULT_PIXEL_FORMAT.to_string(),
            "-r".to_string(),
            self.fps.to_string(),
        ]
    }

    /// FFmpeg arguments for the narration audio stream.
    pub fn audio_args(&self) -> Vec<String> {
        vec![
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            self.audio_bitrate.clone(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EncodingConfig::default();
        assert_eq!(config.codec, "libx264");
        assert_eq!(config.crf, 20);
        assert_eq!(config.size_arg(), "1920x1080");
    }

    #[test]
    fn test_video_args() {
        let args = EncodingConfig::default().video_args();
        assert!(args.contains(&"-c:v".to_string()));
        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"yuv420p".to_string()));
        assert!(args.contains(&"24".to_string()));
    }

    #[test]
    fn test_frame_interval() {
        assert!((frame_interval() - 1.0 / 24.0).abs() < 1e-9);
        let config = EncodingConfig {
            fps: 30,
            ..Default::default()
        };
        assert!((config.frame_interval() - 1.0 / 30.0).abs() < 1e-9);
    }
}
