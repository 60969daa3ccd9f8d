//! Solid-background intro/outro cards.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use nexus_models::{EncodingConfig, Slate};

use crate::command::{FfmpegCommand, Transcoder};
use crate::error::{MediaError, MediaResult};
use crate::filters::{CaptionAnchor, CaptionStyle};

/// Slate background color.
pub const SLATE_BACKGROUND: &str = "0x0B1D3A";
/// Intro slate length in seconds.
pub const INTRO_SECONDS: f64 = 2.0;
/// Outro slate length in seconds.
pub const OUTRO_SECONDS: f64 = 3.0;
/// Longest call-to-action shown verbatim on the outro.
pub const MAX_OUTRO_CAPTION_CHARS: usize = 60;
/// Outro caption used when the call-to-action is too long or empty.
pub const OUTRO_FALLBACK: &str = "Thanks for watching! Subscribe for more.";

/// Pick the outro caption for a call-to-action.
pub fn outro_caption(cta: &str) -> &str {
    let cta = cta.trim();
    if cta.is_empty() || cta.chars().count() > MAX_OUTRO_CAPTION_CHARS {
        OUTRO_FALLBACK
    } else {
        cta
    }
}

/// Renders captioned solid-color cards.
pub struct SlateGenerator {
    transcoder: Arc<dyn Transcoder>,
    encoding: EncodingConfig,
    style: CaptionStyle,
    background: String,
}

impl SlateGenerator {
    pub fn new(transcoder: Arc<dyn Transcoder>) -> Self {
        Self {
            transcoder,
            encoding: EncodingConfig::default(),
            style: CaptionStyle::slate(),
            background: SLATE_BACKGROUND.to_string(),
        }
    }

    pub fn with_encoding(mut self, encoding: EncodingConfig) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_style(mut self, style: CaptionStyle) -> Self {
        self.style = style;
        self
    }

    fn build_command(&self, caption: &str, duration: f64, output: &Path) -> FfmpegCommand {
        let source = format!(
            "color=c={}:s={}:r={}:d={:.3}",
            self.background,
            self.encoding.size_arg(),
            self.encoding.fps,
            duration
        );

        let mut cmd = FfmpegCommand::new(output).lavfi(source);
        if !caption.trim().is_empty() {
            cmd = cmd.video_filter(format!(
                "{},format=yuv420p",
                self.style.drawtext(caption, CaptionAnchor::Center)
            ));
        }
        cmd.no_audio()
            .output_args(self.encoding.video_args())
            .duration(duration)
    }

    /// Render a slate of `duration` seconds to `output`.
    pub async fn generate(
        &self,
        caption: &str,
        duration: f64,
        output: impl Into<PathBuf>,
    ) -> MediaResult<Slate> {
        if !(duration.is_finite() && duration > 0.0) {
            return Err(MediaError::invalid_input(format!(
                "slate duration must be positive, got {}",
                duration
            )));
        }

        let output = output.into();
        info!(caption, duration_secs = duration, "Generating slate");
        let cmd = self.build_command(caption, duration, &output);
        self.transcoder.transcode(&cmd).await?;

        Ok(Slate {
            path: output,
            duration,
            caption: caption.to_string(),
        })
    }

    /// The 2 second intro bearing the channel name.
    pub async fn intro(&self, channel: &str, output: impl Into<PathBuf>) -> MediaResult<Slate> {
        self.generate(channel, INTRO_SECONDS, output).await
    }

    /// The 3 second outro bearing the call-to-action.
    pub async fn outro(&self, cta: &str, output: impl Into<PathBuf>) -> MediaResult<Slate> {
        self.generate(outro_caption(cta), OUTRO_SECONDS, output).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeMedia;
    use tempfile::TempDir;

    #[test]
    fn test_outro_caption_within_bound_is_verbatim() {
        let cta = "Subscribe for daily AI news";
        assert_eq!(outro_caption(cta), cta);

        let exactly = "x".repeat(MAX_OUTRO_CAPTION_CHARS);
        assert_eq!(outro_caption(&exactly), exactly);
    }

    #[test]
    fn test_outro_caption_over_bound_uses_fallback() {
        let long = "y".repeat(MAX_OUTRO_CAPTION_CHARS + 1);
        assert_eq!(outro_caption(&long), OUTRO_FALLBACK);
        assert_eq!(outro_caption("   "), OUTRO_FALLBACK);
    }

    #[tokio::test]
    async fn test_intro_slate_command() {
        let dir = TempDir::new().unwrap();
        let fake = FakeMedia::new();
        let generator = SlateGenerator::new(Arc::new(fake.clone()));

        let slate = generator
            .intro("NEXUS", dir.path().join("intro.mp4"))
            .await
            .unwrap();

        assert_eq!(slate.duration, INTRO_SECONDS);
        assert_eq!(slate.caption, "NEXUS");
        assert!(slate.path.exists());

        let cmd = &fake.commands()[0];
        let source = &cmd.inputs()[0].source;
        assert!(source.starts_with("color=c=0x0B1D3A:s=1920x1080:r=24"));
        let args = cmd.build_args();
        assert!(args.iter().any(|a| a.contains("x=(w-text_w)/2:y=(h-text_h)/2")));
        assert_eq!(cmd.output_duration(), Some(2.0));
        assert!(cmd.has_output_flag("-an"));
    }

    #[tokio::test]
    async fn test_outro_uses_fallback_for_long_cta() {
        let dir = TempDir::new().unwrap();
        let fake = FakeMedia::new();
        let generator = SlateGenerator::new(Arc::new(fake));

        let slate = generator
            .outro(&"z".repeat(80), dir.path().join("outro.mp4"))
            .await
            .unwrap();
        assert_eq!(slate.caption, OUTRO_FALLBACK);
        assert_eq!(slate.duration, OUTRO_SECONDS);
    }

    #[tokio::test]
    async fn test_zero_duration_rejected() {
        let generator = SlateGenerator::new(Arc::new(FakeMedia::new()));
        let err = generator.generate("x", 0.0, "/tmp/never.mp4").await.unwrap_err();
        assert!(matches!(err, MediaError::InvalidInput(_)));
    }
}
