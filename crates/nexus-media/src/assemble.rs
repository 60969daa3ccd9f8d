//! Timeline concatenation and narration muxing.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use tracing::{info, warn};

use nexus_models::{EncodingConfig, FinalVideo, Script, SectionClip, Timeline};

use crate::command::{FfmpegCommand, Transcoder};
use crate::error::{MediaError, MediaResult};
use crate::filters;
use crate::fs_utils::{commit_partial, ensure_parent, partial_path, remove_if_exists};
use crate::probe::DurationProbe;
use crate::slate::SlateGenerator;

/// Codec name reported for an encoder.
fn codec_name(encoder: &str) -> String {
    match encoder {
        "libx264" => "h264".to_string(),
        "libx265" => "hevc".to_string(),
        other => other.to_string(),
    }
}

/// Builds the final video: intro, sections and outro over the narration.
pub struct FinalAssembler {
    transcoder: Arc<dyn Transcoder>,
    probe: Arc<dyn DurationProbe>,
    slates: SlateGenerator,
    encoding: EncodingConfig,
    channel_name: String,
    scratch_root: PathBuf,
}

impl FinalAssembler {
    pub fn new(
        transcoder: Arc<dyn Transcoder>,
        probe: Arc<dyn DurationProbe>,
        channel_name: impl Into<String>,
        scratch_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            slates: SlateGenerator::new(Arc::clone(&transcoder)),
            transcoder,
            probe,
            encoding: EncodingConfig::default(),
            channel_name: channel_name.into(),
            scratch_root: scratch_root.into(),
        }
    }

    pub fn with_slates(mut self, slates: SlateGenerator) -> Self {
        self.slates = slates;
        self
    }

    pub fn with_encoding(mut self, encoding: EncodingConfig) -> Self {
        self.encoding = encoding;
        self
    }

    /// Assemble `sections` against `audio` into `output`.
    ///
    /// The result lasts `min(timeline, audio)` seconds. Slates and the silent
    /// timeline live in a scratch directory removed on every exit path.
    pub async fn assemble(
        &self,
        sections: &[SectionClip],
        audio: &Path,
        script: &Script,
        output: &Path,
    ) -> MediaResult<FinalVideo> {
        if sections.is_empty() {
            return Err(MediaError::missing_input("no section clips to assemble"));
        }

        let audio_duration = self.probe.duration(audio).await;
        if audio_duration <= 0.0 {
            return Err(MediaError::missing_input(format!(
                "narration audio {} has no measurable duration",
                audio.display()
            )));
        }

        tokio::fs::create_dir_all(&self.scratch_root).await?;
        let scratch = tempfile::Builder::new()
            .prefix("assemble_")
            .tempdir_in(&self.scratch_root)?;

        let timeline = self.build_timeline(sections, script, &scratch).await?;
        let timeline_path = self.concat_timeline(&timeline, &scratch).await?;

        let target = timeline.duration().min(audio_duration);
        info!(
            segments = timeline.len(),
            timeline_secs = timeline.duration(),
            audio_secs = audio_duration,
            output_secs = target,
            "Muxing final video"
        );

        let partial = partial_path(output);
        ensure_parent(output).await?;

        let duration = match self.mux(&timeline_path, audio, &partial, target).await {
            Ok(duration) => duration,
            Err(e) => {
                remove_if_exists(&partial).await;
                return Err(e);
            }
        };

        if let Err(e) = commit_partial(output).await {
            remove_if_exists(&partial).await;
            return Err(e);
        }
        info!(output = %output.display(), duration_secs = duration, "Final video ready");

        Ok(FinalVideo {
            path: output.to_path_buf(),
            duration,
            width: self.encoding.width,
            height: self.encoding.height,
            video_codec: codec_name(&self.encoding.codec),
            audio_codec: codec_name(&self.encoding.audio_codec),
        })
    }

    async fn build_timeline(
        &self,
        sections: &[SectionClip],
        script: &Script,
        scratch: &TempDir,
    ) -> MediaResult<Timeline> {
        let intro = self
            .slates
            .intro(&self.channel_name, scratch.path().join("intro.mp4"))
            .await?;
        let outro = self
            .slates
            .outro(&script.cta, scratch.path().join("outro.mp4"))
            .await?;

        Ok(Timeline {
            intro,
            sections: sections.to_vec(),
            outro,
        })
    }

    /// Concatenate the timeline into one silent, re-encoded video.
    async fn concat_timeline(&self, timeline: &Timeline, scratch: &TempDir) -> MediaResult<PathBuf> {
        let list = scratch.path().join("concat.txt");
        tokio::fs::write(&list, filters::concat_list(&timeline.segment_paths())).await?;

        let silent = scratch.path().join("timeline.mp4");
        let cmd = FfmpegCommand::new(&silent)
            .concat_list(&list)
            .video_filter(filters::normalize(self.encoding.fps))
            .no_audio()
            .output_args(self.encoding.video_args())
            .duration(timeline.duration());

        self.transcoder.transcode(&cmd).await?;
        Ok(silent)
    }

    /// Mux video (copied) with re-encoded audio, capped at `target` seconds.
    async fn mux(&self, video: &Path, audio: &Path, partial: &Path, target: f64) -> MediaResult<f64> {
        let cmd = FfmpegCommand::new(partial)
            .input(video)
            .input(audio)
            .map("0:v:0")
            .map("1:a:0")
            .copy_video()
            .output_args(self.encoding.audio_args())
            .shortest()
            .duration(target)
            .faststart()
            .output_args(["-f", "mp4"]);

        self.transcoder.transcode(&cmd).await?;

        let measured = self.probe.duration(partial).await;
        if measured <= 0.0 {
            warn!("Final video could not be probed, assuming {:.3}s", target);
            return Ok(target);
        }
        if (measured - target).abs() > self.encoding.frame_interval() + 1e-6 {
            return Err(MediaError::encode_failed(
                format!("final video is {:.3}s, expected {:.3}s", measured, target),
                None,
                None,
            ));
        }
        Ok(measured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeMedia;

    fn script() -> Script {
        Script {
            cta: "Follow for more".to_string(),
            ..Default::default()
        }
    }

    fn section(dir: &Path, index: usize, duration: f64) -> SectionClip {
        SectionClip {
            path: dir.join(format!("section_{index:03}.mp4")),
            duration,
            index,
            width: 1920,
            height: 1080,
            silent: true,
        }
    }

    struct Fixture {
        dir: TempDir,
        fake: FakeMedia,
        audio: PathBuf,
    }

    impl Fixture {
        fn new(audio_secs: f64) -> Self {
            let dir = TempDir::new().unwrap();
            let fake = FakeMedia::new();
            let audio = dir.path().join("narration.mp3");
            fake.set_duration(&audio, audio_secs);
            Self { dir, fake, audio }
        }

        fn scratch(&self) -> PathBuf {
            self.dir.path().join("scratch")
        }

        fn assembler(&self) -> FinalAssembler {
            FinalAssembler::new(
                Arc::new(self.fake.clone()),
                Arc::new(self.fake.clone()),
                "NEXUS",
                self.scratch(),
            )
        }

        /// Sections totalling 7s, so the timeline is 2 + 7 + 3 = 12s.
        fn sections(&self) -> Vec<SectionClip> {
            vec![section(self.dir.path(), 0, 4.0), section(self.dir.path(), 1, 3.0)]
        }

        fn output(&self) -> PathBuf {
            self.dir.path().join("out").join("final.mp4")
        }

        fn scratch_is_empty(&self) -> bool {
            std::fs::read_dir(self.scratch()).unwrap().next().is_none()
        }
    }

    #[tokio::test]
    async fn test_audio_shorter_than_timeline() {
        let fx = Fixture::new(8.0);
        let video = fx
            .assembler()
            .assemble(&fx.sections(), &fx.audio, &script(), &fx.output())
            .await
            .unwrap();

        assert!((video.duration - 8.0).abs() < 1e-6);
        assert_eq!(video.path, fx.output());
        assert!(video.path.exists());
        assert!(!partial_path(&fx.output()).exists());
        assert_eq!(video.video_codec, "h264");
        assert_eq!(video.audio_codec, "aac");
        assert!(fx.scratch_is_empty());
    }

    #[tokio::test]
    async fn test_equal_durations() {
        let fx = Fixture::new(12.0);
        let video = fx
            .assembler()
            .assemble(&fx.sections(), &fx.audio, &script(), &fx.output())
            .await
            .unwrap();
        assert!((video.duration - 12.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_audio_longer_than_timeline() {
        let fx = Fixture::new(30.0);
        let video = fx
            .assembler()
            .assemble(&fx.sections(), &fx.audio, &script(), &fx.output())
            .await
            .unwrap();
        assert!((video.duration - 12.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_segment_order_and_mux_flags() {
        let fx = Fixture::new(8.0);
        fx.assembler()
            .assemble(&fx.sections(), &fx.audio, &script(), &fx.output())
            .await
            .unwrap();

        let commands = fx.fake.commands();
        // intro, outro, concat, mux
        assert_eq!(commands.len(), 4);

        let concat = &commands[2];
        assert_eq!(concat.output_duration(), Some(12.0));
        assert!(concat.has_output_flag("-an"));

        let mux = &commands[3];
        assert!(mux.has_output_flag("-shortest"));
        assert!(mux.get_output_args().windows(2).any(|w| w == ["-c:v", "copy"]));
        assert!(mux.get_output_args().windows(2).any(|w| w == ["-c:a", "aac"]));
        assert_eq!(mux.output_duration(), Some(8.0));
    }

    #[tokio::test]
    async fn test_empty_sections_is_missing_input() {
        let fx = Fixture::new(8.0);
        let err = fx
            .assembler()
            .assemble(&[], &fx.audio, &script(), &fx.output())
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::MissingInput(_)));
        assert!(fx.fake.commands().is_empty());
    }

    #[tokio::test]
    async fn test_unmeasurable_audio_is_missing_input() {
        let fx = Fixture::new(0.0);
        let err = fx
            .assembler()
            .assemble(&fx.sections(), &fx.audio, &script(), &fx.output())
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::MissingInput(_)));
    }

    #[tokio::test]
    async fn test_mux_failure_leaves_no_output() {
        let fx = Fixture::new(8.0);
        fx.fake.fail_outputs_containing(".partial");

        let err = fx
            .assembler()
            .assemble(&fx.sections(), &fx.audio, &script(), &fx.output())
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::EncodeFailed { .. }));
        assert!(!fx.output().exists());
        assert!(!partial_path(&fx.output()).exists());
        assert!(fx.scratch_is_empty());
    }

    #[tokio::test]
    async fn test_concat_failure_cleans_scratch() {
        let fx = Fixture::new(8.0);
        fx.fake.fail_outputs_containing("timeline.mp4");

        let result = fx
            .assembler()
            .assemble(&fx.sections(), &fx.audio, &script(), &fx.output())
            .await;

        assert!(result.is_err());
        assert!(fx.scratch_is_empty());
        assert!(!fx.output().exists());
    }
}
