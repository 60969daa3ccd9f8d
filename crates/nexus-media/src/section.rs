//! Duration-exact, captioned section clips.
//!
//! A section is filled by walking its raw clips in order, looping back to the
//! start when the list runs out, until the accumulated footage covers the
//! target. The selection is then scaled into the canonical frame, trimmed to
//! the exact target and captioned in a single encode.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use nexus_models::{EncodingConfig, RawClip, SectionClip, TargetSpec};

use crate::command::{FfmpegCommand, Transcoder};
use crate::error::{MediaError, MediaResult};
use crate::filters::{self, CaptionAnchor, CaptionStyle, CAPTION_OFFSET_X, CAPTION_OFFSET_Y};
use crate::fs_utils::ensure_parent;
use crate::probe::DurationProbe;

/// Footage chosen to cover one section.
///
/// Each distinct clip is opened once. `sequence` lists the order in which
/// they play, as indices into `sources`, so a looped clip appears several
/// times in the sequence but only once on the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipPlan {
    pub sources: Vec<RawClip>,
    pub sequence: Vec<usize>,
}

impl ClipPlan {
    /// Total footage in the sequence, in seconds.
    pub fn covered(&self) -> f64 {
        self.sequence.iter().map(|&i| self.sources[i].duration).sum()
    }

    /// How many times the source at `index` is played.
    pub fn uses_of(&self, index: usize) -> usize {
        self.sequence.iter().filter(|&&i| i == index).count()
    }

    /// Clips in playback order.
    pub fn clips(&self) -> impl Iterator<Item = &RawClip> {
        self.sequence.iter().map(move |&i| &self.sources[i])
    }
}

/// Choose the clips that cover `target` seconds.
///
/// Zero-length clips are skipped. When every clip is zero-length there is no
/// way to make progress and the plan fails instead of looping.
pub fn plan_clips(clips: &[RawClip], target: f64) -> MediaResult<ClipPlan> {
    if clips.is_empty() {
        return Err(MediaError::missing_input("no raw footage for section"));
    }
    if !(target.is_finite() && target > 0.0) {
        return Err(MediaError::invalid_input(format!(
            "target duration must be positive, got {}",
            target
        )));
    }

    let mut sources: Vec<RawClip> = clips.iter().filter(|c| c.is_usable()).cloned().collect();
    if sources.is_empty() {
        return Err(MediaError::missing_input(format!(
            "all {} raw clips have zero duration",
            clips.len()
        )));
    }

    let mut sequence = Vec::new();
    let mut total = 0.0;
    for index in (0..sources.len()).cycle() {
        if total >= target {
            break;
        }
        total += sources[index].duration;
        sequence.push(index);
    }

    // Sources past the last one played are never opened.
    let used = sequence.iter().max().map_or(0, |&i| i + 1);
    sources.truncate(used);

    Ok(ClipPlan { sources, sequence })
}

/// Build the filter graph for a planned section.
///
/// Each input is normalized once and fanned out with `split` when it plays
/// more than once.
fn section_filter(
    plan: &ClipPlan,
    target: f64,
    caption: &str,
    encoding: &EncodingConfig,
    style: &CaptionStyle,
) -> String {
    let mut graph = String::new();
    let scale = filters::scale_pad(encoding.width, encoding.height);
    let normalize = filters::normalize(encoding.fps);

    for i in 0..plan.sources.len() {
        let uses = plan.uses_of(i);
        graph.push_str(&format!("[{i}:v]{scale},{normalize}"));
        if uses > 1 {
            graph.push_str(&format!(",split={uses}"));
        }
        for n in 0..uses {
            graph.push_str(&format!("[s{i}_{n}]"));
        }
        graph.push(';');
    }

    let mut next = vec![0usize; plan.sources.len()];
    for &i in &plan.sequence {
        graph.push_str(&format!("[s{i}_{}]", next[i]));
        next[i] += 1;
    }
    graph.push_str(&format!("concat=n={}:v=1:a=0[cat];", plan.sequence.len()));
    graph.push_str(&format!(
        "[cat]trim=duration={target:.3},setpts=PTS-STARTPTS"
    ));

    if !caption.trim().is_empty() {
        let anchor = CaptionAnchor::BottomLeft {
            x: CAPTION_OFFSET_X,
            y: CAPTION_OFFSET_Y,
        };
        graph.push(',');
        graph.push_str(&style.drawtext(caption, anchor));
    }
    graph.push_str("[out]");
    graph
}

/// Renders one section clip per target.
pub struct SectionClipSynthesizer {
    transcoder: Arc<dyn Transcoder>,
    probe: Arc<dyn DurationProbe>,
    encoding: EncodingConfig,
    style: CaptionStyle,
    output_dir: PathBuf,
}

impl SectionClipSynthesizer {
    pub fn new(
        transcoder: Arc<dyn Transcoder>,
        probe: Arc<dyn DurationProbe>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            transcoder,
            probe,
            encoding: EncodingConfig::default(),
            style: CaptionStyle::default(),
            output_dir: output_dir.into(),
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

    /// Output path for the section at `index`.
    pub fn output_path(&self, index: usize) -> PathBuf {
        self.output_dir.join(format!("section_{:03}.mp4", index))
    }

    /// Probe every raw clip. Unreadable clips come back with zero duration.
    pub async fn probe_clips(&self, paths: &[PathBuf]) -> Vec<RawClip> {
        let mut clips = Vec::with_capacity(paths.len());
        for path in paths {
            let duration = self.probe.duration(path).await;
            if duration <= 0.0 {
                warn!(clip = %path.display(), "Raw clip has no measurable duration, skipping");
            }
            clips.push(RawClip::new(path.clone(), duration));
        }
        clips
    }

    /// Render one section from its raw footage paths.
    pub async fn synthesize(
        &self,
        raw_paths: &[PathBuf],
        target: &TargetSpec,
    ) -> MediaResult<SectionClip> {
        if raw_paths.is_empty() {
            return Err(MediaError::missing_input(format!(
                "section {} has no raw footage",
                target.index
            )));
        }

        let clips = self.probe_clips(raw_paths).await;
        let plan = plan_clips(&clips, target.duration).map_err(|e| match e {
            MediaError::MissingInput(msg) => {
                MediaError::MissingInput(format!("section {}: {}", target.index, msg))
            }
            other => other,
        })?;

        info!(
            section = target.index,
            target_secs = target.duration,
            inputs = plan.sources.len(),
            segments = plan.sequence.len(),
            covered_secs = plan.covered(),
            "Synthesizing section clip"
        );

        let output = self.output_path(target.index);
        ensure_parent(&output).await?;
        let cmd = self.build_command(&plan, target, &output);
        self.transcoder.transcode(&cmd).await?;

        let duration = self.verify_duration(&output, target).await?;

        Ok(SectionClip {
            path: output,
            duration,
            index: target.index,
            width: self.encoding.width,
            height: self.encoding.height,
            silent: true,
        })
    }

    fn build_command(&self, plan: &ClipPlan, target: &TargetSpec, output: &Path) -> FfmpegCommand {
        let graph = section_filter(
            plan,
            target.duration,
            &target.caption,
            &self.encoding,
            &self.style,
        );
        debug!(section = target.index, "Section filter graph: {}", graph);

        plan.sources
            .iter()
            .fold(FfmpegCommand::new(output), |cmd, clip| cmd.input(&clip.path))
            .filter_complex(graph)
            .map("[out]")
            .no_audio()
            .output_args(self.encoding.video_args())
            .duration(target.duration)
    }

    async fn verify_duration(&self, output: &Path, target: &TargetSpec) -> MediaResult<f64> {
        let measured = self.probe.duration(output).await;
        if measured <= 0.0 {
            warn!(
                section = target.index,
                "Rendered section could not be probed, assuming target duration"
            );
            return Ok(target.duration);
        }

        let tolerance = self.encoding.frame_interval();
        if (measured - target.duration).abs() > tolerance + 1e-6 {
            return Err(MediaError::encode_failed(
                format!(
                    "section {} rendered {:.3}s, expected {:.3}s",
                    target.index, measured, target.duration
                ),
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
    use tempfile::TempDir;

    fn clips(durations: &[f64]) -> Vec<RawClip> {
        durations
            .iter()
            .enumerate()
            .map(|(i, d)| RawClip::new(format!("raw_{i}.mp4"), *d))
            .collect()
    }

    fn durations(plan: &ClipPlan) -> Vec<f64> {
        plan.clips().map(|c| c.duration).collect()
    }

    #[test]
    fn test_plan_stops_once_target_reached() {
        let plan = plan_clips(&clips(&[4.0, 3.0, 6.0]), 5.0).unwrap();
        assert_eq!(durations(&plan), vec![4.0, 3.0]);
        assert_eq!(plan.sources.len(), 2);
    }

    #[test]
    fn test_plan_loops_short_list() {
        let plan = plan_clips(&clips(&[4.0, 3.0]), 10.0).unwrap();
        assert_eq!(durations(&plan), vec![4.0, 3.0, 4.0]);
        assert_eq!(plan.sequence, vec![0, 1, 0]);
        assert_eq!(plan.sources[0].path, PathBuf::from("raw_0.mp4"));
    }

    #[test]
    fn test_plan_skips_zero_duration() {
        let plan = plan_clips(&clips(&[0.0, 2.0, 0.0]), 5.0).unwrap();
        assert_eq!(durations(&plan), vec![2.0, 2.0, 2.0]);
        assert_eq!(plan.sources.len(), 1);
        assert_eq!(plan.sources[0].path, PathBuf::from("raw_1.mp4"));
    }

    #[test]
    fn test_plan_all_zero_fails_fast() {
        let err = plan_clips(&clips(&[0.0, 0.0]), 5.0).unwrap_err();
        assert!(matches!(err, MediaError::MissingInput(_)));
    }

    #[test]
    fn test_plan_empty_is_missing_input() {
        let err = plan_clips(&[], 5.0).unwrap_err();
        assert!(matches!(err, MediaError::MissingInput(_)));
    }

    #[test]
    fn test_plan_rejects_non_positive_target() {
        assert!(matches!(
            plan_clips(&clips(&[4.0]), 0.0),
            Err(MediaError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_plan_short_clips_long_target() {
        let plan = plan_clips(&clips(&[0.5, 0.4]), 90.0).unwrap();
        assert_eq!(plan.sources.len(), 2);
        assert!(plan.covered() >= 90.0);
        assert!(plan.covered() - 90.0 < 0.5);
        assert!(plan.sequence.len() >= 200);
    }

    #[test]
    fn test_filter_graph_shape() {
        let plan = plan_clips(&clips(&[4.0, 3.0]), 7.0).unwrap();
        let graph = section_filter(
            &plan,
            10.0,
            "Intro: why",
            &EncodingConfig::default(),
            &CaptionStyle::default(),
        );
        assert!(graph.starts_with("[0:v]scale=1920:1080"));
        assert!(graph.contains("[s0_0][s1_0]concat=n=2:v=1:a=0[cat]"));
        assert!(!graph.contains("split"));
        assert!(graph.contains("trim=duration=10.000"));
        assert!(graph.contains("x=60:y=h-text_h-80"));
        assert!(graph.ends_with("[out]"));
    }

    #[test]
    fn test_filter_graph_splits_looped_inputs() {
        let plan = plan_clips(&clips(&[4.0, 3.0]), 10.0).unwrap();
        let graph = section_filter(
            &plan,
            10.0,
            "",
            &EncodingConfig::default(),
            &CaptionStyle::default(),
        );
        assert!(graph.contains(",split=2[s0_0][s0_1];"));
        assert!(graph.contains("[1:v]"));
        assert!(!graph.contains("[2:v]"));
        assert!(graph.contains("[s0_0][s1_0][s0_1]concat=n=3:v=1:a=0[cat]"));
    }

    fn synthesizer(fake: &FakeMedia, dir: &Path) -> SectionClipSynthesizer {
        SectionClipSynthesizer::new(Arc::new(fake.clone()), Arc::new(fake.clone()), dir)
    }

    fn target(index: usize, duration: f64) -> TargetSpec {
        TargetSpec {
            index,
            duration,
            caption: "Why it matters".to_string(),
        }
    }

    #[tokio::test]
    async fn test_synthesize_loops_to_exact_duration() {
        let dir = TempDir::new().unwrap();
        let fake = FakeMedia::new();
        let raw = vec![dir.path().join("a.mp4"), dir.path().join("b.mp4")];
        fake.set_duration(&raw[0], 4.0);
        fake.set_duration(&raw[1], 3.0);

        let clip = synthesizer(&fake, dir.path())
            .synthesize(&raw, &target(1, 10.0))
            .await
            .unwrap();

        assert!((clip.duration - 10.0).abs() <= 1.0 / 24.0);
        assert!(clip.silent);
        assert_eq!((clip.width, clip.height), (1920, 1080));
        assert!(clip.path.exists());

        let commands = fake.commands();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].inputs().len(), 2);
        assert!(commands[0].has_output_flag("-an"));
    }

    #[tokio::test]
    async fn test_synthesize_short_clips_long_target() {
        let dir = TempDir::new().unwrap();
        let fake = FakeMedia::new();
        let raw = vec![dir.path().join("a.mp4"), dir.path().join("b.mp4")];
        fake.set_duration(&raw[0], 0.5);
        fake.set_duration(&raw[1], 0.4);

        let clip = synthesizer(&fake, dir.path())
            .synthesize(&raw, &target(3, 90.0))
            .await
            .unwrap();

        assert!((clip.duration - 90.0).abs() <= 1.0 / 24.0);
        let commands = fake.commands();
        assert_eq!(commands[0].inputs().len(), 2);
        assert_eq!(commands[0].output_duration(), Some(90.0));
    }

    #[tokio::test]
    async fn test_synthesize_three_clips_to_ten_seconds() {
        let dir = TempDir::new().unwrap();
        let fake = FakeMedia::new();
        let raw: Vec<PathBuf> = ["a.mp4", "b.mp4", "c.mp4"]
            .iter()
            .map(|n| dir.path().join(n))
            .collect();
        for (path, d) in raw.iter().zip([4.0, 3.0, 6.0]) {
            fake.set_duration(path, d);
        }

        let clip = synthesizer(&fake, dir.path())
            .synthesize(&raw, &target(0, 10.0))
            .await
            .unwrap();

        assert!((clip.duration - 10.0).abs() <= 1.0 / 24.0);
        assert_eq!(fake.commands()[0].output_duration(), Some(10.0));
    }

    #[tokio::test]
    async fn test_synthesize_all_unprobeable_is_missing_input() {
        let dir = TempDir::new().unwrap();
        let fake = FakeMedia::new();
        let raw = vec![dir.path().join("unknown.mp4")];

        let err = synthesizer(&fake, dir.path())
            .synthesize(&raw, &target(2, 5.0))
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::MissingInput(ref m) if m.contains("section 2")));
        assert!(fake.commands().is_empty());
    }

    #[tokio::test]
    async fn test_synthesize_empty_input() {
        let dir = TempDir::new().unwrap();
        let fake = FakeMedia::new();
        let err = synthesizer(&fake, dir.path())
            .synthesize(&[], &target(0, 5.0))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::MissingInput(_)));
    }

    #[tokio::test]
    async fn test_synthesize_rejects_duration_drift() {
        let dir = TempDir::new().unwrap();
        let fake = FakeMedia::new();
        let raw = vec![dir.path().join("a.mp4")];
        fake.set_duration(&raw[0], 8.0);
        fake.set_output_skew(0.5);

        let err = synthesizer(&fake, dir.path())
            .synthesize(&raw, &target(0, 5.0))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::EncodeFailed { .. }));
    }

    #[tokio::test]
    async fn test_synthesize_encode_failure_is_fatal() {
        let dir = TempDir::new().unwrap();
        let fake = FakeMedia::new();
        let raw = vec![dir.path().join("a.mp4")];
        fake.set_duration(&raw[0], 8.0);
        fake.fail_outputs_containing("section_");

        let err = synthesizer(&fake, dir.path())
            .synthesize(&raw, &target(0, 5.0))
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }
}
