//! Render-and-publish orchestration.
//!
//! A run is strictly sequential: the thumbnail, every section clip, the
//! final assembly, then the upload. A render that fails leaves nothing in
//! the output directory.

use std::path::Path;
use std::sync::Arc;

use tracing::Instrument;

use nexus_media::fs_utils::remove_if_exists;
use nexus_media::{
    CaptionStyle, DurationProbe, FfmpegRunner, FfprobeDurationProbe, FinalAssembler, MediaError,
    SectionClipSynthesizer, SlateGenerator, ThumbnailCompositor, Transcoder,
};
use nexus_models::{
    FinalVideo, RunId, Script, SectionClip, TargetSpec, Thumbnail, VideoMetadata,
};
use nexus_publish::{UploadOutcome, UploadTransport};

use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::inputs::RenderRequest;
use crate::logging::RunLogger;
use crate::workspace::RunWorkspace;

/// Artifacts of a finished render.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub run_id: RunId,
    pub video: FinalVideo,
    pub thumbnail: Thumbnail,
    pub section_count: usize,
}

/// Result of a full run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub render: RenderOutput,
    /// `None` when the upload was skipped
    pub upload: Option<UploadOutcome>,
}

pub struct Pipeline {
    config: PipelineConfig,
    transcoder: Arc<dyn Transcoder>,
    probe: Arc<dyn DurationProbe>,
    thumbnails: ThumbnailCompositor,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        transcoder: Arc<dyn Transcoder>,
        probe: Arc<dyn DurationProbe>,
    ) -> Self {
        let thumbnails = ThumbnailCompositor::new(config.font_file.as_deref());
        Self {
            config,
            transcoder,
            probe,
            thumbnails,
        }
    }

    /// Pipeline backed by the ffmpeg and ffprobe binaries.
    pub fn from_config(config: PipelineConfig) -> Self {
        let mut runner = FfmpegRunner::new();
        if let Some(secs) = config.ffmpeg_timeout_secs {
            runner = runner.with_timeout(secs);
        }
        Self::new(config, Arc::new(runner), Arc::new(FfprobeDurationProbe))
    }

    pub fn with_thumbnails(mut self, thumbnails: ThumbnailCompositor) -> Self {
        self.thumbnails = thumbnails;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn section_style(&self) -> CaptionStyle {
        CaptionStyle::default().with_font_file(self.config.font_file.clone())
    }

    fn slate_style(&self) -> CaptionStyle {
        CaptionStyle::slate().with_font_file(self.config.font_file.clone())
    }

    /// Render the final video and thumbnail for `request`.
    pub async fn render(&self, request: &RenderRequest) -> PipelineResult<RenderOutput> {
        let run_id = RunId::new();
        let logger = RunLogger::new(&run_id, "render");
        self.render_run(&run_id, &logger, request)
            .instrument(logger.span())
            .await
            .inspect_err(|e| logger.failed(&e.to_string()))
    }

    /// Render, then upload when a transport is given.
    pub async fn run(
        &self,
        request: &RenderRequest,
        transport: Option<&UploadTransport>,
    ) -> PipelineResult<RunReport> {
        let render = self.render(request).await?;

        let upload = match transport {
            Some(transport) => Some(
                self.publish(
                    &render.run_id,
                    transport,
                    &request.script,
                    &render.video.path,
                    Some(&render.thumbnail.path),
                )
                .await?,
            ),
            None => {
                RunLogger::new(&render.run_id, "upload").progress("Upload skipped");
                None
            }
        };

        Ok(RunReport { render, upload })
    }

    async fn render_run(
        &self,
        run_id: &RunId,
        logger: &RunLogger,
        request: &RenderRequest,
    ) -> PipelineResult<RenderOutput> {
        let targets = request.script.target_specs();

        if targets.is_empty() {
            return Err(MediaError::missing_input("script has no sections").into());
        }
        if let Some(bare) = targets
            .iter()
            .find(|t| request.footage.clips_for(t.index).is_empty())
        {
            return Err(MediaError::missing_input(format!(
                "section {} has no raw footage",
                bare.index
            ))
            .into());
        }

        logger.start(&format!(
            "{} sections for \"{}\"",
            targets.len(),
            request.script.display_title()
        ));

        let stem = run_id.short();
        let thumb_path = self.config.output_dir.join(format!("{}_thumbnail.jpg", stem));
        let thumbnail = self.thumbnail(&request.script, &thumb_path)?;

        let video_path = self.config.output_dir.join(format!("{}_final.mp4", stem));
        let rendered = self
            .render_video(run_id, logger, request, &targets, &video_path)
            .await;
        let (video, section_count) = match rendered {
            Ok(done) => done,
            Err(e) => {
                remove_if_exists(&thumbnail.path).await;
                return Err(e);
            }
        };

        logger.finished(&format!(
            "{} ({:.2}s) and {}",
            video.path.display(),
            video.duration,
            thumbnail.path.display()
        ));

        Ok(RenderOutput {
            run_id: run_id.clone(),
            video,
            thumbnail,
            section_count,
        })
    }

    /// Render every section and assemble them into `video_path`.
    async fn render_video(
        &self,
        run_id: &RunId,
        logger: &RunLogger,
        request: &RenderRequest,
        targets: &[TargetSpec],
        video_path: &Path,
    ) -> PipelineResult<(FinalVideo, usize)> {
        let workspace = RunWorkspace::create(&self.config.work_dir, run_id)?;

        let synthesizer = SectionClipSynthesizer::new(
            Arc::clone(&self.transcoder),
            Arc::clone(&self.probe),
            workspace.sections_dir(),
        )
        .with_style(self.section_style());

        let mut sections: Vec<SectionClip> = Vec::with_capacity(targets.len());
        for target in targets {
            let clip = synthesizer
                .synthesize(request.footage.clips_for(target.index), target)
                .await?;
            logger.progress(&format!(
                "Section {}/{} rendered ({:.2}s)",
                target.index + 1,
                targets.len(),
                clip.duration
            ));
            sections.push(clip);
        }

        let assembler = FinalAssembler::new(
            Arc::clone(&self.transcoder),
            Arc::clone(&self.probe),
            self.config.channel_name.clone(),
            workspace.path(),
        )
        .with_slates(SlateGenerator::new(Arc::clone(&self.transcoder)).with_style(self.slate_style()));

        let video = assembler
            .assemble(&sections, &request.audio, &request.script, video_path)
            .await?;
        Ok((video, sections.len()))
    }

    /// Composite the title thumbnail for `script` into `output`.
    pub fn thumbnail(&self, script: &Script, output: &Path) -> PipelineResult<Thumbnail> {
        Ok(self.thumbnails.compose(script, output)?)
    }

    /// Upload `video` with metadata derived from `script`.
    pub async fn publish(
        &self,
        run_id: &RunId,
        transport: &UploadTransport,
        script: &Script,
        video: &Path,
        thumbnail: Option<&Path>,
    ) -> PipelineResult<UploadOutcome> {
        let logger = RunLogger::new(run_id, "upload");
        let upload = transport.config();
        let metadata = VideoMetadata::from_script(script)
            .with_privacy(upload.privacy)
            .with_category(upload.category_id.clone());

        logger.start(&format!("\"{}\" as {}", metadata.title, metadata.privacy));

        let outcome = transport
            .upload(video, &metadata, thumbnail)
            .instrument(logger.span())
            .await
            .inspect_err(|e| logger.failed(&e.to_string()))?;

        if let nexus_publish::ThumbnailStatus::Failed(reason) = &outcome.thumbnail {
            logger.warning(&format!("Thumbnail not attached: {}", reason));
        }
        logger.finished(&outcome.watch_url);
        Ok(outcome)
    }
}
