//! In-memory stand-ins for the transcoder and probe.
//!
//! `FakeMedia` writes a placeholder file for every command it "runs" and
//! remembers the duration that command would have produced, so later probes
//! of that output see a consistent value.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::command::{FfmpegCommand, Transcoder};
use crate::error::{MediaError, MediaResult};
use crate::probe::DurationProbe;

#[derive(Debug, Default)]
struct FakeState {
    durations: HashMap<PathBuf, f64>,
    commands: Vec<FfmpegCommand>,
    fail_outputs_containing: Option<String>,
    output_skew: f64,
}

/// Shared fake implementing both `Transcoder` and `DurationProbe`.
#[derive(Debug, Clone, Default)]
pub struct FakeMedia {
    state: Arc<Mutex<FakeState>>,
}

impl FakeMedia {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake media state poisoned")
    }

    /// Register the duration a probe of `path` reports.
    pub fn set_duration(&self, path: impl Into<PathBuf>, seconds: f64) {
        self.state().durations.insert(path.into(), seconds);
    }

    /// Fail every command whose output path contains `needle`.
    pub fn fail_outputs_containing(&self, needle: impl Into<String>) {
        self.state().fail_outputs_containing = Some(needle.into());
    }

    /// Add `seconds` to every produced output, simulating a sloppy encoder.
    pub fn set_output_skew(&self, seconds: f64) {
        self.state().output_skew = seconds;
    }

    /// Commands run so far, in order.
    pub fn commands(&self) -> Vec<FfmpegCommand> {
        self.state().commands.clone()
    }

    pub fn duration_of(&self, path: &Path) -> Option<f64> {
        self.state().durations.get(path).copied()
    }
}

#[async_trait]
impl Transcoder for FakeMedia {
    async fn transcode(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        let output = cmd.output().to_path_buf();
        let produced = {
            let mut state = self.state();
            state.commands.push(cmd.clone());

            if let Some(needle) = &state.fail_outputs_containing {
                if output.to_string_lossy().contains(needle.as_str()) {
                    return Err(MediaError::encode_failed(
                        format!("fake failure writing {}", output.display()),
                        Some("simulated".to_string()),
                        Some(1),
                    ));
                }
            }

            let from_inputs = cmd
                .inputs()
                .iter()
                .filter_map(|i| state.durations.get(Path::new(&i.source)).copied())
                .fold(0.0_f64, f64::max);
            let produced = cmd.output_duration().unwrap_or(from_inputs) + state.output_skew;
            state.durations.insert(output.clone(), produced);
            produced
        };

        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&output, format!("fake media {:.3}s", produced)).await?;
        Ok(())
    }
}

#[async_trait]
impl DurationProbe for FakeMedia {
    async fn duration(&self, path: &Path) -> f64 {
        self.duration_of(path).unwrap_or(0.0)
    }
}
