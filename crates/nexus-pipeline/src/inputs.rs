//! Loading collaborator inputs from disk.

use std::path::{Path, PathBuf};

use nexus_models::{FootageManifest, Script};

use crate::error::{PipelineError, PipelineResult};

/// Everything the render stage consumes.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub script: Script,
    pub audio: PathBuf,
    pub footage: FootageManifest,
}

impl RenderRequest {
    /// Load a script and footage manifest. Relative clip paths resolve
    /// against the manifest's directory.
    pub fn load(script: &Path, audio: &Path, footage: &Path) -> PipelineResult<Self> {
        let script = load_script(script)?;
        let footage = load_footage(footage)?;
        Ok(Self {
            script,
            audio: audio.to_path_buf(),
            footage,
        })
    }
}

pub fn load_script(path: &Path) -> PipelineResult<Script> {
    let text = std::fs::read_to_string(path).map_err(|e| PipelineError::input_load(path, e))?;
    Script::from_json(&text).map_err(|e| PipelineError::input_load(path, e))
}

pub fn load_footage(path: &Path) -> PipelineResult<FootageManifest> {
    let text = std::fs::read_to_string(path).map_err(|e| PipelineError::input_load(path, e))?;
    let manifest =
        FootageManifest::from_json(&text).map_err(|e| PipelineError::input_load(path, e))?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    Ok(manifest.resolve_relative_to(base))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_request() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("script.json");
        let footage = dir.path().join("footage.json");
        std::fs::write(
            &script,
            r#"{"title":"Deep Sea","hook":"Down we go.","sections":[{"title":"Trenches","content":"Dark."}],"cta":"Subscribe"}"#,
        )
        .unwrap();
        std::fs::write(&footage, r#"{"0": ["clips/a.mp4", "/abs/b.mp4"]}"#).unwrap();

        let request = RenderRequest::load(&script, Path::new("narration.mp3"), &footage).unwrap();

        assert_eq!(request.script.sections.len(), 1);
        assert_eq!(
            request.footage.clips_for(0),
            &[dir.path().join("clips/a.mp4"), PathBuf::from("/abs/b.mp4")]
        );
    }

    #[test]
    fn test_malformed_script_names_the_file() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("script.json");
        std::fs::write(&script, "{not json").unwrap();

        let err = load_script(&script).unwrap_err();
        assert!(matches!(err, PipelineError::InputLoad { ref path, .. } if path == &script));
    }
}
