//! Per-run scratch directory.
//!
//! Section clips and assembly intermediates live under one temporary
//! directory that is removed when the workspace drops, whether the run
//! succeeded or not.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use nexus_models::RunId;

use crate::error::PipelineResult;

pub struct RunWorkspace {
    dir: TempDir,
}

impl RunWorkspace {
    /// Create a fresh scratch directory under `root`.
    pub fn create(root: &Path, run_id: &RunId) -> PipelineResult<Self> {
        std::fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("run_{}_", run_id.short()))
            .tempdir_in(root)?;
        std::fs::create_dir_all(dir.path().join("sections"))?;

        debug!(run_id = %run_id, path = %dir.path().display(), "Created run workspace");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn sections_dir(&self) -> PathBuf {
        self.dir.path().join("sections")
    }
}
