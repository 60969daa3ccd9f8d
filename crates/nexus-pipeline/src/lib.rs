//! Nexus render-and-publish pipeline.
//!
//! Turns a script, raw footage and narration into a final video and
//! thumbnail, then uploads them.

pub mod config;
pub mod error;
pub mod inputs;
pub mod logging;
pub mod pipeline;
pub mod workspace;

pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use inputs::{load_footage, load_script, RenderRequest};
pub use logging::RunLogger;
pub use pipeline::{Pipeline, RenderOutput, RunReport};
pub use workspace::RunWorkspace;
