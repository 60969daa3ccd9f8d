//! Structured run logging.
//!
//! A `RunLogger` owns one span per pipeline stage. The run id and stage live
//! on the span, so every event below it (including those emitted by the
//! media and publish crates while the stage future is instrumented) carries
//! them without repeating the fields.

use std::time::Instant;

use tracing::{error, info, info_span, warn, Span};

use nexus_models::RunId;

#[derive(Debug, Clone)]
pub struct RunLogger {
    span: Span,
    started: Instant,
}

impl RunLogger {
    pub fn new(run_id: &RunId, stage: &'static str) -> Self {
        Self {
            span: info_span!("run", run_id = %run_id, stage),
            started: Instant::now(),
        }
    }

    /// Span to instrument the stage's futures with.
    pub fn span(&self) -> Span {
        self.span.clone()
    }

    pub fn start(&self, message: &str) {
        info!(parent: &self.span, "Started: {}", message);
    }

    pub fn progress(&self, message: &str) {
        info!(parent: &self.span, "{}", message);
    }

    pub fn warning(&self, message: &str) {
        warn!(parent: &self.span, "{}", message);
    }

    pub fn failed(&self, message: &str) {
        error!(
            parent: &self.span,
            elapsed_ms = self.elapsed_ms(),
            "Failed: {}",
            message
        );
    }

    pub fn finished(&self, message: &str) {
        info!(
            parent: &self.span,
            elapsed_ms = self.elapsed_ms(),
            "Finished: {}",
            message
        );
    }

    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_carries_run_fields() {
        let subscriber = tracing_subscriber::registry();
        tracing::subscriber::with_default(subscriber, || {
            let logger = RunLogger::new(&RunId::from_string("run-123"), "render");
            let span = logger.span();

            let meta = span.metadata().expect("span enabled");
            assert_eq!(meta.name(), "run");
            assert!(span.field("run_id").is_some());
            assert!(span.field("stage").is_some());

            logger.start("2 sections");
            logger.finished("done");
        });
    }
}
