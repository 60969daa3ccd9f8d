//! Backoff schedule and the sleep seam the transport waits through.

use std::time::Duration;

use async_trait::async_trait;

/// Waits between retries.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, delay: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Exponential backoff: retry `n` waits `base^n` seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    base: f64,
}

impl Backoff {
    pub fn new(base: f64) -> Self {
        Self { base }
    }

    /// Delay before retry `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        Duration::try_from_secs_f64(self.base.powi(exponent)).unwrap_or(Duration::MAX)
    }
}
