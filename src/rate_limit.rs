//! Minimum spacing between successful calls to the generation service.
//!
//! Requests are sequential, so a fixed pause after each real call is enough to
//! stay under a per-minute quota. Skipped items never reach the limiter.

use crate::retry::Sleeper;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub struct RateLimiter {
    min_interval: Duration,
    sleeper: Arc<dyn Sleeper>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            min_interval,
            sleeper,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Pause after a call that reached the service.
    pub async fn wait(&self) {
        if self.min_interval.is_zero() {
            return;
        }
        debug!(
            wait_ms = self.min_interval.as_millis() as u64,
            "Rate limiting before next request"
        );
        self.sleeper.sleep(self.min_interval).await;
    }
}
