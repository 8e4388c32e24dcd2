//! Bounded retry with classification-dependent backoff.
//!
//! Rate-limit responses back off exponentially from the request delay; every
//! other failure backs off linearly. There is never a wait after the last attempt.

use crate::error::{ErrorClass, ServiceError};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Source of delays. Production code sleeps on the tokio timer; tests record.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. At least 1.
    pub max_attempts: u32,
    /// Seed for exponential backoff after a rate-limit response.
    pub rate_limit_base: Duration,
    /// Unit for linear backoff after any other failure.
    pub linear_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            rate_limit_base: Duration::from_secs(15),
            linear_unit: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Wait before the attempt following failed attempt `attempt` (1-based).
    pub fn backoff(&self, class: ErrorClass, attempt: u32) -> Duration {
        match class {
            ErrorClass::RateLimited => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                self.rate_limit_base.saturating_mul(factor)
            }
            ErrorClass::TransientHttp | ErrorClass::Other => {
                self.linear_unit.saturating_mul(attempt)
            }
        }
    }
}

/// Run `op` until it succeeds or `policy.max_attempts` calls have failed.
///
/// `op` receives the 1-based attempt number. The returned error is the last
/// attempt's, stamped with that attempt number.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    mut op: F,
) -> Result<T, ServiceError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let err = err.with_attempt(attempt);
                if attempt >= max_attempts {
                    return Err(err);
                }
                let wait = policy.backoff(err.class(), attempt);
                warn!(
                    attempt,
                    max_attempts,
                    wait_ms = wait.as_millis() as u64,
                    error = %err,
                    "Service call failed, retrying"
                );
                sleeper.sleep(wait).await;
                attempt += 1;
            }
        }
    }
}
