//! Bounded retry with quadratic backoff for the publish step.
//!
//! `Attempting(n)` either succeeds, or on a retryable failure sleeps `n²` units and
//! moves to `Attempting(n + 1)`, until a failure with `n > max_retries` ends the loop.
//! The error from that last attempt is returned as is.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::RetryPolicy;
use crate::errors::Result;

/// Pause between attempts. Swapped out in tests to record delays instead of waiting.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Result of a successful loop: the value and the attempt that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retried<T> {
    pub value: T,
    pub attempts: u32,
}

/// Run `op` until it succeeds, returns a non-retryable error, or exhausts `policy`.
///
/// `op` receives the 1-based attempt number.
pub async fn retry_with_backoff<T, F, Fut, S>(
    policy: &RetryPolicy,
    sleeper: &S,
    mut op: F,
) -> Result<Retried<T>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
    S: Sleeper + ?Sized,
{
    let max_attempts = policy.max_attempts();
    let mut attempt: u32 = 1;
    loop {
        info!(attempt, max_attempts, "Updating service, attempt {attempt} of {max_attempts}");
        match op(attempt).await {
            Ok(value) => {
                info!(attempt, "Attempt succeeded");
                return Ok(Retried {
                    value,
                    attempts: attempt,
                });
            }
            Err(e) if !e.is_retryable() => {
                error!(attempt, error = %e, kind = ?e.kind(), "Non-retryable error, aborting");
                return Err(e);
            }
            Err(e) => {
                if attempt > policy.max_retries {
                    error!(
                        attempt,
                        error = %e,
                        "Connection errors; giving up after {} retries",
                        policy.max_retries
                    );
                    return Err(e);
                }
                let delay = policy.backoff_for(attempt);
                warn!(attempt, error = %e, delay_secs = delay.as_secs(), "Error on attempt {attempt}; retrying");
                sleeper.sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
