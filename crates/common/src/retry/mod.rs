use std::{fmt::Display, future::Future, time::Duration};

use bifrost_tasks::ShutdownSignal;
use tracing::{error, warn};

pub mod policies;

/// Tells the retry loop whether an error is worth another attempt.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Bounds on a retry loop. Whichever is hit first ends it.
#[derive(Debug, Clone, Copy)]
pub struct RetryLimits {
    /// Total number of attempts, including the first one.
    pub max_attempts: u16,

    /// Upper bound on the accumulated backoff sleeps.
    pub max_elapsed: Duration,
}

impl Default for RetryLimits {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            max_elapsed: Duration::from_secs(15 * 60),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    #[error("{0}")]
    Permanent(E),

    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u16, last: E },

    #[error("interrupted by shutdown")]
    Shutdown,
}

impl<E> RetryError<E> {
    /// Returns the last error the operation produced, if any.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Permanent(e) | Self::Exhausted { last: e, .. } => Some(e),
            Self::Shutdown => None,
        }
    }
}

/// Runs a fallible async operation with a backoff retry.
///
/// Retries the given `operation` while it fails with a retryable error, with
/// delays increasing according to `backoff`, until `limits` are hit. Both the
/// operation and the sleeps are abandoned as soon as `shutdown` fires.
///
/// Logs a warning on each failure and an error if all retries are exhausted.
pub async fn retry_with_backoff<R, E, F, Fut>(
    name: &str,
    limits: RetryLimits,
    backoff: &impl Backoff,
    shutdown: &ShutdownSignal,
    operation: F,
) -> Result<R, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<R, E>>,
    E: Retryable + Display,
{
    retry_with_backoff_inner(name, limits, backoff, shutdown, operation, tokio::time::sleep).await
}

/// Inner method that actually does the retry which is generic on the sleep function.
async fn retry_with_backoff_inner<R, E, F, Fut, S, SFut>(
    name: &str,
    limits: RetryLimits,
    backoff: &impl Backoff,
    shutdown: &ShutdownSignal,
    mut operation: F,
    mut sleep_fn: S,
) -> Result<R, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<R, E>>,
    E: Retryable + Display,
    S: FnMut(Duration) -> SFut,
    SFut: Future<Output = ()>,
{
    let max_attempts = limits.max_attempts.max(1);
    let mut delay = backoff.base_delay_ms();
    let mut slept = Duration::ZERO;
    let mut attempt: u16 = 0;

    loop {
        if shutdown.should_shutdown() {
            return Err(RetryError::Shutdown);
        }
        attempt += 1;

        let res = tokio::select! {
            _ = shutdown.wait_for_shutdown() => return Err(RetryError::Shutdown),
            res = operation() => res,
        };

        let err = match res {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_retryable() => return Err(RetryError::Permanent(err)),
            Err(err) => err,
        };

        let wait = Duration::from_millis(delay);
        if attempt >= max_attempts || slept + wait > limits.max_elapsed {
            error!(%name, %attempt, %err, "max retries exceeded, returning with the last error");
            return Err(RetryError::Exhausted {
                attempts: attempt,
                last: err,
            });
        }

        warn!(%name, %attempt, %err, delay_ms = %delay, "attempt failed, retrying");
        tokio::select! {
            _ = shutdown.wait_for_shutdown() => return Err(RetryError::Shutdown),
            _ = sleep_fn(wait) => {}
        }
        slept += wait;
        delay = backoff.next_delay_ms(delay);
    }
}

pub trait Backoff {
    /// Base delay in ms.
    fn base_delay_ms(&self) -> u64;

    /// Generates next delay given current delay.
    fn next_delay_ms(&self, curr_delay_ms: u64) -> u64;
}
