//! Retry orchestration.
//!
//! # Responsibilities
//! - Drive a wrapped operation up to `max_attempts` times
//! - Wait a fixed backoff between attempts
//! - Classify failures explicitly through `RetryOn`
//!
//! # Design Decisions
//! - The wrapped operation reports its own outcome; nothing is assumed to
//!   have succeeded
//! - Aborting outcomes end the loop immediately and are returned as-is
//! - An attempt that cannot be made at all ends the loop as exhausted when an
//!   earlier attempt already failed, carrying that earlier failure
//! - After the last attempt no backoff is taken

use std::future::Future;

use crate::config::{RetryConfig, RetryOn};
use crate::resilience::backoff::FixedBackoff;

/// Outcome of a single attempt.
#[derive(Debug)]
pub enum AttemptResult<T, E> {
    /// The attempt succeeded.
    Success(T),
    /// The attempt failed in a way that may be retried.
    Retryable(E),
    /// The attempt failed terminally; do not retry.
    Abort(E),
    /// No attempt could be made (e.g. nothing left to send it to).
    Unavailable(E),
}

/// Terminal result of the retry loop when no attempt succeeded.
#[derive(Debug, PartialEq, Eq)]
pub enum RetryError<E> {
    /// Every attempt failed; carries the last failure.
    Exhausted { attempts: u32, last: E },
    /// An attempt reported a terminal failure.
    Aborted(E),
}

/// Retry policy derived from configuration.
#[derive(Debug, Clone)]
pub struct RetryOrchestrator {
    max_attempts: u32,
    backoff: FixedBackoff,
    retry_on: Vec<RetryOn>,
}

impl RetryOrchestrator {
    pub fn new(max_attempts: u32, backoff: FixedBackoff, retry_on: Vec<RetryOn>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
            retry_on,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.effective_attempts(),
            FixedBackoff::from_millis(config.backoff_ms),
            config.retry_on.clone(),
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether a failure of the given class should trigger another attempt.
    pub fn retries_on(&self, class: RetryOn) -> bool {
        self.retry_on.contains(&class)
    }

    /// Run `op` until it succeeds, aborts, or every attempt is used.
    ///
    /// `op` receives the 1-based attempt number.
    pub async fn execute<T, E, F, Fut>(&self, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = AttemptResult<T, E>>,
    {
        let mut attempt = 1;
        let mut previous = None;
        loop {
            match op(attempt).await {
                AttemptResult::Success(value) => return Ok(value),
                AttemptResult::Abort(err) => return Err(RetryError::Aborted(err)),
                AttemptResult::Unavailable(err) => {
                    return Err(match previous.take() {
                        Some(last) => RetryError::Exhausted {
                            attempts: attempt - 1,
                            last,
                        },
                        None => RetryError::Aborted(err),
                    });
                }
                AttemptResult::Retryable(err) => {
                    if attempt >= self.max_attempts {
                        return Err(RetryError::Exhausted { attempts: attempt, last: err });
                    }
                    let delay = self.backoff.delay_after(attempt);
                    tracing::info!(attempt, delay = ?delay, "Retrying after failed attempt");
                    crate::observability::metrics::record_retry();
                    self.backoff.wait(attempt).await;
                    previous = Some(err);
                    attempt += 1;
                }
            }
        }
    }
}
