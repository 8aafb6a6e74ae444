//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound each forwarding attempt with a deadline
//! - Cancel the in-flight call when the deadline passes
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; dropping the timed-out future drops
//!   the backend connection it owned
//! - Timeout errors are distinct from transport errors

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// The deadline for an attempt elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("deadline of {0:?} elapsed")]
pub struct DeadlineElapsed(pub Duration);

/// Per-attempt deadline.
#[derive(Debug, Clone, Copy)]
pub struct AttemptTimeout {
    limit: Duration,
}

impl AttemptTimeout {
    pub fn new(limit: Duration) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }

    /// Run `fut`, cancelling it if it outlives the deadline.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, DeadlineElapsed> {
        tokio::time::timeout(self.limit, fut)
            .await
            .map_err(|_| DeadlineElapsed(self.limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn fast_future_completes() {
        let timeout = AttemptTimeout::new(Duration::from_secs(5));
        let out = timeout.run(async { 7 }).await;
        assert_eq!(out, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_future_is_cancelled() {
        struct SetOnDrop(Arc<AtomicBool>);
        impl Drop for SetOnDrop {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let dropped = Arc::new(AtomicBool::new(false));
        let guard = SetOnDrop(dropped.clone());
        let timeout = AttemptTimeout::new(Duration::from_secs(5));

        let out = timeout
            .run(async move {
                let _guard = guard;
                tokio::time::sleep(Duration::from_secs(60)).await;
            })
            .await;

        assert_eq!(out, Err(DeadlineElapsed(Duration::from_secs(5))));
        assert!(dropped.load(Ordering::SeqCst), "in-flight work must be released");
    }
}
