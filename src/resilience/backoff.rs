//! Fixed backoff between retry attempts.

use std::time::Duration;

/// Constant delay inserted between attempts. No growth, no jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedBackoff {
    delay: Duration,
}

impl FixedBackoff {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    /// Delay to wait after attempt number `attempt` (1-based) has failed.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        self.delay
    }

    /// Sleep for the backoff following `attempt`.
    pub async fn wait(&self, attempt: u32) {
        let delay = self.delay_after(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_is_constant() {
        let backoff = FixedBackoff::from_millis(2000);
        assert_eq!(backoff.delay_after(0), Duration::ZERO);
        assert_eq!(backoff.delay_after(1), Duration::from_secs(2));
        assert_eq!(backoff.delay_after(2), Duration::from_secs(2));
        assert_eq!(backoff.delay_after(10), Duration::from_secs(2));
    }
}
