//! Sliding window rate limiting, keyed per client.
//!
//! # Responsibilities
//! - Keep, per client key, the timestamps admitted within the trailing window
//! - Reject when the pruned count has reached `max_requests`
//! - Sweep buckets that went idle for a full window
//!
//! # Design Decisions
//! - One coarse mutex over the whole map; the critical section is O(window)
//! - Rejected attempts are not recorded
//! - Callers pass `now` so admission can be driven by a synthetic clock

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;

/// Per-client sliding window admission control.
#[derive(Debug)]
pub struct RateLimiter {
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
    window: Duration,
    max_requests: usize,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            window,
            max_requests,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(Duration::from_secs(config.window_secs), config.max_requests)
    }

    /// Admit or reject a request from `client` at `now`.
    pub fn admit(&self, client: &str, now: Instant) -> bool {
        let mut windows = self.windows.lock().expect("rate limiter mutex poisoned");
        let entries = windows.entry(client.to_string()).or_default();

        while let Some(oldest) = entries.front() {
            if now.saturating_duration_since(*oldest) >= self.window {
                entries.pop_front();
            } else {
                break;
            }
        }

        if entries.len() >= self.max_requests {
            return false;
        }

        entries.push_back(now);
        true
    }

    /// Admit using the current time.
    pub fn check(&self, client: &str) -> bool {
        self.admit(client, Instant::now())
    }

    /// Drop buckets whose newest entry has left the window. Returns the number removed.
    pub fn sweep(&self, now: Instant) -> usize {
        let mut windows = self.windows.lock().expect("rate limiter mutex poisoned");
        let before = windows.len();
        windows.retain(|_, entries| {
            entries
                .back()
                .map(|newest| now.saturating_duration_since(*newest) < self.window)
                .unwrap_or(false)
        });
        before - windows.len()
    }

    /// Number of client buckets currently held.
    pub fn tracked_clients(&self) -> usize {
        self.windows.lock().expect("rate limiter mutex poisoned").len()
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn sixth_request_in_window_is_rejected() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 5);
        let t0 = Instant::now();

        for i in 0..5 {
            assert!(limiter.admit("10.0.0.1", t0 + Duration::from_secs(i)));
        }
        assert!(!limiter.admit("10.0.0.1", t0 + Duration::from_secs(10)));

        // Other clients have their own bucket.
        assert!(limiter.admit("10.0.0.2", t0 + Duration::from_secs(10)));
    }

    #[test]
    fn rejected_attempts_are_not_recorded() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 1);
        let t0 = Instant::now();

        assert!(limiter.admit("c", t0));
        // Hammering while full must not push the reopening time back.
        for i in 1..50 {
            assert!(!limiter.admit("c", t0 + Duration::from_secs(i)));
        }
        assert!(limiter.admit("c", t0 + Duration::from_secs(60)));
    }

    #[test]
    fn window_slides() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 2);
        let t0 = Instant::now();

        assert!(limiter.admit("c", t0));
        assert!(limiter.admit("c", t0 + Duration::from_secs(30)));
        assert!(!limiter.admit("c", t0 + Duration::from_secs(59)));
        // First entry has aged out, second has not.
        assert!(limiter.admit("c", t0 + Duration::from_secs(60)));
        assert!(!limiter.admit("c", t0 + Duration::from_secs(61)));
    }

    #[test]
    fn sweep_removes_idle_buckets() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 5);
        let t0 = Instant::now();

        limiter.admit("idle", t0);
        limiter.admit("busy", t0 + Duration::from_secs(50));
        assert_eq!(limiter.tracked_clients(), 2);

        assert_eq!(limiter.sweep(t0 + Duration::from_secs(70)), 1);
        assert_eq!(limiter.tracked_clients(), 1);
        assert!(limiter.admit("idle", t0 + Duration::from_secs(70)));
    }

    #[test]
    fn never_more_than_max_in_any_trailing_window() {
        let window = Duration::from_millis(1_000);
        let max = 4;
        let mut rng = StdRng::seed_from_u64(0x5eed);

        for _ in 0..20 {
            let limiter = RateLimiter::new(window, max);
            let t0 = Instant::now();
            let mut offset_ms = 0u64;
            let mut admitted: Vec<(usize, u64)> = Vec::new();

            for _ in 0..400 {
                offset_ms += rng.gen_range(0..120);
                let client = rng.gen_range(0..3usize);
                let key = format!("client-{}", client);
                if limiter.admit(&key, t0 + Duration::from_millis(offset_ms)) {
                    admitted.push((client, offset_ms));
                }
            }

            for &(client, at) in &admitted {
                let in_window = admitted
                    .iter()
                    .filter(|&&(c, t)| c == client && t <= at && at - t < window.as_millis() as u64)
                    .count();
                assert!(in_window <= max, "client {} had {} admissions in window ending at {}", client, in_window, at);
            }
        }
    }
}
