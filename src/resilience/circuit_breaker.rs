//! Circuit breaker for backend protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: a failure was seen recently, requests fail fast
//!
//! # State Transitions
//! ```text
//! Closed → Open: any reported failure (timestamp recorded)
//! Open → Closed: first check at or after last_failure + cooldown
//! ```
//!
//! # Design Decisions
//! - No half-open state and no background timer; every check re-evaluates
//!   elapsed time under the lock
//! - Scope is chosen by the owner: the pipeline holds one global breaker,
//!   or each backend holds its own when per-backend scope is configured
//! - With global scope a single failing backend blocks all traffic until
//!   the cooldown elapses

use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Default)]
struct CircuitState {
    open: bool,
    last_failure: Option<Instant>,
}

/// Point-in-time view of a breaker, for logging and the admin API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitStatus {
    Closed,
    Open { remaining: Duration },
}

/// Two-state circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: Mutex<CircuitState>,
    cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            state: Mutex::new(CircuitState::default()),
            cooldown,
        }
    }

    /// Returns true if a request may proceed at `now`.
    ///
    /// An open breaker whose cooldown has elapsed is closed by this call.
    pub fn allow(&self, now: Instant) -> bool {
        let mut state = self.state.lock().expect("circuit breaker mutex poisoned");
        if !state.open {
            return true;
        }
        let elapsed = state
            .last_failure
            .map(|at| now.saturating_duration_since(at))
            .unwrap_or(self.cooldown);
        if elapsed >= self.cooldown {
            state.open = false;
            tracing::info!(cooldown = ?self.cooldown, "Circuit closed after cooldown");
            true
        } else {
            false
        }
    }

    /// Record a failure at `now`, opening the breaker.
    pub fn report_failure(&self, now: Instant) {
        let mut state = self.state.lock().expect("circuit breaker mutex poisoned");
        if !state.open {
            tracing::warn!(cooldown = ?self.cooldown, "Circuit opened");
        }
        state.open = true;
        state.last_failure = Some(now);
    }

    /// Inspect the breaker without transitioning it.
    pub fn status(&self, now: Instant) -> CircuitStatus {
        let state = self.state.lock().expect("circuit breaker mutex poisoned");
        match (state.open, state.last_failure) {
            (true, Some(at)) => {
                let elapsed = now.saturating_duration_since(at);
                if elapsed >= self.cooldown {
                    CircuitStatus::Closed
                } else {
                    CircuitStatus::Open { remaining: self.cooldown - elapsed }
                }
            }
            _ => CircuitStatus::Closed,
        }
    }

    /// Force the breaker closed.
    pub fn reset(&self) {
        let mut state = self.state.lock().expect("circuit breaker mutex poisoned");
        state.open = false;
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }
}
