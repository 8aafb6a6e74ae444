//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request admitted:
//!     → circuit_breaker.rs (fast-fail while open)
//!     → retries.rs (drive attempts, fixed backoff.rs delay between them)
//!         → timeouts.rs (every attempt has a deadline)
//!         → failures reported back to circuit_breaker.rs
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every backend call has a deadline
//! - Which failures are retried is configuration, not guesswork
//! - Circuit breaker prevents cascading failures

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{CircuitBreaker, CircuitStatus};
pub use retries::{AttemptResult, RetryError, RetryOrchestrator};
pub use timeouts::{AttemptTimeout, DeadlineElapsed};
