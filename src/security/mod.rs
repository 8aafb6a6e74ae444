//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per-client sliding window admission)
//!     → pipeline
//!     → headers.rs (strip hop-by-hop, add X-Forwarded-For) before forwarding
//! ```
//!
//! # Design Decisions
//! - Fail closed: a rejected request never reaches a backend
//! - No trust in client input

pub mod headers;
pub mod rate_limit;

pub use rate_limit::RateLimiter;
