//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Request admitted
//!     → pool.rs (current backend list snapshot)
//!     → round_robin.rs (rotate from the shared counter, skip ineligible)
//!     → backend.rs (liveness flag maintained by the health monitor)
//!     → Return backend or nothing (caller surfaces 503)
//! ```
//!
//! # Design Decisions
//! - Counter increment is a lock-free atomic
//! - Liveness flags are independent per-backend atomics
//! - At most one full scan per selection

use std::sync::Arc;

pub mod backend;
pub mod pool;
pub mod round_robin;

pub use backend::Backend;
pub use pool::BackendSelector;

/// A strategy for picking the next backend.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    /// Pick a backend for which `eligible` holds, or None.
    fn next_server(
        &self,
        backends: &[Arc<Backend>],
        eligible: &dyn Fn(&Backend) -> bool,
    ) -> Option<Arc<Backend>>;
}
