//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Probe every backend concurrently (bounded timeout)
//!     → Write each backend's liveness flag
//! ```
//!
//! # Design Decisions
//! - One probe decides: a single failure marks the backend unhealthy, the
//!   next successful cycle brings it back
//! - Probes are independent; a slow backend does not delay the others
//! - The monitor is the only writer of liveness flags

pub mod active;

pub use active::HealthMonitor;
