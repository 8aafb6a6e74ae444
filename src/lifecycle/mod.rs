//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → every subscribed task stops
//!             → gateway listener drains, bounded by the grace period
//! ```
//!
//! # Design Decisions
//! - One broadcast channel; each long-running task holds a receiver
//! - Shutdown has a deadline: connections still open after the grace
//!   period are dropped

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
