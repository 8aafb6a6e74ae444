//! Response caching subsystem.
//!
//! # Data Flow
//! ```text
//! Request after backend selection
//!     → key.rs (derive key from path, optionally method and headers)
//!     → store.rs lookup: hit  → 200 with cached body, backend untouched
//!                        miss → forward, then store if status is 200
//! ```

pub mod key;
pub mod store;

pub use key::KeyStrategy;
pub use store::ResponseCache;
