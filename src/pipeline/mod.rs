//! Request processing pipeline.
//!
//! # Data Flow
//! ```text
//! http::server (axum handler)
//!     → types.rs  (GatewayRequest, body buffered)
//!     → chain.rs  (rate limit → circuit → select → cache → retry → forward)
//!     → forward.rs (one attempt against one backend)
//!     → types.rs  (GatewayResponse) or error.rs (PipelineError)
//!     → http::response (status mapping)
//! ```

pub mod chain;
pub mod error;
pub mod forward;
pub mod types;

pub use chain::{CircuitMode, RequestPipeline};
pub use error::PipelineError;
pub use forward::{ForwardError, Forwarder, HttpForwarder};
pub use types::{GatewayRequest, GatewayResponse, X_CACHE};
