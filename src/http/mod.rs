//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum setup, middleware, graceful shutdown)
//!     → request.rs (request ID, buffer into GatewayRequest)
//!     → pipeline::RequestPipeline
//!     → response.rs (GatewayResponse / PipelineError → HTTP)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::{AppState, GatewayServer};
