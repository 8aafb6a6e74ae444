//! API gateway library: the request pipeline and the server around it.

pub mod admin;
pub mod cache;
pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod pipeline;
pub mod resilience;
pub mod security;

pub use config::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
pub use pipeline::RequestPipeline;
