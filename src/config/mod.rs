//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + environment (PORT, BACKEND_SERVERS, SHUTDOWN_TIMEOUT)
//!     → loader.rs (parse, deserialize, apply overrides)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared with the pipeline components at construction
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server applies the new backend list
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - An empty backend list is fatal at startup

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::GatewayConfig;
pub use schema::{
    AdminConfig, CacheConfig, CacheKeyConfig, CircuitBreakerConfig, CircuitScope,
    HealthCheckConfig, ListenerConfig, ObservabilityConfig, RateLimitConfig, RetryConfig,
    RetryOn, TimeoutConfig,
};
