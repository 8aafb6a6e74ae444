//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Backend list must be non-empty and every address a usable http(s) URL
//! - Validate value ranges (windows, TTLs, timeouts > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::{GatewayConfig, PLACEHOLDER_ADMIN_KEY};

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no backend servers configured")]
    NoBackends,

    #[error("invalid backend address '{address}': {reason}")]
    InvalidBackend { address: String, reason: String },

    #[error("duplicate backend address '{0}'")]
    DuplicateBackend(String),

    #[error("invalid bind address '{0}'")]
    InvalidBindAddress(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("admin.api_key must be set to a real secret when the admin API is enabled")]
    WeakAdminKey,
}

/// Parse a backend address into a base URL.
///
/// Bare `host:port` entries are accepted and treated as plain HTTP, which
/// matches how the comma-separated `BACKEND_SERVERS` list is usually written.
pub fn parse_backend_url(address: &str) -> Result<Url, ValidationError> {
    let trimmed = address.trim();
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    let url = Url::parse(&candidate).map_err(|e| ValidationError::InvalidBackend {
        address: address.to_string(),
        reason: e.to_string(),
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ValidationError::InvalidBackend {
            address: address.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    if url.host_str().is_none() {
        return Err(ValidationError::InvalidBackend {
            address: address.to_string(),
            reason: "missing host".to_string(),
        });
    }
    Ok(url)
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.backends.is_empty() {
        errors.push(ValidationError::NoBackends);
    }

    let mut seen = Vec::new();
    for address in &config.backends {
        match parse_backend_url(address) {
            Ok(url) => {
                if seen.contains(&url) {
                    errors.push(ValidationError::DuplicateBackend(address.clone()));
                } else {
                    seen.push(url);
                }
            }
            Err(e) => errors.push(e),
        }
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(config.listener.bind_address.clone()));
    }
    if config.admin.enabled {
        if config.admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidBindAddress(config.admin.bind_address.clone()));
        }
        let key = config.admin.api_key.trim();
        if key.is_empty() || key == PLACEHOLDER_ADMIN_KEY {
            errors.push(ValidationError::WeakAdminKey);
        }
    }

    let ranges: [(&'static str, u64); 7] = [
        ("rate_limit.window_secs", config.rate_limit.window_secs),
        ("rate_limit.max_requests", config.rate_limit.max_requests as u64),
        ("rate_limit.sweep_interval_secs", config.rate_limit.sweep_interval_secs),
        ("cache.ttl_secs", config.cache.ttl_secs),
        ("timeouts.attempt_ms", config.timeouts.attempt_ms),
        ("health_check.interval_secs", config.health_check.interval_secs),
        ("health_check.timeout_secs", config.health_check.timeout_secs),
    ];
    for (field, value) in ranges {
        if value == 0 {
            errors.push(ValidationError::Zero(field));
        }
    }
    if config.retries.enabled && config.retries.max_attempts == 0 {
        errors.push(ValidationError::Zero("retries.max_attempts"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
