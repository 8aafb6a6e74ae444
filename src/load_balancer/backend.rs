//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single backend server by its base URL
//! - Hold the liveness flag written by the health monitor
//! - Record when the backend was last probed
//! - Own the backend's breaker when per-backend circuit scope is used

use axum::http::uri::{InvalidUri, Uri};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use url::Url;

use crate::resilience::CircuitBreaker;

/// A single backend server.
#[derive(Debug)]
pub struct Backend {
    /// Address as configured (used as the identity for add/remove).
    address: String,
    /// Parsed base URL, without a trailing slash when rendered.
    base_url: Url,
    /// Liveness flag. Backends start healthy.
    healthy: AtomicBool,
    /// Unix millis of the last probe, 0 if never probed.
    last_checked_ms: AtomicU64,
    /// Breaker consulted only under per-backend circuit scope.
    circuit: CircuitBreaker,
}

impl Backend {
    /// Create a new backend.
    pub fn new(address: impl Into<String>, base_url: Url, cooldown: Duration) -> Self {
        Self {
            address: address.into(),
            base_url,
            healthy: AtomicBool::new(true),
            last_checked_ms: AtomicU64::new(0),
            circuit: CircuitBreaker::new(cooldown),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base URL rendered without trailing slash, for logs and labels.
    pub fn display_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    /// Store a probe result. Returns true if the flag changed.
    pub fn set_healthy(&self, healthy: bool, checked_at: SystemTime) -> bool {
        let millis = checked_at
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        self.last_checked_ms.store(millis.max(1), Ordering::Relaxed);
        self.healthy.swap(healthy, Ordering::Relaxed) != healthy
    }

    /// When the backend was last probed.
    pub fn last_checked(&self) -> Option<SystemTime> {
        match self.last_checked_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => Some(UNIX_EPOCH + Duration::from_millis(ms)),
        }
    }

    pub fn circuit(&self) -> &CircuitBreaker {
        &self.circuit
    }

    /// Absolute URI for forwarding `path_and_query` to this backend.
    pub fn target_uri(&self, path_and_query: &str) -> Result<Uri, InvalidUri> {
        let path = if path_and_query.starts_with('/') {
            path_and_query.to_string()
        } else {
            format!("/{}", path_and_query)
        };
        Uri::try_from(format!("{}{}", self.display_url(), path))
    }
}
