//! Backend pool management.
//!
//! # Responsibilities
//! - Own the ordered backend list built from configuration
//! - Apply the load balancing strategy to pick a backend
//! - Add/remove backends at runtime (admin API, config reload)

use arc_swap::ArcSwap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::validation::{parse_backend_url, ValidationError};
use crate::load_balancer::{backend::Backend, round_robin::RoundRobin, LoadBalancer};

/// Selects backends for forwarding.
///
/// Reads are lock-free: the list is swapped atomically on change, and the
/// round-robin counter is a single atomic.
#[derive(Debug)]
pub struct BackendSelector {
    backends: ArcSwap<Vec<Arc<Backend>>>,
    balancer: Box<dyn LoadBalancer>,
    /// Cooldown handed to each backend's own breaker.
    cooldown: Duration,
    /// Serialises list mutations.
    writer: Mutex<()>,
}

impl BackendSelector {
    /// Build a selector from configured addresses.
    pub fn new(addresses: &[String], cooldown: Duration) -> Result<Self, ValidationError> {
        let mut backends: Vec<Arc<Backend>> = Vec::with_capacity(addresses.len());
        for address in addresses {
            let url = parse_backend_url(address)?;
            if backends.iter().any(|b| b.base_url() == &url) {
                return Err(ValidationError::DuplicateBackend(address.clone()));
            }
            backends.push(Arc::new(Backend::new(address.trim(), url, cooldown)));
        }

        tracing::info!(count = backends.len(), "Backend selector initialized");
        for (i, b) in backends.iter().enumerate() {
            tracing::info!(index = i, backend = %b.display_url(), "Backend registered");
        }

        Ok(Self {
            backends: ArcSwap::from_pointee(backends),
            balancer: Box::new(RoundRobin::new()),
            cooldown,
            writer: Mutex::new(()),
        })
    }

    /// Next healthy backend in rotation, or None if none is healthy.
    pub fn next(&self) -> Option<Arc<Backend>> {
        self.next_where(|_| true)
    }

    /// Next healthy backend that also satisfies `accept`.
    pub fn next_where<F>(&self, accept: F) -> Option<Arc<Backend>>
    where
        F: Fn(&Backend) -> bool,
    {
        let backends = self.backends.load();
        let eligible = |b: &Backend| b.is_healthy() && accept(b);
        let picked = self.balancer.next_server(&backends, &eligible);
        if picked.is_none() {
            tracing::debug!(backend_count = backends.len(), "No eligible backend found");
        }
        picked
    }

    /// Snapshot of the current backend list (for health checking and admin).
    pub fn backends(&self) -> Arc<Vec<Arc<Backend>>> {
        self.backends.load_full()
    }

    pub fn len(&self) -> usize {
        self.backends.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn healthy_count(&self) -> usize {
        self.backends.load().iter().filter(|b| b.is_healthy()).count()
    }

    /// Append a backend at the end of the rotation.
    pub fn add(&self, address: &str) -> Result<Arc<Backend>, ValidationError> {
        let url = parse_backend_url(address)?;
        let _guard = self.writer.lock().expect("backend selector mutex poisoned");

        let current = self.backends.load_full();
        if current.iter().any(|b| b.base_url() == &url) {
            return Err(ValidationError::DuplicateBackend(address.to_string()));
        }

        let backend = Arc::new(Backend::new(address.trim(), url, self.cooldown));
        let mut next = (*current).clone();
        next.push(backend.clone());
        self.backends.store(Arc::new(next));

        tracing::info!(backend = %backend.display_url(), "Backend added");
        Ok(backend)
    }

    /// Remove a backend. Returns false if it was not registered.
    pub fn remove(&self, address: &str) -> Result<bool, ValidationError> {
        let url = parse_backend_url(address)?;
        let _guard = self.writer.lock().expect("backend selector mutex poisoned");

        let current = self.backends.load_full();
        let next: Vec<Arc<Backend>> = current
            .iter()
            .filter(|b| b.base_url() != &url)
            .cloned()
            .collect();
        if next.len() == current.len() {
            return Ok(false);
        }
        self.backends.store(Arc::new(next));

        tracing::info!(backend = %url, "Backend removed");
        Ok(true)
    }

    /// Replace the list with `addresses`, keeping state for backends that stay.
    pub fn sync(&self, addresses: &[String]) -> Result<(), ValidationError> {
        let mut urls = Vec::with_capacity(addresses.len());
        for address in addresses {
            urls.push((address.trim().to_string(), parse_backend_url(address)?));
        }

        let _guard = self.writer.lock().expect("backend selector mutex poisoned");
        let current = self.backends.load_full();
        let next: Vec<Arc<Backend>> = urls
            .into_iter()
            .map(|(address, url)| {
                current
                    .iter()
                    .find(|b| b.base_url() == &url)
                    .cloned()
                    .unwrap_or_else(|| Arc::new(Backend::new(address, url, self.cooldown)))
            })
            .collect();

        tracing::info!(before = current.len(), after = next.len(), "Backend list reloaded");
        self.backends.store(Arc::new(next));
        Ok(())
    }
}
