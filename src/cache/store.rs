//! Path-keyed response cache with TTL expiry.
//!
//! # Responsibilities
//! - Serve stored bodies without contacting a backend
//! - Store only status-OK responses
//! - Expire every entry `ttl` after insertion
//!
//! # Design Decisions
//! - RwLock over a HashMap: hits take the read lock only
//! - An expiry task is scheduled per insertion; it removes the entry only if
//!   it is still the one it was scheduled for
//! - Lookups also check age, so an entry older than the TTL is never served
//!   even if its timer has not run yet
//! - Racing stores of the same key: last write wins

use axum::body::Bytes;
use axum::http::StatusCode;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;
use tokio::time::Instant;

use crate::cache::key::KeyStrategy;
use crate::config::CacheConfig;
use crate::pipeline::GatewayRequest;

#[derive(Debug, Clone)]
struct CacheEntry {
    body: Bytes,
    stored_at: Instant,
    generation: u64,
}

type EntryMap = RwLock<HashMap<String, CacheEntry>>;

#[derive(Debug)]
pub struct ResponseCache {
    entries: Arc<EntryMap>,
    ttl: Duration,
    keys: KeyStrategy,
    generation: AtomicU64,
}

impl ResponseCache {
    pub fn new(ttl: Duration, keys: KeyStrategy) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
            keys,
            generation: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(Duration::from_secs(config.ttl_secs), KeyStrategy::from_config(&config.key))
    }

    /// Cache key for a request under the configured strategy.
    pub fn key_for(&self, request: &GatewayRequest) -> String {
        self.keys.key_for(request)
    }

    /// Stored body for `key`, if present and younger than the TTL.
    pub fn lookup(&self, key: &str) -> Option<Bytes> {
        let entries = self.entries.read().expect("response cache lock poisoned");
        entries
            .get(key)
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.body.clone())
    }

    /// Store `body` under `key` if `status` is OK. Returns whether it was stored.
    pub fn store(&self, key: &str, body: Bytes, status: StatusCode) -> bool {
        if status != StatusCode::OK {
            return false;
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        {
            let mut entries = self.entries.write().expect("response cache lock poisoned");
            entries.insert(
                key.to_string(),
                CacheEntry {
                    body,
                    stored_at: Instant::now(),
                    generation,
                },
            );
        }
        self.schedule_expiry(key.to_string(), generation);
        true
    }

    fn schedule_expiry(&self, key: String, generation: u64) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            // Without a runtime, the age check in lookup still hides the entry.
            return;
        };
        let entries: Weak<EntryMap> = Arc::downgrade(&self.entries);
        let ttl = self.ttl;
        handle.spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Some(entries) = entries.upgrade() {
                let mut entries = entries.write().expect("response cache lock poisoned");
                if entries.get(&key).map(|e| e.generation) == Some(generation) {
                    entries.remove(&key);
                    tracing::debug!(key = %key, "Cache entry expired");
                }
            }
        });
    }

    /// Remove every entry. Returns how many were dropped.
    pub fn purge(&self) -> usize {
        let mut entries = self.entries.write().expect("response cache lock poisoned");
        let count = entries.len();
        entries.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("response cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
