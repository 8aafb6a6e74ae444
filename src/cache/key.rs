//! Cache key construction.

use axum::http::HeaderName;

use crate::config::CacheKeyConfig;
use crate::pipeline::GatewayRequest;

/// Derives the cache key for a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum KeyStrategy {
    /// Path only. A GET and a POST to the same path share one entry.
    #[default]
    Path,
    /// Method and path.
    MethodAndPath,
    /// Method, path and the values of selected headers.
    MethodPathHeaders(Vec<HeaderName>),
}

impl KeyStrategy {
    pub fn from_config(config: &CacheKeyConfig) -> Self {
        match config {
            CacheKeyConfig::Path => KeyStrategy::Path,
            CacheKeyConfig::MethodAndPath => KeyStrategy::MethodAndPath,
            CacheKeyConfig::MethodPathHeaders { headers } => {
                let names = headers
                    .iter()
                    .filter_map(|h| match HeaderName::from_bytes(h.as_bytes()) {
                        Ok(name) => Some(name),
                        Err(_) => {
                            tracing::warn!(header = %h, "Ignoring invalid cache key header");
                            None
                        }
                    })
                    .collect();
                KeyStrategy::MethodPathHeaders(names)
            }
        }
    }

    pub fn key_for(&self, request: &GatewayRequest) -> String {
        match self {
            KeyStrategy::Path => request.path().to_string(),
            KeyStrategy::MethodAndPath => format!("{} {}", request.method, request.path()),
            KeyStrategy::MethodPathHeaders(names) => {
                let mut key = format!("{} {}", request.method, request.path());
                for name in names {
                    let value = request
                        .headers
                        .get(name)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("");
                    key.push('\n');
                    key.push_str(name.as_str());
                    key.push('=');
                    key.push_str(value);
                }
                key
            }
        }
    }
}
