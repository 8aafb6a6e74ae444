//! Request and response values passed through the pipeline.

use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};

/// Header set on responses to say whether the cache answered.
pub const X_CACHE: &str = "x-cache";

/// An inbound request, body already buffered so it can be replayed on retry.
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    /// Stable client identifier (peer IP) used for admission control.
    pub client: String,
    pub body: Bytes,
}

impl GatewayRequest {
    pub fn new(method: Method, uri: Uri, client: impl Into<String>) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            client: client.into(),
            body: Bytes::new(),
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Path plus query, as forwarded to the backend.
    pub fn path_and_query(&self) -> &str {
        self.uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/")
    }
}

/// A fully buffered response.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl GatewayResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// A response served from the cache: status OK, body verbatim.
    pub fn cached(body: Bytes) -> Self {
        let mut response = Self::new(StatusCode::OK, body);
        response.headers.insert(X_CACHE, HeaderValue::from_static("HIT"));
        response
    }

    pub fn mark_cache_miss(&mut self) {
        self.headers.insert(X_CACHE, HeaderValue::from_static("MISS"));
    }
}
