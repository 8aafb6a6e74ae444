//! Forwarding a request to one backend.
//!
//! # Responsibilities
//! - Rewrite the request URI onto the chosen backend
//! - Strip hop-by-hop headers, append X-Forwarded-For
//! - Buffer the backend response so it can be cached
//!
//! # Design Decisions
//! - `Forwarder` is a trait so the pipeline can be driven without sockets
//! - Status codes are not judged here; the pipeline classifies them
//! - Deadlines are applied by the caller; dropping the returned future
//!   aborts the in-flight call

use axum::body::{Body, Bytes};
use axum::http::{header, Request};
use futures_util::future::BoxFuture;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;

use crate::load_balancer::Backend;
use crate::pipeline::types::{GatewayRequest, GatewayResponse};
use crate::security::headers::{append_forwarded_for, strip_hop_by_hop};

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("invalid upstream uri: {0}")]
    InvalidUri(String),

    #[error("upstream transport error: {0}")]
    Transport(String),

    #[error("failed to read upstream body: {0}")]
    Body(String),
}

/// Sends one request to one backend.
pub trait Forwarder: Send + Sync {
    fn forward<'a>(
        &'a self,
        backend: &'a Backend,
        request: &'a GatewayRequest,
    ) -> BoxFuture<'a, Result<GatewayResponse, ForwardError>>;
}

/// Forwarder over a pooled hyper client.
#[derive(Clone)]
pub struct HttpForwarder {
    client: Client<HttpConnector, Body>,
    max_body_size: usize,
}

impl HttpForwarder {
    pub fn new(max_body_size: usize) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            client,
            max_body_size,
        }
    }

    fn build_request(
        &self,
        backend: &Backend,
        request: &GatewayRequest,
    ) -> Result<Request<Body>, ForwardError> {
        let uri = backend
            .target_uri(request.path_and_query())
            .map_err(|e| ForwardError::InvalidUri(e.to_string()))?;

        let mut headers = request.headers.clone();
        strip_hop_by_hop(&mut headers);
        // hyper sets Host from the rewritten URI.
        headers.remove(header::HOST);
        append_forwarded_for(&mut headers, &request.client);

        let mut builder = Request::builder().method(request.method.clone()).uri(uri);
        if let Some(h) = builder.headers_mut() {
            *h = headers;
        }
        builder
            .body(Body::from(request.body.clone()))
            .map_err(|e| ForwardError::InvalidUri(e.to_string()))
    }

    async fn send(
        &self,
        backend: &Backend,
        request: &GatewayRequest,
    ) -> Result<GatewayResponse, ForwardError> {
        let upstream = self.build_request(backend, request)?;

        let response = self
            .client
            .request(upstream)
            .await
            .map_err(|e| ForwardError::Transport(e.to_string()))?;

        let (parts, body) = response.into_parts();
        let body: Bytes = axum::body::to_bytes(Body::new(body), self.max_body_size)
            .await
            .map_err(|e| ForwardError::Body(e.to_string()))?;

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        // Length is recomputed from the buffered body.
        headers.remove(header::CONTENT_LENGTH);

        Ok(GatewayResponse {
            status: parts.status,
            headers,
            body,
        })
    }
}

impl Forwarder for HttpForwarder {
    fn forward<'a>(
        &'a self,
        backend: &'a Backend,
        request: &'a GatewayRequest,
    ) -> BoxFuture<'a, Result<GatewayResponse, ForwardError>> {
        Box::pin(self.send(backend, request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
    use axum::{routing::any, Router};
    use std::time::Duration;
    use tokio::net::TcpListener;
    use url::Url;

    async fn spawn_echo() -> String {
        let app = Router::new().route(
            "/{*path}",
            any(|req: Request<Body>| async move {
                let xff = req
                    .headers()
                    .get("x-forwarded-for")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                let upgrade = req.headers().contains_key("upgrade");
                format!("{} {} xff={} upgrade={}", req.method(), req.uri(), xff, upgrade)
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{}", addr)
    }

    fn backend(url: &str) -> Backend {
        Backend::new(url, Url::parse(url).unwrap(), Duration::from_secs(30))
    }

    #[tokio::test]
    async fn forwards_path_query_and_headers() {
        let url = spawn_echo().await;
        let forwarder = HttpForwarder::new(1024 * 1024);

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9"));
        headers.insert("upgrade", HeaderValue::from_static("websocket"));
        let request = GatewayRequest::new(Method::POST, "/items/7?full=1".parse().unwrap(), "10.0.0.1")
            .with_headers(headers)
            .with_body("payload");

        let response = forwarder.forward(&backend(&url), &request).await.unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(
            response.body,
            Bytes::from("POST /items/7?full=1 xff=203.0.113.9, 10.0.0.1 upgrade=false")
        );
    }

    #[tokio::test]
    async fn connection_refused_is_transport_error() {
        let url = {
            let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
            format!("http://{}", l.local_addr().unwrap())
        };
        let forwarder = HttpForwarder::new(1024);
        let request = GatewayRequest::new(Method::GET, "/".parse().unwrap(), "10.0.0.1");

        let err = forwarder.forward(&backend(&url), &request).await.unwrap_err();
        assert!(matches!(err, ForwardError::Transport(_)));
    }
}
