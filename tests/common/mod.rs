//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use api_gateway::config::GatewayConfig;
use api_gateway::{GatewayServer, Shutdown};
use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// A backend started on an ephemeral port.
#[derive(Clone)]
pub struct MockBackend {
    pub addr: SocketAddr,
    /// Requests served, excluding health probes.
    pub hits: Arc<AtomicUsize>,
    /// What `/health` answers.
    pub healthy: Arc<AtomicBool>,
    /// Headers of the most recent non-health request.
    pub last_headers: Arc<Mutex<Option<HeaderMap>>>,
}

impl MockBackend {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn last_header(&self, name: &str) -> Option<String> {
        self.last_headers
            .lock()
            .unwrap()
            .as_ref()
            .and_then(|h| h.get(name))
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }
}

/// Start a backend that answers every request with `body`.
pub async fn start_mock_backend(body: &'static str) -> MockBackend {
    start_programmable_backend(move |_| async move { (200, body.to_string()) }).await
}

/// Start a backend whose reply is computed from the 0-based hit number.
pub async fn start_programmable_backend<F, Fut>(reply: F) -> MockBackend
where
    F: Fn(usize) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let backend = MockBackend {
        addr: listener.local_addr().unwrap(),
        hits: Arc::new(AtomicUsize::new(0)),
        healthy: Arc::new(AtomicBool::new(true)),
        last_headers: Arc::new(Mutex::new(None)),
    };

    let healthy = backend.healthy.clone();
    let hits = backend.hits.clone();
    let last_headers = backend.last_headers.clone();
    let reply = Arc::new(reply);

    let app = Router::new()
        .route(
            "/health",
            get(move || {
                let healthy = healthy.clone();
                async move {
                    if healthy.load(Ordering::SeqCst) {
                        StatusCode::OK
                    } else {
                        StatusCode::SERVICE_UNAVAILABLE
                    }
                }
            }),
        )
        .fallback(move |request: Request| {
            let hits = hits.clone();
            let last_headers = last_headers.clone();
            let reply = reply.clone();
            async move {
                *last_headers.lock().unwrap() = Some(request.headers().clone());
                let n = hits.fetch_add(1, Ordering::SeqCst);
                let (status, body) = reply(n).await;
                (StatusCode::from_u16(status).unwrap(), body).into_response()
            }
        });

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    backend
}

/// An address nothing listens on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Config pointing at `backends`, with health checks off and short backoff.
pub fn base_config(backends: &[String]) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.backends = backends.to_vec();
    config.health_check.enabled = false;
    config.retries.backoff_ms = 50;
    config.timeouts.shutdown_grace_ms = 1000;
    config
}

/// A running gateway.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub config_updates: mpsc::UnboundedSender<GatewayConfig>,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub async fn start_gateway(config: GatewayConfig) -> TestGateway {
    let server = GatewayServer::new(config).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (config_updates, updates_rx) = mpsc::unbounded_channel();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, updates_rx, server_shutdown).await;
    });

    TestGateway {
        addr,
        shutdown,
        config_updates,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
