//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every backend's health path
//! - Flip each backend's liveness flag from the single probe result

use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures_util::future::join_all;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::broadcast;
use tokio::time;

use crate::config::HealthCheckConfig;
use crate::load_balancer::{Backend, BackendSelector};
use crate::observability::metrics;

pub struct HealthMonitor {
    backends: Arc<BackendSelector>,
    config: HealthCheckConfig,
    client: Client<HttpConnector, Body>,
}

impl HealthMonitor {
    pub fn new(backends: Arc<BackendSelector>, config: HealthCheckConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self {
            backends,
            config,
            client,
        }
    }

    /// Probe on every tick until `shutdown` fires.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            path = %self.config.path,
            "Health monitor starting"
        );

        let interval = Duration::from_secs(self.config.interval_secs);
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe all backends concurrently and apply the results.
    pub async fn check_all(&self) {
        let backends = self.backends.backends();
        join_all(backends.iter().map(|backend| self.check_one(backend))).await;
    }

    async fn check_one(&self, backend: &Arc<Backend>) {
        let healthy = self.probe(backend).await;
        let changed = backend.set_healthy(healthy, SystemTime::now());

        if changed {
            if healthy {
                tracing::info!(backend = %backend.display_url(), "Backend is now healthy");
            } else {
                tracing::warn!(backend = %backend.display_url(), "Backend is now unhealthy");
            }
        }
        metrics::record_backend_health(backend.display_url(), healthy);
    }

    async fn probe(&self, backend: &Backend) -> bool {
        let uri = match backend.target_uri(&self.config.path) {
            Ok(uri) => uri,
            Err(e) => {
                tracing::error!(backend = %backend.display_url(), error = %e, "Invalid health check URI");
                return false;
            }
        };

        let request = match Request::builder()
            .method("GET")
            .uri(uri)
            .header("user-agent", "api-gateway-health-check")
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => {
                tracing::error!(error = %e, "Failed to build health check request");
                return false;
            }
        };

        let timeout = Duration::from_secs(self.config.timeout_secs);
        match time::timeout(timeout, self.client.request(request)).await {
            Ok(Ok(response)) => {
                let success = response.status() == StatusCode::OK;
                if !success {
                    tracing::debug!(backend = %backend.display_url(), status = %response.status(), "Health check failed: status other than 200");
                }
                success
            }
            Ok(Err(e)) => {
                tracing::debug!(backend = %backend.display_url(), error = %e, "Health check failed: connection error");
                false
            }
            Err(_) => {
                tracing::debug!(backend = %backend.display_url(), "Health check failed: timeout");
                false
            }
        }
    }
}
