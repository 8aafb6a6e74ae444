//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the axum Router and wire up middleware (trace, limits, request ID)
//! - Hand every proxied request to the `RequestPipeline`
//! - Run background tasks: health monitor, rate-limit sweep, config reload
//! - Drain in-flight requests on shutdown, bounded by the grace period

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, oneshot};
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::config::validation::ValidationError;
use crate::config::GatewayConfig;
use crate::health::HealthMonitor;
use crate::http::request::{self, propagate_request_id_layer, set_request_id_layer};
use crate::load_balancer::BackendSelector;
use crate::pipeline::{Forwarder, HttpForwarder, RequestPipeline};
use crate::security::RateLimiter;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RequestPipeline>,
    pub max_body_size: usize,
}

/// The gateway's public listener.
pub struct GatewayServer {
    config: GatewayConfig,
    selector: Arc<BackendSelector>,
    pipeline: Arc<RequestPipeline>,
}

impl GatewayServer {
    /// Build the server, forwarding over HTTP.
    pub fn new(config: GatewayConfig) -> Result<Self, ValidationError> {
        let forwarder = Arc::new(HttpForwarder::new(config.listener.max_body_size));
        Self::with_forwarder(config, forwarder)
    }

    /// Build the server around a custom forwarder.
    pub fn with_forwarder(
        config: GatewayConfig,
        forwarder: Arc<dyn Forwarder>,
    ) -> Result<Self, ValidationError> {
        let selector = Arc::new(BackendSelector::new(
            &config.backends,
            Duration::from_secs(config.circuit_breaker.cooldown_secs),
        )?);
        let pipeline = Arc::new(RequestPipeline::from_config(&config, selector.clone(), forwarder));

        Ok(Self {
            config,
            selector,
            pipeline,
        })
    }

    pub fn pipeline(&self) -> Arc<RequestPipeline> {
        self.pipeline.clone()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Build the axum router with all middleware layers.
    pub fn router(&self) -> Router {
        let state = AppState {
            pipeline: self.pipeline.clone(),
            max_body_size: self.config.listener.max_body_size,
        };

        Router::new()
            .route("/health", get(gateway_health))
            .route("/health/v1", get(|| async { "Health check for v1" }))
            .route("/health/v2", get(|| async { "Health check for v2" }))
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(set_request_id_layer())
                    .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                        tracing::info_span!(
                            "request",
                            method = %req.method(),
                            uri = %req.uri(),
                            request_id = %request::request_id(req),
                        )
                    }))
                    .layer(propagate_request_id_layer())
                    .layer(RequestBodyLimitLayer::new(self.config.listener.max_body_size)),
            )
    }

    /// Serve on `listener` until `shutdown` fires.
    ///
    /// New backend lists arriving on `config_updates` are applied in place.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            backends = self.selector.len(),
            "Gateway server starting"
        );

        let monitor = HealthMonitor::new(self.selector.clone(), self.config.health_check.clone());
        tokio::spawn(monitor.run(shutdown.resubscribe()));

        if let Some(limiter) = self.pipeline.rate_limiter() {
            let every = Duration::from_secs(self.config.rate_limit.sweep_interval_secs);
            tokio::spawn(sweep_rate_limits(limiter.clone(), every, shutdown.resubscribe()));
        }

        tokio::spawn(apply_config_updates(
            self.selector.clone(),
            config_updates,
            shutdown.resubscribe(),
        ));

        let app = self.router().into_make_service_with_connect_info::<SocketAddr>();
        let grace = Duration::from_millis(self.config.timeouts.shutdown_grace_ms);

        let (draining_tx, draining_rx) = oneshot::channel::<()>();
        let mut shutdown = shutdown;
        let server = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!(grace = ?grace, "Shutdown signal received, draining connections");
                let _ = draining_tx.send(());
            })
            .into_future();
        tokio::pin!(server);

        let deadline = async move {
            match draining_rx.await {
                Ok(()) => tokio::time::sleep(grace).await,
                Err(_) => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            result = &mut server => result?,
            _ = deadline => {
                tracing::warn!(grace = ?grace, "Grace period elapsed, closing remaining connections");
            }
        }

        tracing::info!("Gateway server stopped");
        Ok(())
    }
}

async fn gateway_health() -> &'static str {
    "API Gateway is running"
}

async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let request_id = request::request_id(&request).to_string();

    let request = match request::buffer_request(request, addr.ip().to_string(), state.max_body_size).await {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Failed to read request body");
            return (StatusCode::BAD_REQUEST, "Failed to read request body").into_response();
        }
    };

    match state.pipeline.handle(&request).await {
        Ok(response) => {
            tracing::debug!(
                request_id = %request_id,
                status = %response.status,
                elapsed = ?start.elapsed(),
                "Request completed"
            );
            response.into_response()
        }
        Err(err) => {
            tracing::debug!(
                request_id = %request_id,
                error = %err,
                status = %err.status_code(),
                "Request failed"
            );
            err.into_response()
        }
    }
}

async fn sweep_rate_limits(
    limiter: Arc<RateLimiter>,
    every: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let removed = limiter.sweep(std::time::Instant::now());
                if removed > 0 {
                    tracing::debug!(removed, remaining = limiter.tracked_clients(), "Swept idle rate-limit buckets");
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}

async fn apply_config_updates(
    selector: Arc<BackendSelector>,
    mut updates: mpsc::UnboundedReceiver<GatewayConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(config) = update else { break };
                match selector.sync(&config.backends) {
                    Ok(()) => tracing::info!(
                        backends = selector.len(),
                        "Applied reloaded backend list; other settings take effect on restart"
                    ),
                    Err(e) => tracing::error!(error = %e, "Rejected reloaded backend list"),
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}
