//! The ordered request chain.
//!
//! # Responsibilities
//! - Admit or reject the request (rate limiter)
//! - Fast-fail while the circuit is open
//! - Pick a backend, answer from the cache when possible
//! - Forward with a per-attempt deadline, retrying classified failures
//! - Feed every failed attempt back into the circuit breaker
//!
//! # Data Flow
//! ```text
//! GatewayRequest
//!     → RateLimiter        (reject: RateLimited, nothing else touched)
//!     → CircuitBreaker     (global scope; reject: CircuitOpen)
//!     → BackendSelector    (none eligible: NoHealthyBackend / CircuitOpen)
//!     → ResponseCache      (hit: 200 + cached body, backend untouched)
//!     → RetryOrchestrator
//!         → AttemptTimeout → Forwarder
//!         → failure        → CircuitBreaker::report_failure
//!     → ResponseCache::store (status OK only)
//!     → GatewayResponse
//! ```
//!
//! # Design Decisions
//! - Every component is owned by the pipeline instance; nothing is global
//! - The breaker is consulted once at admission; retries in flight are not
//!   cut short when it opens
//! - Attempts after the first re-run selection, so a retry moves on to the
//!   next backend in rotation
//! - A retry that finds no eligible backend ends the request as exhausted,
//!   carrying the failure of the attempt before it

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::ResponseCache;
use crate::config::{CircuitScope, GatewayConfig, RetryOn};
use crate::load_balancer::{Backend, BackendSelector};
use crate::observability::metrics;
use crate::pipeline::error::PipelineError;
use crate::pipeline::forward::Forwarder;
use crate::pipeline::types::{GatewayRequest, GatewayResponse};
use crate::resilience::{AttemptResult, AttemptTimeout, CircuitBreaker, RetryError, RetryOrchestrator};
use crate::security::RateLimiter;

/// Where failures are recorded and admission is checked.
#[derive(Debug)]
pub enum CircuitMode {
    Disabled,
    /// One breaker for the whole proxying path.
    Global(CircuitBreaker),
    /// Each backend's own breaker; open backends are skipped by selection.
    PerBackend,
}

pub struct RequestPipeline {
    rate_limiter: Option<Arc<RateLimiter>>,
    circuit: CircuitMode,
    selector: Arc<BackendSelector>,
    cache: Option<Arc<ResponseCache>>,
    retries: RetryOrchestrator,
    timeout: AttemptTimeout,
    forwarder: Arc<dyn Forwarder>,
}

impl RequestPipeline {
    pub fn from_config(
        config: &GatewayConfig,
        selector: Arc<BackendSelector>,
        forwarder: Arc<dyn Forwarder>,
    ) -> Self {
        let rate_limiter = config
            .rate_limit
            .enabled
            .then(|| Arc::new(RateLimiter::from_config(&config.rate_limit)));

        let circuit = match (config.circuit_breaker.enabled, config.circuit_breaker.scope) {
            (false, _) => CircuitMode::Disabled,
            (true, CircuitScope::Global) => CircuitMode::Global(CircuitBreaker::new(
                Duration::from_secs(config.circuit_breaker.cooldown_secs),
            )),
            (true, CircuitScope::PerBackend) => CircuitMode::PerBackend,
        };

        let cache = config
            .cache
            .enabled
            .then(|| Arc::new(ResponseCache::from_config(&config.cache)));

        tracing::info!(
            rate_limit = config.rate_limit.enabled,
            circuit = ?config.circuit_breaker.scope,
            circuit_enabled = config.circuit_breaker.enabled,
            cache = config.cache.enabled,
            max_attempts = config.retries.effective_attempts(),
            attempt_timeout_ms = config.timeouts.attempt_ms,
            "Request pipeline assembled"
        );

        Self {
            rate_limiter,
            circuit,
            selector,
            cache,
            retries: RetryOrchestrator::from_config(&config.retries),
            timeout: AttemptTimeout::new(Duration::from_millis(config.timeouts.attempt_ms)),
            forwarder,
        }
    }

    pub fn rate_limiter(&self) -> Option<&Arc<RateLimiter>> {
        self.rate_limiter.as_ref()
    }

    pub fn circuit(&self) -> &CircuitMode {
        &self.circuit
    }

    pub fn selector(&self) -> &Arc<BackendSelector> {
        &self.selector
    }

    pub fn cache(&self) -> Option<&Arc<ResponseCache>> {
        self.cache.as_ref()
    }

    /// Close every breaker the pipeline consults.
    pub fn reset_circuit(&self) {
        match &self.circuit {
            CircuitMode::Disabled => {}
            CircuitMode::Global(breaker) => breaker.reset(),
            CircuitMode::PerBackend => {
                for backend in self.selector.backends().iter() {
                    backend.circuit().reset();
                }
            }
        }
        tracing::info!("Circuit reset");
    }

    /// Run one request through the chain.
    pub async fn handle(&self, request: &GatewayRequest) -> Result<GatewayResponse, PipelineError> {
        let start = Instant::now();
        let result = self.process(request).await;

        match &result {
            Ok(response) => metrics::record_request("ok", response.status.as_u16(), start),
            Err(err) => metrics::record_request(err.kind(), err.status_code().as_u16(), start),
        }
        result
    }

    async fn process(&self, request: &GatewayRequest) -> Result<GatewayResponse, PipelineError> {
        if let Some(limiter) = &self.rate_limiter {
            if !limiter.check(&request.client) {
                tracing::warn!(client = %request.client, path = %request.path(), "Rate limit exceeded");
                metrics::record_rate_limited();
                return Err(PipelineError::RateLimited {
                    client: request.client.clone(),
                });
            }
        }

        let now = Instant::now();
        if let CircuitMode::Global(breaker) = &self.circuit {
            if !breaker.allow(now) {
                tracing::warn!(client = %request.client, path = %request.path(), "Circuit open, rejecting request");
                metrics::record_circuit_rejection();
                return Err(PipelineError::CircuitOpen);
            }
        }

        let first = self.select(now)?;

        let cache_key = self.cache.as_ref().map(|cache| cache.key_for(request));
        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            if let Some(body) = cache.lookup(key) {
                tracing::debug!(key = %key, "Cache hit");
                metrics::record_cache(true);
                return Ok(GatewayResponse::cached(body));
            }
            tracing::debug!(key = %key, "Cache miss");
            metrics::record_cache(false);
        }

        let mut preselected = Some(first);
        let outcome = self
            .retries
            .execute(|attempt| {
                let backend = preselected.take();
                async move {
                    let backend = match backend {
                        Some(backend) => backend,
                        None => match self.select(Instant::now()) {
                            Ok(backend) => backend,
                            Err(err) => return AttemptResult::Unavailable(err),
                        },
                    };
                    self.attempt(&backend, request, attempt).await
                }
            })
            .await;

        let mut response = match outcome {
            Ok(response) => response,
            // With retries off the attempt surfaces its own failure.
            Err(RetryError::Exhausted { last, .. }) if self.retries.max_attempts() == 1 => return Err(last),
            Err(RetryError::Exhausted { attempts, last }) => {
                tracing::error!(attempts, error = %last, path = %request.path(), "Retries exhausted");
                return Err(PipelineError::RetriesExhausted {
                    attempts,
                    last: Box::new(last),
                });
            }
            Err(RetryError::Aborted(err)) => return Err(err),
        };

        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            if cache.store(key, response.body.clone(), response.status) {
                tracing::debug!(key = %key, "Response cached");
            }
            response.mark_cache_miss();
        }
        Ok(response)
    }

    fn select(&self, now: Instant) -> Result<Arc<Backend>, PipelineError> {
        match &self.circuit {
            CircuitMode::PerBackend => {
                if let Some(backend) = self.selector.next_where(|b| b.circuit().allow(now)) {
                    return Ok(backend);
                }
                if self.selector.healthy_count() > 0 {
                    tracing::warn!("Every healthy backend has an open circuit");
                    metrics::record_circuit_rejection();
                    Err(PipelineError::CircuitOpen)
                } else {
                    tracing::warn!("No healthy backend available");
                    Err(PipelineError::NoHealthyBackend)
                }
            }
            _ => self.selector.next().ok_or_else(|| {
                tracing::warn!("No healthy backend available");
                PipelineError::NoHealthyBackend
            }),
        }
    }

    async fn attempt(
        &self,
        backend: &Backend,
        request: &GatewayRequest,
        attempt: u32,
    ) -> AttemptResult<GatewayResponse, PipelineError> {
        tracing::debug!(backend = %backend.display_url(), attempt, path = %request.path(), "Forwarding request");

        match self.timeout.run(self.forwarder.forward(backend, request)).await {
            Ok(Ok(response))
                if response.status.is_server_error() && self.retries.retries_on(RetryOn::ServerError) =>
            {
                tracing::warn!(
                    backend = %backend.display_url(),
                    attempt,
                    status = %response.status,
                    "Backend answered with server error"
                );
                self.report_failure(backend);
                AttemptResult::Retryable(PipelineError::BackendStatus {
                    backend: backend.display_url().to_string(),
                    status: response.status.as_u16(),
                })
            }
            Ok(Ok(response)) => AttemptResult::Success(response),
            Ok(Err(e)) => {
                tracing::error!(backend = %backend.display_url(), attempt, error = %e, "Upstream error");
                self.report_failure(backend);
                self.classify(
                    RetryOn::TransportError,
                    PipelineError::BackendTransportError {
                        backend: backend.display_url().to_string(),
                        reason: e.to_string(),
                    },
                )
            }
            Err(elapsed) => {
                tracing::warn!(backend = %backend.display_url(), attempt, timeout = ?elapsed.0, "Upstream timed out");
                self.report_failure(backend);
                self.classify(
                    RetryOn::Timeout,
                    PipelineError::BackendTimeout {
                        backend: backend.display_url().to_string(),
                        timeout: elapsed.0,
                    },
                )
            }
        }
    }

    fn classify(&self, class: RetryOn, err: PipelineError) -> AttemptResult<GatewayResponse, PipelineError> {
        if self.retries.retries_on(class) {
            AttemptResult::Retryable(err)
        } else {
            AttemptResult::Abort(err)
        }
    }

    fn report_failure(&self, backend: &Backend) {
        let now = Instant::now();
        match &self.circuit {
            CircuitMode::Disabled => {}
            CircuitMode::Global(breaker) => breaker.report_failure(now),
            CircuitMode::PerBackend => backend.circuit().report_failure(now),
        }
    }
}
