use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::time::{Instant, UNIX_EPOCH};

use crate::admin::AdminState;
use crate::load_balancer::Backend;
use crate::pipeline::CircuitMode;
use crate::resilience::CircuitStatus;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub backends_total: usize,
    pub backends_healthy: usize,
    pub cache_entries: Option<usize>,
    pub rate_limited_clients: Option<usize>,
    pub circuit: CircuitReport,
}

#[derive(Serialize)]
pub struct BackendStatus {
    pub address: String,
    pub url: String,
    pub healthy: bool,
    /// Unix millis of the last probe.
    pub last_checked_ms: Option<u64>,
    pub circuit: CircuitView,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct CircuitView {
    pub state: &'static str,
    pub remaining_ms: Option<u64>,
}

#[derive(Serialize)]
pub struct BackendCircuit {
    pub backend: String,
    pub circuit: CircuitView,
}

#[derive(Serialize)]
pub struct CircuitReport {
    pub scope: &'static str,
    /// Set under global scope.
    pub circuit: Option<CircuitView>,
    /// Set under per-backend scope.
    pub backends: Vec<BackendCircuit>,
}

#[derive(Serialize)]
pub struct CacheSummary {
    pub enabled: bool,
    pub entries: usize,
    pub ttl_secs: Option<u64>,
}

#[derive(Deserialize)]
pub struct BackendRequest {
    pub address: String,
}

#[derive(Serialize)]
pub struct AdminError {
    pub error: String,
}

type AdminResult<T> = Result<T, (StatusCode, Json<AdminError>)>;

fn admin_error(status: StatusCode, error: impl ToString) -> (StatusCode, Json<AdminError>) {
    (status, Json(AdminError { error: error.to_string() }))
}

impl From<CircuitStatus> for CircuitView {
    fn from(status: CircuitStatus) -> Self {
        match status {
            CircuitStatus::Closed => CircuitView {
                state: "closed",
                remaining_ms: None,
            },
            CircuitStatus::Open { remaining } => CircuitView {
                state: "open",
                remaining_ms: Some(remaining.as_millis() as u64),
            },
        }
    }
}

fn backend_status(backend: &Backend, now: Instant) -> BackendStatus {
    BackendStatus {
        address: backend.address().to_string(),
        url: backend.display_url().to_string(),
        healthy: backend.is_healthy(),
        last_checked_ms: backend
            .last_checked()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64),
        circuit: backend.circuit().status(now).into(),
    }
}

fn circuit_report(state: &AdminState) -> CircuitReport {
    let now = Instant::now();
    match state.pipeline.circuit() {
        CircuitMode::Disabled => CircuitReport {
            scope: "disabled",
            circuit: None,
            backends: Vec::new(),
        },
        CircuitMode::Global(breaker) => CircuitReport {
            scope: "global",
            circuit: Some(breaker.status(now).into()),
            backends: Vec::new(),
        },
        CircuitMode::PerBackend => CircuitReport {
            scope: "per_backend",
            circuit: None,
            backends: state
                .pipeline
                .selector()
                .backends()
                .iter()
                .map(|b| BackendCircuit {
                    backend: b.display_url().to_string(),
                    circuit: b.circuit().status(now).into(),
                })
                .collect(),
        },
    }
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let selector = state.pipeline.selector();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        backends_total: selector.len(),
        backends_healthy: selector.healthy_count(),
        cache_entries: state.pipeline.cache().map(|c| c.len()),
        rate_limited_clients: state.pipeline.rate_limiter().map(|r| r.tracked_clients()),
        circuit: circuit_report(&state),
    })
}

pub async fn get_backends(State(state): State<AdminState>) -> Json<Vec<BackendStatus>> {
    let now = Instant::now();
    let backends = state.pipeline.selector().backends();
    Json(backends.iter().map(|b| backend_status(b, now)).collect())
}

pub async fn add_backend(
    State(state): State<AdminState>,
    Json(body): Json<BackendRequest>,
) -> AdminResult<(StatusCode, Json<BackendStatus>)> {
    let backend = state
        .pipeline
        .selector()
        .add(&body.address)
        .map_err(|e| admin_error(StatusCode::BAD_REQUEST, e))?;
    Ok((StatusCode::CREATED, Json(backend_status(&backend, Instant::now()))))
}

pub async fn remove_backend(
    State(state): State<AdminState>,
    Json(body): Json<BackendRequest>,
) -> AdminResult<StatusCode> {
    let selector = state.pipeline.selector();
    if selector.len() == 1 {
        return Err(admin_error(StatusCode::CONFLICT, "refusing to remove the last backend"));
    }
    match selector.remove(&body.address) {
        Ok(true) => Ok(StatusCode::NO_CONTENT),
        Ok(false) => Err(admin_error(StatusCode::NOT_FOUND, format!("unknown backend {}", body.address))),
        Err(e) => Err(admin_error(StatusCode::BAD_REQUEST, e)),
    }
}

pub async fn get_cache(State(state): State<AdminState>) -> Json<CacheSummary> {
    let cache = state.pipeline.cache();
    Json(CacheSummary {
        enabled: cache.is_some(),
        entries: cache.map(|c| c.len()).unwrap_or(0),
        ttl_secs: cache.map(|c| c.ttl().as_secs()),
    })
}

pub async fn purge_cache(State(state): State<AdminState>) -> Json<serde_json::Value> {
    let purged = state.pipeline.cache().map(|c| c.purge()).unwrap_or(0);
    tracing::info!(purged, "Cache purged via admin API");
    Json(serde_json::json!({ "purged": purged }))
}

pub async fn get_circuit(State(state): State<AdminState>) -> Json<CircuitReport> {
    Json(circuit_report(&state))
}

pub async fn reset_circuit(State(state): State<AdminState>) -> Json<CircuitReport> {
    state.pipeline.reset_circuit();
    Json(circuit_report(&state))
}
