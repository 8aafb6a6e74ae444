//! Failure taxonomy for a request passing through the pipeline.

use axum::http::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Why a request did not produce a backend response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// Admission denied by the rate limiter.
    #[error("rate limit exceeded for client {client}")]
    RateLimited { client: String },

    /// Fast-fail while the circuit is open; no backend was attempted.
    #[error("circuit open")]
    CircuitOpen,

    /// Selection found no healthy backend.
    #[error("no healthy backend available")]
    NoHealthyBackend,

    /// An attempt outlived its deadline.
    #[error("backend {backend} timed out after {timeout:?}")]
    BackendTimeout { backend: String, timeout: Duration },

    /// Connection-level failure talking to a backend.
    #[error("transport error talking to {backend}: {reason}")]
    BackendTransportError { backend: String, reason: String },

    /// A backend answered 5xx and server errors are classified as failures.
    #[error("backend {backend} answered {status}")]
    BackendStatus { backend: String, status: u16 },

    /// Every attempt failed.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<PipelineError> },
}

impl PipelineError {
    /// HTTP status surfaced to the client.
    pub fn status_code(&self) -> StatusCode {
        match self {
            PipelineError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            PipelineError::CircuitOpen => StatusCode::SERVICE_UNAVAILABLE,
            PipelineError::NoHealthyBackend => StatusCode::SERVICE_UNAVAILABLE,
            PipelineError::BackendTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            PipelineError::BackendTransportError { .. } => StatusCode::BAD_GATEWAY,
            PipelineError::BackendStatus { .. } => StatusCode::BAD_GATEWAY,
            PipelineError::RetriesExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::RateLimited { .. } => "rate_limited",
            PipelineError::CircuitOpen => "circuit_open",
            PipelineError::NoHealthyBackend => "no_healthy_backend",
            PipelineError::BackendTimeout { .. } => "backend_timeout",
            PipelineError::BackendTransportError { .. } => "backend_transport_error",
            PipelineError::BackendStatus { .. } => "backend_status",
            PipelineError::RetriesExhausted { .. } => "retries_exhausted",
        }
    }

    /// Body text sent to the client.
    pub fn public_message(&self) -> &'static str {
        match self {
            PipelineError::RateLimited { .. } => "Rate limit exceeded. Please try again later.",
            PipelineError::CircuitOpen => "Service unavailable",
            PipelineError::NoHealthyBackend => "Service Unavailable",
            PipelineError::BackendTimeout { .. } => "Upstream request timed out",
            PipelineError::BackendTransportError { .. } => "Upstream request failed",
            PipelineError::BackendStatus { .. } => "Upstream request failed",
            PipelineError::RetriesExhausted { .. } => "Service Unavailable after retries",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_failures_map_to_service_unavailable() {
        assert_eq!(PipelineError::CircuitOpen.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(PipelineError::NoHealthyBackend.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        let exhausted = PipelineError::RetriesExhausted {
            attempts: 3,
            last: Box::new(PipelineError::BackendTimeout {
                backend: "http://a:1".into(),
                timeout: Duration::from_secs(5),
            }),
        };
        assert_eq!(exhausted.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(exhausted.to_string().contains("timed out"));
    }

    #[test]
    fn rate_limited_is_429() {
        let err = PipelineError::RateLimited { client: "10.0.0.1".into() };
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.kind(), "rate_limited");
    }
}
