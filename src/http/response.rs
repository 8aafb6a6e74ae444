//! Response handling and transformation.
//!
//! # Responsibilities
//! - Turn a buffered `GatewayResponse` into an axum response
//! - Map pipeline failures to HTTP status codes
//!
//! # Design Decisions
//! - Backend timeouts result in 504 Gateway Timeout
//! - Terminal pipeline failures are 503; failure details stay in logs

use axum::body::Body;
use axum::response::{IntoResponse, Response};

use crate::pipeline::{GatewayResponse, PipelineError};

impl IntoResponse for GatewayResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        (self.status_code(), self.public_message()).into_response()
    }
}
