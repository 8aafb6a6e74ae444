//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) unless the client sent one
//! - Buffer the inbound request into a replayable `GatewayRequest`
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Body size is bounded while buffering, so retries can resend it

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Request};
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use uuid::Uuid;

use crate::pipeline::GatewayRequest;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Generates `x-request-id` values.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Sets `x-request-id` on requests that lack one.
pub fn set_request_id_layer() -> SetRequestIdLayer<UuidRequestId> {
    SetRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID), UuidRequestId)
}

/// Copies `x-request-id` from the request onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID))
}

/// The request's ID, or "unknown" if the layer did not run.
pub fn request_id<B>(request: &Request<B>) -> &str {
    request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Buffer `request` (at most `limit` body bytes) into a `GatewayRequest`.
pub async fn buffer_request(
    request: Request<Body>,
    client: String,
    limit: usize,
) -> Result<GatewayRequest, axum::Error> {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, limit).await?;

    Ok(GatewayRequest {
        method: parts.method,
        uri: parts.uri,
        headers: parts.headers,
        client,
        body,
    })
}
