//! Request identification and per-request metadata.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) as early as possible
//! - Capture what error rendering needs before the request is consumed
//!
//! # Design Decisions
//! - An incoming `x-request-id` is kept; one is generated only when absent
//! - The ID is propagated to the response for correlation

use axum::http::{HeaderMap, HeaderName, Method, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Generates UUID v4 request IDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// The parts of a request needed after the handler has consumed it.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub request_id: Option<String>,
}

impl RequestMeta {
    pub fn from_request<B>(req: &Request<B>) -> Self {
        Self {
            method: req.method().clone(),
            path: req.uri().path().to_string(),
            headers: req.headers().clone(),
            request_id: req
                .headers()
                .get(X_REQUEST_ID)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        }
    }
}
