//! Request identification.
//!
//! # Responsibilities
//! - Generate a UUID request ID when the client did not send one
//! - Echo the ID back on the response
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The ID travels to the backend as an ordinary header

use axum::http::{HeaderName, Request};
use tower::Layer;
use tower_http::request_id::{
    MakeRequestUuid, PropagateRequestId, PropagateRequestIdLayer, RequestId, SetRequestId,
    SetRequestIdLayer,
};

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Sets `x-request-id` on requests that lack one and propagates it to the response.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestIdLayer;

impl<S> Layer<S> for RequestIdLayer {
    type Service = SetRequestId<PropagateRequestId<S>, MakeRequestUuid>;

    fn layer(&self, inner: S) -> Self::Service {
        let propagated = PropagateRequestIdLayer::new(X_REQUEST_ID).layer(inner);
        SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid).layer(propagated)
    }
}

/// Access to the request ID assigned by `RequestIdLayer`.
pub trait RequestIdExt {
    fn request_id(&self) -> Option<&str>;
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> Option<&str> {
        self.extensions()
            .get::<RequestId>()
            .and_then(|id| id.header_value().to_str().ok())
    }
}
