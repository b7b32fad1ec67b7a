//! Request dispatch for one service.
//!
//! # Responsibilities
//! - Gate on the service's health flag
//! - Match the path against the service's prefixes
//! - Rewrite the path and hand the request to the forwarder
//!
//! # Design Decisions
//! - Gate first: an unhealthy service answers 503 without touching the path
//! - Explicit NoRoute (404) rather than a silent default
//! - Reads only the `ServiceState` it was given, never the registry

use std::time::Instant;

use axum::body::Body;
use axum::http::uri::{PathAndQuery, Uri};
use axum::http::{Request, Response, StatusCode};
use axum::response::IntoResponse;
use thiserror::Error;

use crate::http::forward::TransportError;
use crate::observability::metrics;
use crate::registry::ServiceState;
use crate::routing::matcher::PathRules;

/// Why a request was answered by the proxy itself.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("service is unhealthy")]
    HealthGate,

    #[error("no path prefix matches {0}")]
    NoRoute(String),

    #[error("rewritten path is not a valid URI: {0}")]
    BadPath(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl DispatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::HealthGate => StatusCode::SERVICE_UNAVAILABLE,
            DispatchError::NoRoute(_) => StatusCode::NOT_FOUND,
            DispatchError::BadPath(_) => StatusCode::BAD_REQUEST,
            DispatchError::Transport(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let reason = status.canonical_reason().unwrap_or_default();
        (status, reason).into_response()
    }
}

/// The path to forward for `path`, or `None` when no prefix matches.
pub fn route(rules: &PathRules, path: &str) -> Option<String> {
    rules.rewrite(path)
}

/// Route one request through `service`.
pub async fn dispatch(
    service: &ServiceState,
    request: Request<Body>,
) -> Result<Response<Body>, DispatchError> {
    let start = Instant::now();
    let method = request.method().clone();

    let result = gate_and_forward(service, request).await;

    let status = match &result {
        Ok(response) => response.status(),
        Err(e) => e.status(),
    };
    metrics::record_request(service.name(), method.as_str(), status.as_u16(), start);

    result
}

async fn gate_and_forward(
    service: &ServiceState,
    mut request: Request<Body>,
) -> Result<Response<Body>, DispatchError> {
    if !service.is_healthy() {
        tracing::debug!(service = %service.name(), "Rejected by health gate");
        return Err(DispatchError::HealthGate);
    }

    let path = request.uri().path();
    let forwarded =
        route(service.rules(), path).ok_or_else(|| DispatchError::NoRoute(path.to_string()))?;

    if forwarded != path {
        let uri = rewrite_uri(request.uri(), &forwarded)?;
        *request.uri_mut() = uri;
    }

    service.forwarder().forward(request).await.map_err(|e| {
        tracing::warn!(service = %service.name(), error = %e, "Backend request failed");
        DispatchError::Transport(e)
    })
}

fn rewrite_uri(uri: &Uri, path: &str) -> Result<Uri, DispatchError> {
    let path_and_query = match uri.query() {
        Some(query) => format!("{}?{}", path, query),
        None => path.to_string(),
    };
    let path_and_query = PathAndQuery::try_from(path_and_query.as_str())
        .map_err(|_| DispatchError::BadPath(path_and_query.clone()))?;

    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(path_and_query);
    Uri::from_parts(parts).map_err(|e| DispatchError::BadPath(e.to_string()))
}
