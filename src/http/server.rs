//! Per-service HTTP listeners.
//!
//! # Responsibilities
//! - Build the Axum router that sends every path to the dispatcher
//! - Wire up middleware (tracing, request ID, listener scheme)
//! - Serve the plaintext and TLS listeners until the service is stopped
//!
//! # Design Decisions
//! - Each router owns an `Arc<ServiceState>`; no registry access per request
//! - Stopping a service stops accepting and lets open requests finish;
//!   the manager bounds how long it waits for them

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::{Extension, Router};
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::http::headers::ListenerScheme;
use crate::http::request::{RequestIdExt, RequestIdLayer};
use crate::lifecycle::StopSignal;
use crate::registry::ServiceState;
use crate::routing::dispatch;

/// Time given to open TLS connections once a stop is signalled.
const TLS_DRAIN: Duration = Duration::from_secs(5);

/// Build the router serving one service on one listener.
pub fn service_router(state: Arc<ServiceState>, scheme: ListenerScheme) -> Router {
    Router::new()
        .route("/", any(proxy_handler))
        .route("/{*path}", any(proxy_handler))
        .with_state(state)
        .layer(Extension(scheme))
        .layer(TraceLayer::new_for_http())
        .layer(RequestIdLayer)
}

async fn proxy_handler(
    State(state): State<Arc<ServiceState>>,
    request: Request<Body>,
) -> Response {
    let request_id = request.request_id().unwrap_or("unknown").to_string();
    tracing::debug!(
        request_id = %request_id,
        service = %state.name(),
        method = %request.method(),
        path = %request.uri().path(),
        "Proxying request"
    );

    match dispatch(&state, request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!(request_id = %request_id, service = %state.name(), error = %e, "Answered locally");
            e.into_response()
        }
    }
}

/// Serve `router` on a plaintext listener until `stop` fires.
pub async fn serve_plaintext(
    listener: TcpListener,
    router: Router,
    mut stop: StopSignal,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Plaintext listener started");

    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move { stop.stopped().await })
        .await?;

    tracing::info!(address = %addr, "Plaintext listener stopped");
    Ok(())
}

/// Serve `router` over TLS until `stop` fires.
pub async fn serve_encrypted(
    listener: std::net::TcpListener,
    tls: RustlsConfig,
    router: Router,
    mut stop: StopSignal,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "TLS listener started");

    let handle = Handle::new();
    let stopper = handle.clone();
    let watcher = tokio::spawn(async move {
        stop.stopped().await;
        stopper.graceful_shutdown(Some(TLS_DRAIN));
    });

    let result = axum_server::from_tcp_rustls(listener, tls)
        .handle(handle)
        .serve(router.into_make_service_with_connect_info::<SocketAddr>())
        .await;

    watcher.abort();
    tracing::info!(address = %addr, "TLS listener stopped");
    result
}
