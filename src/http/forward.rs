//! Forwarding primitive: sends a request to one backend and streams the
//! response back.
//!
//! # Design Decisions
//! - One client per service, so backend TLS options stay per service
//! - Redirects are passed through to the caller, never followed
//! - Request and response bodies are streamed, not buffered
//! - Any failure before response headers arrive is a `TransportError`

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, Bytes, HttpBody};
use axum::extract::ConnectInfo;
use axum::http::{Request, Response};
use futures_util::StreamExt;
use reqwest::redirect;
use thiserror::Error;
use tokio::sync::mpsc;
use url::Url;

use crate::config::ServiceSpec;
use crate::http::headers::{self, ListenerScheme};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Backend unreachable or misbehaving at request time.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to build backend client: {0}")]
    Client(String),

    #[error("backend request failed: {0}")]
    Upstream(#[from] reqwest::Error),
}

/// Forwards requests to a single backend.
#[async_trait]
pub trait Forwarder: Send + Sync {
    /// Forward `request`, whose URI holds the already rewritten path and query.
    async fn forward(&self, request: Request<Body>) -> Result<Response<Body>, TransportError>;
}

/// Builds the forwarder bound to a service's backend.
pub trait ForwarderFactory: Send + Sync {
    fn build(&self, spec: &ServiceSpec) -> Result<Arc<dyn Forwarder>, TransportError>;
}

/// Factory for `HttpForwarder`.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpForwarderFactory;

impl ForwarderFactory for HttpForwarderFactory {
    fn build(&self, spec: &ServiceSpec) -> Result<Arc<dyn Forwarder>, TransportError> {
        Ok(Arc::new(HttpForwarder::new(spec)?))
    }
}

/// reqwest-backed forwarder.
#[derive(Debug)]
pub struct HttpForwarder {
    client: reqwest::Client,
    backend: Url,
}

impl HttpForwarder {
    pub fn new(spec: &ServiceSpec) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .danger_accept_invalid_certs(spec.tls.skip_verify)
            .connect_timeout(CONNECT_TIMEOUT)
            .no_proxy()
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        Ok(Self {
            client,
            backend: spec.backend.clone(),
        })
    }
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn forward(&self, request: Request<Body>) -> Result<Response<Body>, TransportError> {
        let (parts, body) = request.into_parts();
        let url = backend_url(&self.backend, parts.uri.path(), parts.uri.query());

        let client_ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip());
        let scheme = parts
            .extensions
            .get::<ListenerScheme>()
            .copied()
            .unwrap_or_default();

        let mut outbound = parts.headers;
        headers::prepare_upstream(&mut outbound, client_ip, scheme);

        let mut upstream = self.client.request(parts.method, url).headers(outbound);
        if body.size_hint().exact() != Some(0) {
            upstream = upstream.body(stream_body(body));
        }

        let response = upstream.send().await?;

        let status = response.status();
        let mut inbound = response.headers().clone();
        headers::strip_hop_by_hop(&mut inbound);

        let mut forwarded = Response::new(Body::from_stream(response.bytes_stream()));
        *forwarded.status_mut() = status;
        *forwarded.headers_mut() = inbound;
        Ok(forwarded)
    }
}

/// Join `path` onto the backend base path with a single slash between them
/// and merge the backend's query with `query`.
pub fn backend_url(base: &Url, path: &str, query: Option<&str>) -> Url {
    let mut url = base.clone();
    url.set_path(&join_path(base.path(), path));

    let merged: Vec<&str> = [base.query(), query]
        .into_iter()
        .flatten()
        .filter(|q| !q.is_empty())
        .collect();
    if merged.is_empty() {
        url.set_query(None);
    } else {
        url.set_query(Some(&merged.join("&")));
    }
    url
}

fn join_path(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) => format!("{}/{}", base, path),
        _ => format!("{}{}", base, path),
    }
}

/// Pump the client body through a channel so the outbound body is `Sync`.
fn stream_body(body: Body) -> reqwest::Body {
    let (tx, mut rx) = mpsc::channel::<Result<Bytes, axum::Error>>(8);
    tokio::spawn(async move {
        let mut chunks = body.into_data_stream();
        while let Some(chunk) = chunks.next().await {
            if tx.send(chunk).await.is_err() {
                break;
            }
        }
    });
    reqwest::Body::wrap_stream(futures_util::stream::poll_fn(move |cx| rx.poll_recv(cx)))
}
