//! Shared utilities for integration testing.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use mesh_proxy::config::{HealthCheckConfig, ServiceConfig};
use mesh_proxy::identity::{Identity, IdentityProvider, ProvisionError, Provisioned};

/// A request as seen by a mock backend.
#[derive(Debug, Clone, Default)]
pub struct SeenRequest {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl SeenRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Start a programmable mock backend on an ephemeral port.
pub async fn start_programmable_backend<F>(f: F) -> SocketAddr
where
    F: Fn(&SeenRequest) -> (u16, String) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                let _ = serve_one(socket, f.as_ref()).await;
            });
        }
    });

    addr
}

/// Backend answering every request with the current value of `status`.
pub async fn status_backend(status: Arc<AtomicU16>) -> SocketAddr {
    start_programmable_backend(move |_| (status.load(Ordering::SeqCst), "ok".to_string())).await
}

/// Backend recording every request and echoing the request target.
pub async fn recording_backend() -> (SocketAddr, Arc<Mutex<Vec<SeenRequest>>>) {
    let seen: Arc<Mutex<Vec<SeenRequest>>> = Arc::default();
    let log = seen.clone();
    let addr = start_programmable_backend(move |request| {
        log.lock().unwrap().push(request.clone());
        (200, request.target.clone())
    })
    .await;
    (addr, seen)
}

async fn serve_one<F>(mut socket: TcpStream, f: &F) -> std::io::Result<()>
where
    F: Fn(&SeenRequest) -> (u16, String),
{
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos;
        }
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap_or_default().split(' ');
    let mut request = SeenRequest {
        method: request_line.next().unwrap_or_default().to_string(),
        target: request_line.next().unwrap_or_default().to_string(),
        ..Default::default()
    };
    for line in lines {
        if let Some((k, v)) = line.split_once(':') {
            request.headers.push((k.trim().to_string(), v.trim().to_string()));
        }
    }

    let mut rest = buf[head_end + 4..].to_vec();
    if let Some(len) = request.header("content-length").and_then(|v| v.parse::<usize>().ok()) {
        while rest.len() < len {
            let n = socket.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            rest.extend_from_slice(&chunk[..n]);
        }
        request.body = rest;
    } else if request
        .header("transfer-encoding")
        .is_some_and(|v| v.eq_ignore_ascii_case("chunked"))
    {
        while find(&rest, b"0\r\n\r\n").is_none() {
            let n = socket.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            rest.extend_from_slice(&chunk[..n]);
        }
        request.body = dechunk(&rest);
    }

    let (status, body) = f(&request);
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason(status),
        body.len(),
        body
    );
    socket.write_all(response.as_bytes()).await?;
    socket.shutdown().await
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn dechunk(mut data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    while let Some(line_end) = find(data, b"\r\n") {
        let size = std::str::from_utf8(&data[..line_end])
            .ok()
            .and_then(|s| usize::from_str_radix(s.trim(), 16).ok())
            .unwrap_or(0);
        if size == 0 {
            break;
        }
        let start = line_end + 2;
        out.extend_from_slice(&data[start..start + size]);
        data = &data[start + size + 2..];
    }
    out
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        301 => "Moved Permanently",
        404 => "Not Found",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Status",
    }
}

/// Identity provider binding loopback listeners, with failure injection.
#[derive(Debug, Default)]
pub struct StubProvider {
    pub provisioned: AtomicUsize,
    pub released: AtomicUsize,
    pub fail_provision: AtomicBool,
    pub fail_release: AtomicBool,
}

impl StubProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn provisioned(&self) -> usize {
        self.provisioned.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for StubProvider {
    async fn provision(&self, name: &str) -> Result<Provisioned, ProvisionError> {
        // Let concurrent callers interleave here.
        tokio::task::yield_now().await;

        if self.fail_provision.load(Ordering::SeqCst) {
            return Err(ProvisionError::Directory("injected provisioning failure".into()));
        }

        let plaintext = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(ProvisionError::Bind)?;
        self.provisioned.fetch_add(1, Ordering::SeqCst);

        Ok(Provisioned {
            identity: Identity {
                id: uuid::Uuid::new_v4().to_string(),
                hostname: name.to_string(),
                plaintext_addr: plaintext.local_addr().map_err(ProvisionError::Bind)?,
                tls_addr: None,
            },
            plaintext,
            encrypted: None,
        })
    }

    async fn release(&self, _identity: Identity) -> Result<(), ProvisionError> {
        self.released.fetch_add(1, Ordering::SeqCst);
        if self.fail_release.load(Ordering::SeqCst) {
            return Err(ProvisionError::Directory("injected release failure".into()));
        }
        Ok(())
    }
}

/// Minimal service config pointing at `backend`.
pub fn service(name: &str, backend: SocketAddr) -> ServiceConfig {
    ServiceConfig {
        name: name.to_string(),
        backend: format!("http://{}", backend),
        ..Default::default()
    }
}

/// Service config with fast active health checks.
pub fn checked_service(name: &str, backend: SocketAddr, interval_ms: u64, threshold: u32) -> ServiceConfig {
    ServiceConfig {
        health_check: HealthCheckConfig {
            enabled: true,
            path: "/health".to_string(),
            interval_ms: Some(interval_ms),
            timeout_ms: Some(200),
            unhealthy_threshold: Some(threshold),
        },
        ..service(name, backend)
    }
}

/// Poll `check` until it returns true or `timeout` elapses.
pub async fn wait_until<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check().await
}

/// Client that ignores proxy environment variables.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}
