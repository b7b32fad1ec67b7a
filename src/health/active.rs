//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe one service's backend
//! - Feed results into the service's `HealthTracker`
//!
//! # Design Decisions
//! - One prober task per service, owned by the manager
//! - Every probe is bounded by its own timeout, independent of the interval
//! - Redirects are not followed: any status in [200, 400) is healthy
//! - Both the process shutdown and the service stop signal end the loop,
//!   including while a probe is in flight

use std::time::Duration;

use reqwest::{redirect, StatusCode};
use tokio::sync::broadcast;
use tokio::time::{self, Instant, MissedTickBehavior};
use url::Url;

use crate::config::ServiceSpec;
use crate::health::state::{HealthFlag, HealthTracker, Transition};
use crate::http::forward::backend_url;
use crate::lifecycle::StopSignal;
use crate::observability::metrics;

/// Result of a single probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Healthy(StatusCode),
    BadStatus(StatusCode),
    Error(String),
    Timeout,
}

impl ProbeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ProbeOutcome::Healthy(_))
    }

    fn from_status(status: StatusCode) -> Self {
        if (200..400).contains(&status.as_u16()) {
            ProbeOutcome::Healthy(status)
        } else {
            ProbeOutcome::BadStatus(status)
        }
    }
}

impl std::fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeOutcome::Healthy(status) => write!(f, "status {}", status),
            ProbeOutcome::BadStatus(status) => write!(f, "non-success status {}", status),
            ProbeOutcome::Error(e) => write!(f, "connection error: {}", e),
            ProbeOutcome::Timeout => write!(f, "timeout"),
        }
    }
}

/// Polls one backend's health endpoint.
pub struct Prober {
    service: String,
    url: Url,
    client: reqwest::Client,
    interval: Duration,
    timeout: Duration,
    tracker: HealthTracker,
}

impl Prober {
    pub fn new(spec: &ServiceSpec, flag: HealthFlag) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .danger_accept_invalid_certs(spec.tls.skip_verify)
            .user_agent("mesh-proxy-health-check")
            .build()?;

        Ok(Self {
            service: spec.name.clone(),
            url: backend_url(&spec.backend, &spec.health_check.path, None),
            client,
            interval: spec.health_check.interval,
            timeout: spec.health_check.timeout,
            tracker: HealthTracker::new(flag, spec.health_check.unhealthy_threshold),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Poll until either signal fires. The first probe runs one interval
    /// after start.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>, mut stop: StopSignal) {
        tracing::info!(
            service = %self.service,
            url = %self.url,
            interval_ms = self.interval.as_millis() as u64,
            threshold = self.tracker.threshold(),
            "Health prober starting"
        );

        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::debug!(service = %self.service, "Health prober received shutdown signal");
                    break;
                }
                _ = stop.stopped() => break,
                _ = ticker.tick() => {}
            }

            let outcome = tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                _ = stop.stopped() => break,
                outcome = self.probe() => outcome,
            };
            self.apply(outcome);
        }

        tracing::info!(service = %self.service, "Health prober stopped");
    }

    /// Probe once and apply the result.
    pub async fn check(&mut self) -> Option<Transition> {
        let outcome = self.probe().await;
        self.apply(outcome)
    }

    async fn probe(&self) -> ProbeOutcome {
        let request = self.client.get(self.url.clone()).send();
        match time::timeout(self.timeout, request).await {
            Ok(Ok(response)) => ProbeOutcome::from_status(response.status()),
            Ok(Err(e)) => ProbeOutcome::Error(e.to_string()),
            Err(_) => ProbeOutcome::Timeout,
        }
    }

    fn apply(&mut self, outcome: ProbeOutcome) -> Option<Transition> {
        let success = outcome.is_success();
        let transition = self.tracker.record(success);

        if !success {
            tracing::warn!(
                service = %self.service,
                failures = self.tracker.consecutive_failures(),
                threshold = self.tracker.threshold(),
                reason = %outcome,
                "Health check failed"
            );
        }

        match transition {
            Some(Transition::BecameUnhealthy { failures }) => {
                tracing::warn!(service = %self.service, failures, "Service marked UNHEALTHY");
            }
            Some(Transition::Recovered) => {
                tracing::info!(service = %self.service, "Service marked HEALTHY");
            }
            None => {}
        }

        metrics::record_service_health(&self.service, self.tracker.is_healthy());
        transition
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve_service, HealthCheckConfig, ServiceConfig};
    use std::sync::atomic::{AtomicU16, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Minimal backend answering every request with the current status.
    async fn status_backend(status: Arc<AtomicU16>) -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let code = status.load(Ordering::SeqCst);
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let _ = socket.read(&mut buf).await;
                    let response = format!(
                        "HTTP/1.1 {} Status\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                        code
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        addr
    }

    fn spec(backend: String, threshold: u32) -> ServiceSpec {
        resolve_service(&ServiceConfig {
            name: "api".into(),
            backend,
            health_check: HealthCheckConfig {
                enabled: true,
                path: "/health".into(),
                interval_ms: Some(10),
                timeout_ms: Some(200),
                unhealthy_threshold: Some(threshold),
            },
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn status_classification() {
        assert!(ProbeOutcome::from_status(StatusCode::OK).is_success());
        assert!(ProbeOutcome::from_status(StatusCode::FOUND).is_success());
        assert!(!ProbeOutcome::from_status(StatusCode::BAD_REQUEST).is_success());
        assert!(!ProbeOutcome::from_status(StatusCode::INTERNAL_SERVER_ERROR).is_success());
    }

    #[test]
    fn probe_url_joins_backend_path() {
        let prober = Prober::new(&spec("http://127.0.0.1:9001/base".into(), 3), HealthFlag::new()).unwrap();
        assert_eq!(prober.url().as_str(), "http://127.0.0.1:9001/base/health");
    }

    #[tokio::test]
    async fn check_tracks_backend_status() {
        let status = Arc::new(AtomicU16::new(500));
        let addr = status_backend(status.clone()).await;
        let flag = HealthFlag::new();
        let mut prober = Prober::new(&spec(format!("http://{}", addr), 2), flag.clone()).unwrap();

        assert_eq!(prober.check().await, None);
        assert!(flag.is_healthy());
        assert_eq!(
            prober.check().await,
            Some(Transition::BecameUnhealthy { failures: 2 })
        );
        assert!(!flag.is_healthy());

        status.store(302, Ordering::SeqCst);
        assert_eq!(prober.check().await, Some(Transition::Recovered));
        assert!(flag.is_healthy());
    }

    #[tokio::test]
    async fn unreachable_backend_fails() {
        // Bind then drop to get a port nothing listens on.
        let addr = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();
        let flag = HealthFlag::new();
        let mut prober = Prober::new(&spec(format!("http://{}", addr), 1), flag.clone()).unwrap();

        assert!(prober.check().await.is_some());
        assert!(!flag.is_healthy());
    }

    #[tokio::test]
    async fn run_exits_on_stop() {
        let (handle, signal) = crate::lifecycle::stop_channel();
        let shutdown = crate::lifecycle::Shutdown::new();
        let prober = Prober::new(&spec("http://127.0.0.1:1".into(), 3), HealthFlag::new()).unwrap();

        let task = tokio::spawn(prober.run(shutdown.subscribe(), signal));
        handle.stop();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("prober should exit promptly")
            .unwrap();
    }

    #[tokio::test]
    async fn run_exits_on_shutdown() {
        let (_handle, signal) = crate::lifecycle::stop_channel();
        let shutdown = crate::lifecycle::Shutdown::new();
        let prober = Prober::new(&spec("http://127.0.0.1:1".into(), 3), HealthFlag::new()).unwrap();

        let task = tokio::spawn(prober.run(shutdown.subscribe(), signal));
        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("prober should exit promptly")
            .unwrap();
    }
}
