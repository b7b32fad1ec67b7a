//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by service, method, status
//! - `proxy_request_duration_seconds` (histogram): latency by service, method
//! - `proxy_service_health` (gauge): 1=healthy, 0=unhealthy or removed
//! - `proxy_services` (gauge): registered service count
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, which keeps tests quiet
//! - The Prometheus exporter is installed once by the binary

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record the outcome of one proxied request.
pub fn record_request(service: &str, method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "proxy_requests_total",
        "service" => service.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    metrics::histogram!(
        "proxy_request_duration_seconds",
        "service" => service.to_string(),
        "method" => method.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record the current health of a service.
pub fn record_service_health(service: &str, healthy: bool) {
    metrics::gauge!("proxy_service_health", "service" => service.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

/// Zero the health series of a service that is no longer running.
pub fn clear_service_health(service: &str) {
    metrics::gauge!("proxy_service_health", "service" => service.to_string()).set(0.0);
}

/// Record the number of registered services.
pub fn record_service_count(count: usize) {
    metrics::gauge!("proxy_services").set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gauge_value(rendered: &str, series: &str) -> Option<f64> {
        rendered
            .lines()
            .find_map(|line| line.strip_prefix(series))
            .and_then(|value| value.trim().parse().ok())
    }

    #[test]
    fn cleared_service_reads_zero() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let series = r#"proxy_service_health{service="api"}"#;

        metrics::with_local_recorder(&recorder, || record_service_health("api", true));
        assert_eq!(gauge_value(&handle.render(), series), Some(1.0));

        metrics::with_local_recorder(&recorder, || clear_service_health("api"));
        assert_eq!(gauge_value(&handle.render(), series), Some(0.0));
    }

    #[test]
    fn service_count_gauge() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || record_service_count(3));
        assert_eq!(gauge_value(&handle.render(), "proxy_services"), Some(3.0));
    }
}
