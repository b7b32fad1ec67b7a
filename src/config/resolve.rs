//! Default filling: turns a validated `ServiceConfig` into a complete,
//! immutable `ServiceSpec`.

use std::time::Duration;

use url::Url;

use crate::config::schema::{BackendTlsConfig, HealthCheckConfig, ServiceConfig};
use crate::config::validation::{validate_service, ValidationError};

pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_UNHEALTHY_THRESHOLD: u32 = 3;

/// A fully resolved service definition. Immutable once accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSpec {
    pub name: String,
    pub backend: Url,
    pub paths: Vec<String>,
    pub strip_prefix: bool,
    pub health_check: HealthCheckSpec,
    pub tls: BackendTlsConfig,
}

/// Resolved health check parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheckSpec {
    pub enabled: bool,
    pub path: String,
    pub interval: Duration,
    pub timeout: Duration,
    pub unhealthy_threshold: u32,
}

impl HealthCheckSpec {
    /// Fill unset or zero fields with defaults.
    pub fn from_config(config: &HealthCheckConfig) -> Self {
        Self {
            enabled: config.enabled,
            path: config.path.clone(),
            interval: millis_or(config.interval_ms, DEFAULT_HEALTH_INTERVAL),
            timeout: millis_or(config.timeout_ms, DEFAULT_HEALTH_TIMEOUT),
            unhealthy_threshold: config
                .unhealthy_threshold
                .filter(|t| *t > 0)
                .unwrap_or(DEFAULT_UNHEALTHY_THRESHOLD),
        }
    }
}

impl ServiceSpec {
    /// Fill defaults on an already validated config.
    ///
    /// Returns `None` only if the backend URL does not parse, which
    /// validation rules out.
    pub fn from_config(config: &ServiceConfig) -> Option<Self> {
        let backend = Url::parse(&config.backend).ok()?;
        Some(Self {
            name: config.name.clone(),
            backend,
            paths: config.paths.clone(),
            strip_prefix: config.strip_prefix,
            health_check: HealthCheckSpec::from_config(&config.health_check),
            tls: config.tls,
        })
    }

    /// Convert back to the on-disk shape, with defaults written out.
    pub fn to_config(&self) -> ServiceConfig {
        ServiceConfig {
            name: self.name.clone(),
            backend: self.backend.to_string(),
            paths: self.paths.clone(),
            strip_prefix: self.strip_prefix,
            health_check: HealthCheckConfig {
                enabled: self.health_check.enabled,
                path: self.health_check.path.clone(),
                interval_ms: Some(self.health_check.interval.as_millis() as u64),
                timeout_ms: Some(self.health_check.timeout.as_millis() as u64),
                unhealthy_threshold: Some(self.health_check.unhealthy_threshold),
            },
            tls: self.tls,
        }
    }
}

/// Validate, then fill defaults.
pub fn resolve_service(config: &ServiceConfig) -> Result<ServiceSpec, Vec<ValidationError>> {
    validate_service(config)?;
    ServiceSpec::from_config(config).ok_or_else(|| {
        vec![ValidationError::InvalidBackend {
            name: config.name.clone(),
            backend: config.backend.clone(),
            reason: "unparseable URL".to_string(),
        }]
    })
}

fn millis_or(value: Option<u64>, default: Duration) -> Duration {
    value
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_health_defaults() {
        let cfg = ServiceConfig {
            name: "api".into(),
            backend: "http://127.0.0.1:9001".into(),
            health_check: HealthCheckConfig {
                enabled: true,
                path: "/health".into(),
                interval_ms: Some(0),
                ..Default::default()
            },
            ..Default::default()
        };

        let spec = resolve_service(&cfg).unwrap();
        assert_eq!(spec.health_check.interval, DEFAULT_HEALTH_INTERVAL);
        assert_eq!(spec.health_check.timeout, DEFAULT_HEALTH_TIMEOUT);
        assert_eq!(spec.health_check.unhealthy_threshold, 3);
        assert_eq!(spec.backend.as_str(), "http://127.0.0.1:9001/");
    }

    #[test]
    fn keeps_explicit_values() {
        let cfg = HealthCheckConfig {
            enabled: true,
            path: "/ready".into(),
            interval_ms: Some(10),
            timeout_ms: Some(250),
            unhealthy_threshold: Some(2),
        };
        let spec = HealthCheckSpec::from_config(&cfg);
        assert_eq!(spec.interval, Duration::from_millis(10));
        assert_eq!(spec.timeout, Duration::from_millis(250));
        assert_eq!(spec.unhealthy_threshold, 2);
    }

    #[test]
    fn filling_does_not_touch_input() {
        let cfg = ServiceConfig {
            name: "api".into(),
            backend: "http://127.0.0.1:9001".into(),
            ..Default::default()
        };
        let before = cfg.clone();
        let _ = resolve_service(&cfg).unwrap();
        assert_eq!(cfg, before);
    }

    #[test]
    fn invalid_config_is_rejected_before_filling() {
        let cfg = ServiceConfig {
            name: "api".into(),
            backend: "mailto:ops@example.com".into(),
            ..Default::default()
        };
        assert!(resolve_service(&cfg).is_err());
    }
}
