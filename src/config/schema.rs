//! Configuration schema definitions.
//!
//! This module defines the on-disk configuration structure for the proxy.
//! All types derive Serde traits for (de)serialization from the config file.
//! Optional fields stay unset here; defaults are applied when a service is
//! resolved (see `resolve.rs`) so the file round-trips without gaining values
//! the operator never wrote.

use serde::{Deserialize, Serialize};

/// Default directory holding per-service identity state.
pub const DEFAULT_STATE_DIR: &str = "/data/mesh-proxy";

/// Default bind address of the administrative API.
pub const DEFAULT_ADMIN_ADDRESS: &str = "0.0.0.0:8080";

/// Default bind address of the metrics endpoint.
pub const DEFAULT_METRICS_ADDRESS: &str = "0.0.0.0:9090";

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ProxyConfig {
    /// Credential used to provision service identities.
    pub auth_key: String,

    /// Credential used to deregister identities from the directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Directory holding per-service identity state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<String>,

    /// Identity provisioning settings.
    pub identity: IdentityConfig,

    /// Administrative API settings.
    pub admin: AdminConfig,

    /// Metrics endpoint settings.
    pub metrics: MetricsConfig,

    /// Log output settings.
    pub logging: LoggingConfig,

    /// Proxied services.
    pub services: Vec<ServiceConfig>,
}

impl ProxyConfig {
    /// State directory, falling back to the default.
    pub fn state_dir(&self) -> &str {
        self.state_dir.as_deref().unwrap_or(DEFAULT_STATE_DIR)
    }
}

/// Settings for the local identity provider.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct IdentityConfig {
    /// Host the per-service listeners bind to.
    pub bind_host: String,

    /// Certificate (PEM) served by the encrypted listener.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_cert: Option<String>,

    /// Private key (PEM) for `tls_cert`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_key: Option<String>,

    /// Base URL of the external device directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory_url: Option<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            bind_host: "127.0.0.1".to_string(),
            tls_cert: None,
            tls_key: None,
            directory_url: None,
        }
    }
}

/// Administrative API configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AdminConfig {
    /// Serve the administrative API.
    pub enabled: bool,

    /// Bind address; `DEFAULT_ADMIN_ADDRESS` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,

    /// Bearer token required by the API when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl AdminConfig {
    pub fn bind_address(&self) -> &str {
        self.bind_address.as_deref().unwrap_or(DEFAULT_ADMIN_ADDRESS)
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: None,
            api_key: None,
        }
    }
}

/// Metrics endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Expose the Prometheus endpoint.
    pub enabled: bool,

    /// Bind address; `DEFAULT_METRICS_ADDRESS` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl MetricsConfig {
    pub fn address(&self) -> &str {
        self.address.as_deref().unwrap_or(DEFAULT_METRICS_ADDRESS)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,

    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Plain,
        }
    }
}

/// A single proxied service as written in the config file.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Externally routable name; `[a-z0-9-]+`.
    pub name: String,

    /// Backend base URL (http or https).
    pub backend: String,

    /// Path prefixes routed to the backend, checked in order. Empty matches all.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,

    /// Remove the matched prefix before forwarding.
    pub strip_prefix: bool,

    /// Active health check settings.
    pub health_check: HealthCheckConfig,

    /// Backend TLS settings.
    pub tls: BackendTlsConfig,
}

/// Health check configuration for one service.
///
/// Zero or unset numeric fields take their defaults.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Path probed on the backend.
    pub path: String,

    /// Probe interval in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<u64>,

    /// Per-probe timeout in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Consecutive failures before marking the service unhealthy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unhealthy_threshold: Option<u32>,
}

/// TLS settings for the connection to the backend.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct BackendTlsConfig {
    /// The backend speaks TLS.
    pub enabled: bool,

    /// Accept any backend certificate.
    pub skip_verify: bool,
}
