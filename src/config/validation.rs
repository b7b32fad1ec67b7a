//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check service names, backends and health check settings
//! - Detect duplicate service names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure: it never fills defaults or touches the network
//! - Runs at load and again for every service added at runtime

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::{ProxyConfig, ServiceConfig};

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("auth_key is required")]
    MissingAuthKey,

    #[error("service #{index}: name is required")]
    MissingName { index: usize },

    #[error("service {name}: name must only contain lowercase letters, digits and '-'")]
    InvalidName { name: String },

    #[error("duplicate service name: {name}")]
    DuplicateName { name: String },

    #[error("service {name}: backend URL is required")]
    MissingBackend { name: String },

    #[error("service {name}: invalid backend URL {backend}: {reason}")]
    InvalidBackend {
        name: String,
        backend: String,
        reason: String,
    },

    #[error("service {name}: path prefix {path:?} must start with '/'")]
    InvalidPath { name: String, path: String },

    #[error("service {name}: health_check.path is required when health checks are enabled")]
    MissingHealthPath { name: String },

    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },
}

/// Validate a complete configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.auth_key.trim().is_empty() {
        errors.push(ValidationError::MissingAuthKey);
    }

    if let Some(addr) = &config.admin.bind_address {
        check_address("admin.bind_address", addr, &mut errors);
    }
    if let Some(addr) = &config.metrics.address {
        check_address("metrics.address", addr, &mut errors);
    }

    let mut seen = HashSet::new();
    for (index, service) in config.services.iter().enumerate() {
        if service.name.is_empty() {
            errors.push(ValidationError::MissingName { index });
        } else if !seen.insert(service.name.as_str()) {
            errors.push(ValidationError::DuplicateName {
                name: service.name.clone(),
            });
        }
        collect_service_errors(service, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate one service in isolation.
pub fn validate_service(service: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    if service.name.is_empty() {
        errors.push(ValidationError::MissingName { index: 0 });
    }
    collect_service_errors(service, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Returns true if `name` is non-empty and only `[a-z0-9-]`.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

fn collect_service_errors(service: &ServiceConfig, errors: &mut Vec<ValidationError>) {
    let name = &service.name;

    if !name.is_empty() && !is_valid_name(name) {
        errors.push(ValidationError::InvalidName { name: name.clone() });
    }

    if service.backend.is_empty() {
        errors.push(ValidationError::MissingBackend { name: name.clone() });
    } else if let Err(reason) = check_backend(&service.backend) {
        errors.push(ValidationError::InvalidBackend {
            name: name.clone(),
            backend: service.backend.clone(),
            reason,
        });
    }

    for path in &service.paths {
        if !path.starts_with('/') {
            errors.push(ValidationError::InvalidPath {
                name: name.clone(),
                path: path.clone(),
            });
        }
    }

    if service.health_check.enabled && service.health_check.path.is_empty() {
        errors.push(ValidationError::MissingHealthPath { name: name.clone() });
    }
}

fn check_backend(backend: &str) -> Result<(), String> {
    let url = Url::parse(backend).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(format!("scheme must be http or https, got {}", other)),
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err("missing host".to_string());
    }
    Ok(())
}

fn check_address(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::HealthCheckConfig;

    fn service(name: &str, backend: &str) -> ServiceConfig {
        ServiceConfig {
            name: name.into(),
            backend: backend.into(),
            ..Default::default()
        }
    }

    fn config(services: Vec<ServiceConfig>) -> ProxyConfig {
        ProxyConfig {
            auth_key: "key".into(),
            services,
            ..Default::default()
        }
    }

    #[test]
    fn accepts_valid_config() {
        let cfg = config(vec![
            service("api", "http://127.0.0.1:9001"),
            service("web-2", "https://backend.internal"),
        ]);
        assert!(validate_config(&cfg).is_ok());
    }

    #[test]
    fn requires_auth_key() {
        let mut cfg = config(vec![]);
        cfg.auth_key = String::new();
        assert_eq!(
            validate_config(&cfg).unwrap_err(),
            vec![ValidationError::MissingAuthKey]
        );
    }

    #[test]
    fn reports_every_error() {
        let cfg = config(vec![
            service("", "http://a"),
            service("Bad_Name", "ftp://a"),
            service("dup", "http://a"),
            service("dup", ""),
        ]);
        let errors = validate_config(&cfg).unwrap_err();

        assert!(errors.contains(&ValidationError::MissingName { index: 0 }));
        assert!(errors.contains(&ValidationError::InvalidName {
            name: "Bad_Name".into()
        }));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidBackend { name, .. } if name == "Bad_Name")));
        assert!(errors.contains(&ValidationError::DuplicateName { name: "dup".into() }));
        assert!(errors.contains(&ValidationError::MissingBackend { name: "dup".into() }));
    }

    #[test]
    fn rejects_malformed_backend() {
        let errors = validate_service(&service("api", "not a url")).unwrap_err();
        assert!(matches!(errors[0], ValidationError::InvalidBackend { .. }));
    }

    #[test]
    fn health_check_needs_path() {
        let mut svc = service("api", "http://127.0.0.1:9001");
        svc.health_check = HealthCheckConfig {
            enabled: true,
            ..Default::default()
        };
        assert_eq!(
            validate_service(&svc).unwrap_err(),
            vec![ValidationError::MissingHealthPath { name: "api".into() }]
        );

        svc.health_check.enabled = false;
        assert!(validate_service(&svc).is_ok());
    }

    #[test]
    fn path_prefixes_must_be_absolute() {
        let mut svc = service("api", "http://127.0.0.1:9001");
        svc.paths = vec!["/ok".into(), "api".into()];
        assert_eq!(
            validate_service(&svc).unwrap_err(),
            vec![ValidationError::InvalidPath {
                name: "api".into(),
                path: "api".into()
            }]
        );
    }

    #[test]
    fn name_charset() {
        assert!(is_valid_name("api-2"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("API"));
        assert!(!is_valid_name("a.b"));
    }

    #[test]
    fn rejects_bad_admin_address() {
        let mut cfg = config(vec![]);
        cfg.admin.bind_address = Some("localhost".into());
        assert!(matches!(
            validate_config(&cfg).unwrap_err()[0],
            ValidationError::InvalidAddress { field: "admin.bind_address", .. }
        ));
    }
}
