//! Live state of one registered service.

use std::net::SocketAddr;
use std::sync::Arc;

use serde::Serialize;

use crate::config::ServiceSpec;
use crate::health::HealthFlag;
use crate::http::forward::Forwarder;
use crate::routing::matcher::PathRules;

/// Everything the dispatcher needs for a request, shared by `Arc`.
///
/// Listener tasks hold their own `Arc`, so a request in flight while the
/// service is being removed still completes against a consistent state.
pub struct ServiceState {
    spec: ServiceSpec,
    rules: PathRules,
    health: HealthFlag,
    forwarder: Arc<dyn Forwarder>,
    listeners: Listeners,
}

/// Addresses the service is reachable on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Listeners {
    pub plaintext: Option<SocketAddr>,
    pub encrypted: Option<SocketAddr>,
}

impl ServiceState {
    pub fn new(spec: ServiceSpec, forwarder: Arc<dyn Forwarder>) -> Self {
        Self::with_listeners(spec, forwarder, Listeners::default())
    }

    pub fn with_listeners(
        spec: ServiceSpec,
        forwarder: Arc<dyn Forwarder>,
        listeners: Listeners,
    ) -> Self {
        let rules = PathRules::new(spec.paths.clone(), spec.strip_prefix);
        Self {
            spec,
            rules,
            health: HealthFlag::new(),
            forwarder,
            listeners,
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &ServiceSpec {
        &self.spec
    }

    pub fn rules(&self) -> &PathRules {
        &self.rules
    }

    pub fn health(&self) -> &HealthFlag {
        &self.health
    }

    pub fn is_healthy(&self) -> bool {
        self.health.is_healthy()
    }

    pub fn forwarder(&self) -> &Arc<dyn Forwarder> {
        &self.forwarder
    }

    pub fn listeners(&self) -> Listeners {
        self.listeners
    }
}

impl std::fmt::Debug for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceState")
            .field("spec", &self.spec)
            .field("healthy", &self.is_healthy())
            .field("listeners", &self.listeners)
            .finish_non_exhaustive()
    }
}

/// Point-in-time copy of a service for status queries.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSnapshot {
    pub spec: ServiceSpec,
    pub healthy: bool,
    pub listeners: Listeners,
}

impl From<&ServiceState> for ServiceSnapshot {
    fn from(state: &ServiceState) -> Self {
        Self {
            spec: state.spec.clone(),
            healthy: state.is_healthy(),
            listeners: state.listeners,
        }
    }
}
