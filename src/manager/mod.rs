//! Service lifecycle orchestration.
//!
//! # Data Flow
//! ```text
//! add_service(config)
//!     → resolve (validate + defaults)
//!     → registry.reserve(name)
//!     → provision identity + listeners
//!     → build forwarder + prober
//!     → spawn listener tasks + prober task
//!     → registry.commit
//!
//! remove_service(name)
//!     → registry.take(name)        (name stays reserved)
//!     → stop signal → join prober → drain listeners → release identity
//!     → registry.release(name)
//! ```
//!
//! # Design Decisions
//! - A failed add leaves nothing behind: every acquired resource is released
//!   before the reservation is dropped
//! - Teardown consumes `ServiceResources`, so nothing is released twice
//! - Shutdown closes the registry first; an add racing it tears down what it
//!   built and reports `ShuttingDown`

pub mod error;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::task::JoinHandle;

use crate::config::{resolve_service, ServiceConfig, ServiceSpec};
use crate::health::Prober;
use crate::http::forward::ForwarderFactory;
use crate::http::headers::ListenerScheme;
use crate::http::server::{serve_encrypted, serve_plaintext, service_router};
use crate::identity::{Identity, IdentityProvider, ProvisionError, Provisioned};
use crate::lifecycle::{stop_channel, Shutdown, StopHandle, StopSignal, TaskTracker};
use crate::observability::metrics;
use crate::registry::{Listeners, Registry, ServiceEntry, ServiceSnapshot, ServiceState};

pub use error::ManagerError;

const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything a registered service owns besides its shared state.
#[derive(Debug)]
pub struct ServiceResources {
    identity: Identity,
    stop: StopHandle,
    listeners: Vec<JoinHandle<()>>,
    prober: Option<JoinHandle<()>>,
}

type Entry = ServiceEntry<ServiceResources>;

/// Owns every running service.
pub struct Manager {
    registry: Registry<ServiceResources>,
    provider: Arc<dyn IdentityProvider>,
    forwarders: Arc<dyn ForwarderFactory>,
    shutdown: Shutdown,
    probers: TaskTracker,
    listeners: TaskTracker,
    drain_timeout: Duration,
}

impl Manager {
    pub fn new(provider: Arc<dyn IdentityProvider>, forwarders: Arc<dyn ForwarderFactory>) -> Self {
        Self {
            registry: Registry::new(),
            provider,
            forwarders,
            shutdown: Shutdown::new(),
            probers: TaskTracker::new(),
            listeners: TaskTracker::new(),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }

    /// Bound on how long teardown waits for in-flight requests.
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Validate, provision and start a service.
    pub async fn add_service(&self, config: ServiceConfig) -> Result<ServiceSnapshot, ManagerError> {
        let spec = resolve_service(&config).map_err(ManagerError::Validation)?;
        let name = spec.name.clone();

        self.registry.reserve(&name).await?;

        let entry = match self.start(spec).await {
            Ok(entry) => entry,
            Err(e) => {
                self.registry.abandon(&name).await;
                tracing::error!(service = %name, error = %e, "Failed to add service");
                return Err(e);
            }
        };
        let snapshot = ServiceSnapshot::from(entry.state.as_ref());

        match self.registry.commit(entry).await {
            Ok(count) => {
                metrics::record_service_count(count);
                tracing::info!(
                    service = %name,
                    backend = %snapshot.spec.backend,
                    address = ?snapshot.listeners.plaintext,
                    "Service added"
                );
                Ok(snapshot)
            }
            Err(entry) => {
                tracing::warn!(service = %name, "Shutdown started during add, tearing down");
                if let Err(e) = self.teardown(entry).await {
                    tracing::error!(service = %name, error = %e, "Teardown after aborted add failed");
                }
                Err(ManagerError::ShuttingDown)
            }
        }
    }

    /// Stop a service and release its identity.
    ///
    /// The service is gone from the registry even when releasing the
    /// identity fails; that failure is still reported.
    pub async fn remove_service(&self, name: &str) -> Result<(), ManagerError> {
        let entry = self
            .registry
            .take(name)
            .await
            .ok_or_else(|| ManagerError::NotFound(name.to_string()))?;
        metrics::record_service_count(self.registry.len().await);

        let result = self.teardown(entry).await;
        self.registry.release(name).await;

        match result {
            Ok(()) => {
                tracing::info!(service = %name, "Service removed");
                Ok(())
            }
            Err(e) => {
                tracing::error!(service = %name, error = %e, "Service removed, identity release failed");
                Err(ManagerError::Provisioning(e.to_string()))
            }
        }
    }

    pub async fn get(&self, name: &str) -> Option<ServiceSnapshot> {
        self.registry
            .get(name)
            .await
            .map(|state| ServiceSnapshot::from(state.as_ref()))
    }

    /// Snapshots of every service, sorted by name.
    pub async fn list(&self) -> Vec<ServiceSnapshot> {
        self.registry
            .list()
            .await
            .iter()
            .map(|state| ServiceSnapshot::from(state.as_ref()))
            .collect()
    }

    /// Health of every service by name.
    pub async fn health(&self) -> BTreeMap<String, bool> {
        self.registry
            .list()
            .await
            .iter()
            .map(|state| (state.name().to_string(), state.is_healthy()))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.registry.len().await
    }

    pub async fn is_empty(&self) -> bool {
        self.registry.is_empty().await
    }

    /// Prober tasks still running.
    pub fn active_probers(&self) -> usize {
        self.probers.active()
    }

    /// Listener tasks still running.
    pub fn active_listeners(&self) -> usize {
        self.listeners.active()
    }

    /// Stop every service. Further adds fail with `ShuttingDown`.
    pub async fn shutdown(&self) {
        self.shutdown.trigger();
        let entries = self.registry.close().await;
        tracing::info!(services = entries.len(), "Shutting down all services");

        let results = join_all(entries.into_iter().map(|entry| async move {
            let name = entry.state.name().to_string();
            (name, self.teardown(entry).await)
        }))
        .await;

        for (name, result) in results {
            if let Err(e) = result {
                tracing::error!(service = %name, error = %e, "Identity release failed during shutdown");
            }
        }

        metrics::record_service_count(0);
        tracing::info!("All services stopped");
    }

    async fn start(&self, spec: ServiceSpec) -> Result<Entry, ManagerError> {
        let name = spec.name.clone();
        let provisioned = self
            .provider
            .provision(&name)
            .await
            .map_err(|e| ManagerError::Provisioning(e.to_string()))?;

        match self.prepare(spec, &provisioned.identity) {
            Ok((state, prober)) => Ok(self.launch(state, provisioned, prober)),
            Err(e) => {
                let Provisioned { identity, .. } = provisioned;
                if let Err(release) = self.provider.release(identity).await {
                    tracing::error!(service = %name, error = %release, "Failed to release identity after aborted add");
                }
                Err(e)
            }
        }
    }

    /// Fallible construction that spawns nothing.
    fn prepare(
        &self,
        spec: ServiceSpec,
        identity: &Identity,
    ) -> Result<(Arc<ServiceState>, Option<Prober>), ManagerError> {
        let forwarder = self
            .forwarders
            .build(&spec)
            .map_err(|e| ManagerError::Provisioning(e.to_string()))?;

        let listeners = Listeners {
            plaintext: Some(identity.plaintext_addr),
            encrypted: identity.tls_addr,
        };
        let state = Arc::new(ServiceState::with_listeners(spec, forwarder, listeners));

        let prober = if state.spec().health_check.enabled {
            let prober = Prober::new(state.spec(), state.health().clone())
                .map_err(|e| ManagerError::Provisioning(e.to_string()))?;
            Some(prober)
        } else {
            None
        };
        Ok((state, prober))
    }

    fn launch(&self, state: Arc<ServiceState>, provisioned: Provisioned, prober: Option<Prober>) -> Entry {
        let Provisioned {
            identity,
            plaintext,
            encrypted,
        } = provisioned;
        let name = state.name().to_string();

        let (stop, signal) = stop_channel();
        let mut tasks = Vec::with_capacity(2);

        let router = service_router(Arc::clone(&state), ListenerScheme::Http);
        tasks.push(self.spawn_listener(&name, signal.clone(), move |signal| {
            serve_plaintext(plaintext, router, signal)
        }));

        if let Some(encrypted) = encrypted {
            let router = service_router(Arc::clone(&state), ListenerScheme::Https);
            tasks.push(self.spawn_listener(&name, signal.clone(), move |signal| {
                serve_encrypted(encrypted.listener, encrypted.config, router, signal)
            }));
        }

        let prober = prober.map(|prober| self.spawn_prober(prober, signal));

        ServiceEntry {
            state,
            resources: ServiceResources {
                identity,
                stop,
                listeners: tasks,
                prober,
            },
        }
    }

    fn spawn_listener<F, Fut>(&self, name: &str, signal: StopSignal, serve: F) -> JoinHandle<()>
    where
        F: FnOnce(StopSignal) -> Fut,
        Fut: std::future::Future<Output = std::io::Result<()>> + Send + 'static,
    {
        let guard = self.listeners.track();
        let name = name.to_string();
        let serving = serve(signal);
        tokio::spawn(async move {
            let _guard = guard;
            if let Err(e) = serving.await {
                tracing::error!(service = %name, error = %e, "Listener failed");
            }
        })
    }

    fn spawn_prober(&self, prober: Prober, signal: StopSignal) -> JoinHandle<()> {
        let guard = self.probers.track();
        let shutdown = self.shutdown.subscribe();
        tokio::spawn(async move {
            let _guard = guard;
            prober.run(shutdown, signal).await;
        })
    }

    /// Stop tasks, wait for them, then release the identity.
    async fn teardown(&self, entry: Entry) -> Result<(), ProvisionError> {
        let ServiceEntry { state, resources } = entry;
        let ServiceResources {
            identity,
            stop,
            listeners,
            prober,
        } = resources;

        stop.stop();

        if let Some(prober) = prober {
            self.join_or_abort(state.name(), prober).await;
        }
        for listener in listeners {
            self.join_or_abort(state.name(), listener).await;
        }
        metrics::clear_service_health(state.name());

        self.provider.release(identity).await
    }

    async fn join_or_abort(&self, name: &str, mut handle: JoinHandle<()>) {
        match tokio::time::timeout(self.drain_timeout, &mut handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(service = %name, error = %e, "Service task panicked"),
            Err(_) => {
                tracing::warn!(service = %name, "Drain timeout exceeded, aborting task");
                handle.abort();
                let _ = handle.await;
            }
        }
    }
}
