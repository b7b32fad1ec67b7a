//! Service registry.
//!
//! # Lock Discipline
//! ```text
//! RwLock<Inner>
//!     write: reserve / commit / abandon / take / release / close
//!     read:  get / list / len
//! HealthFlag (per service)
//!     atomic, outside the lock; prober writes, dispatcher reads
//! ```
//!
//! # Design Decisions
//! - The lock is never held across an await: provisioning and teardown run
//!   between a reservation and its commit/release
//! - A name is reserved from the start of an add until it is committed or
//!   abandoned, and from the start of a removal until teardown finishes, so
//!   the same name is never provisioned twice at once
//! - Readers get `Arc<ServiceState>` snapshots; an entry removed after a
//!   read stays valid for whoever still holds it
//! - Entries own their teardown resources (`R`); taking an entry out is the
//!   only way to reach them, so each is released exactly once

pub mod state;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;

pub use state::{Listeners, ServiceSnapshot, ServiceState};

/// Registry-level failures. No resources are involved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("service {0} already exists")]
    DuplicateName(String),

    #[error("registry is shut down")]
    Closed,
}

/// A registered service and the resources that must be released with it.
#[derive(Debug)]
pub struct ServiceEntry<R> {
    pub state: Arc<ServiceState>,
    pub resources: R,
}

#[derive(Debug)]
struct Inner<R> {
    services: HashMap<String, ServiceEntry<R>>,
    reserved: HashSet<String>,
    closed: bool,
}

/// Mapping from service name to live state.
#[derive(Debug)]
pub struct Registry<R> {
    inner: RwLock<Inner<R>>,
}

impl<R> Registry<R> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                services: HashMap::new(),
                reserved: HashSet::new(),
                closed: false,
            }),
        }
    }

    /// Claim `name` for an add in progress.
    pub async fn reserve(&self, name: &str) -> Result<(), RegistryError> {
        let mut inner = self.inner.write().await;
        if inner.closed {
            return Err(RegistryError::Closed);
        }
        if inner.services.contains_key(name) || inner.reserved.contains(name) {
            return Err(RegistryError::DuplicateName(name.to_string()));
        }
        inner.reserved.insert(name.to_string());
        Ok(())
    }

    /// Publish a reserved entry. If the registry closed meanwhile, the entry
    /// is handed back so the caller can tear it down.
    pub async fn commit(&self, entry: ServiceEntry<R>) -> Result<usize, ServiceEntry<R>> {
        let mut inner = self.inner.write().await;
        let name = entry.state.name().to_string();
        inner.reserved.remove(&name);
        if inner.closed {
            return Err(entry);
        }
        inner.services.insert(name, entry);
        Ok(inner.services.len())
    }

    /// Drop a reservation whose add failed.
    pub async fn abandon(&self, name: &str) {
        self.inner.write().await.reserved.remove(name);
    }

    /// Unpublish an entry. The name stays reserved until `release`.
    pub async fn take(&self, name: &str) -> Option<ServiceEntry<R>> {
        let mut inner = self.inner.write().await;
        let entry = inner.services.remove(name)?;
        inner.reserved.insert(name.to_string());
        Some(entry)
    }

    /// Free a name after its entry has been torn down.
    pub async fn release(&self, name: &str) {
        self.inner.write().await.reserved.remove(name);
    }

    /// Refuse further adds and hand out every entry.
    pub async fn close(&self) -> Vec<ServiceEntry<R>> {
        let mut inner = self.inner.write().await;
        inner.closed = true;
        inner.services.drain().map(|(_, entry)| entry).collect()
    }

    pub async fn get(&self, name: &str) -> Option<Arc<ServiceState>> {
        self.inner
            .read()
            .await
            .services
            .get(name)
            .map(|entry| Arc::clone(&entry.state))
    }

    /// All services, sorted by name.
    pub async fn list(&self) -> Vec<Arc<ServiceState>> {
        let inner = self.inner.read().await;
        let mut states: Vec<_> = inner
            .services
            .values()
            .map(|entry| Arc::clone(&entry.state))
            .collect();
        drop(inner);
        states.sort_by(|a, b| a.name().cmp(b.name()));
        states
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.services.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Names currently reserved by an add or removal in progress.
    pub async fn pending(&self) -> usize {
        self.inner.read().await.reserved.len()
    }
}

impl<R> Default for Registry<R> {
    fn default() -> Self {
        Self::new()
    }
}
