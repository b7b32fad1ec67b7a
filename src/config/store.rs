//! Durable copy of the accepted configuration.
//!
//! Administrative mutations are mirrored here and written back so that a
//! restart rebuilds the same set of services.

use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use crate::config::loader::{render_config, ConfigError};
use crate::config::schema::{ProxyConfig, ServiceConfig};

pub struct ConfigStore {
    path: Option<PathBuf>,
    config: Mutex<ProxyConfig>,
}

impl ConfigStore {
    /// A store backed by `path`.
    pub fn new(config: ProxyConfig, path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            config: Mutex::new(config),
        }
    }

    /// A store that never touches disk.
    pub fn in_memory(config: ProxyConfig) -> Self {
        Self {
            path: None,
            config: Mutex::new(config),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Current configuration.
    pub async fn snapshot(&self) -> ProxyConfig {
        self.config.lock().await.clone()
    }

    /// Record an added service and persist. Replaces an entry of the same name.
    pub async fn add_service(&self, service: ServiceConfig) -> Result<(), ConfigError> {
        let mut config = self.config.lock().await;
        config.services.retain(|s| s.name != service.name);
        config.services.push(service);
        self.persist(&config).await
    }

    /// Drop a service and persist.
    pub async fn remove_service(&self, name: &str) -> Result<(), ConfigError> {
        let mut config = self.config.lock().await;
        config.services.retain(|s| s.name != name);
        self.persist(&config).await
    }

    async fn persist(&self, config: &ProxyConfig) -> Result<(), ConfigError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let text = render_config(config)?;

        // Write to a sibling then rename so a crash never leaves a torn file.
        let tmp = path.with_extension("toml.tmp");
        tokio::fs::write(&tmp, text).await.map_err(ConfigError::Io)?;
        tokio::fs::rename(&tmp, path).await.map_err(ConfigError::Io)?;

        tracing::debug!(path = ?path, services = config.services.len(), "Configuration saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::load_config;

    fn service(name: &str) -> ServiceConfig {
        ServiceConfig {
            name: name.into(),
            backend: "http://127.0.0.1:9001".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn mutations_are_written_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("services.toml");
        let store = ConfigStore::new(
            ProxyConfig {
                auth_key: "k".into(),
                services: vec![service("a")],
                ..Default::default()
            },
            &path,
        );

        store.add_service(service("b")).await.unwrap();
        store.remove_service("a").await.unwrap();

        let on_disk = load_config(&path).unwrap();
        let names: Vec<_> = on_disk.services.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["b"]);
        assert_eq!(store.snapshot().await, on_disk);
    }

    #[tokio::test]
    async fn re_adding_replaces_entry() {
        let store = ConfigStore::in_memory(ProxyConfig::default());
        store.add_service(service("a")).await.unwrap();
        let mut updated = service("a");
        updated.strip_prefix = true;
        store.add_service(updated).await.unwrap();

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.services.len(), 1);
        assert!(snapshot.services[0].strip_prefix);
    }
}
