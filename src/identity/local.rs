//! Identity provider backed by local state and loopback listeners.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::net::TcpListener;
use url::Url;

use crate::config::ProxyConfig;
use crate::identity::directory::DirectoryClient;
use crate::identity::tls::load_tls_config;
use crate::identity::{EncryptedListener, Identity, IdentityProvider, ProvisionError, Provisioned};

const ID_FILE: &str = "identity";

/// Provisions identities under `state_dir/<name>` and binds ephemeral ports on `bind_host`.
#[derive(Debug, Clone)]
pub struct LocalProvider {
    state_dir: PathBuf,
    bind_host: String,
    tls: Option<(PathBuf, PathBuf)>,
    directory: Option<DirectoryClient>,
}

impl LocalProvider {
    pub fn new(state_dir: impl Into<PathBuf>, bind_host: impl Into<String>) -> Self {
        Self {
            state_dir: state_dir.into(),
            bind_host: bind_host.into(),
            tls: None,
            directory: None,
        }
    }

    /// Serve an encrypted listener with this certificate and key.
    pub fn with_tls(mut self, cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        self.tls = Some((cert.into(), key.into()));
        self
    }

    pub fn with_directory(mut self, directory: DirectoryClient) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn from_config(config: &ProxyConfig) -> Result<Self, ProvisionError> {
        let identity = &config.identity;
        let mut provider = Self::new(config.state_dir(), identity.bind_host.clone());

        if let (Some(cert), Some(key)) = (&identity.tls_cert, &identity.tls_key) {
            provider = provider.with_tls(cert, key);
        }

        if let Some(raw) = &identity.directory_url {
            let base = Url::parse(raw)
                .map_err(|e| ProvisionError::Directory(format!("invalid directory URL {}: {}", raw, e)))?;
            provider = provider.with_directory(DirectoryClient::new(
                base,
                config.auth_key.clone(),
                config.api_key.clone(),
            )?);
        }

        Ok(provider)
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    /// Read the persisted identity id for `dir`, minting one on first use.
    async fn identity_id(dir: &Path) -> Result<String, ProvisionError> {
        let state_err = |source| ProvisionError::StateDir {
            path: dir.display().to_string(),
            source,
        };

        tokio::fs::create_dir_all(dir).await.map_err(state_err)?;

        let file = dir.join(ID_FILE);
        match tokio::fs::read_to_string(&file).await {
            Ok(id) if !id.trim().is_empty() => return Ok(id.trim().to_string()),
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(state_err(e)),
        }

        let id = uuid::Uuid::new_v4().to_string();
        tokio::fs::write(&file, &id).await.map_err(state_err)?;
        Ok(id)
    }

    async fn bind_encrypted(&self) -> Result<Option<EncryptedListener>, ProvisionError> {
        let Some((cert, key)) = &self.tls else {
            return Ok(None);
        };

        let config = load_tls_config(cert, key).await?;
        let listener = std::net::TcpListener::bind((self.bind_host.as_str(), 0))
            .map_err(ProvisionError::Bind)?;
        listener.set_nonblocking(true).map_err(ProvisionError::Bind)?;

        Ok(Some(EncryptedListener { listener, config }))
    }
}

#[async_trait]
impl IdentityProvider for LocalProvider {
    async fn provision(&self, name: &str) -> Result<Provisioned, ProvisionError> {
        let id = Self::identity_id(&self.state_dir.join(name)).await?;

        let plaintext = TcpListener::bind((self.bind_host.as_str(), 0))
            .await
            .map_err(ProvisionError::Bind)?;
        let encrypted = self.bind_encrypted().await?;

        let identity = Identity {
            id,
            hostname: name.to_string(),
            plaintext_addr: plaintext.local_addr().map_err(ProvisionError::Bind)?,
            tls_addr: encrypted
                .as_ref()
                .map(|e| e.listener.local_addr())
                .transpose()
                .map_err(ProvisionError::Bind)?,
        };

        if let Some(directory) = &self.directory {
            directory.register(&identity).await?;
        }

        tracing::info!(
            service = %name,
            id = %identity.id,
            address = %identity.plaintext_addr,
            tls_address = ?identity.tls_addr,
            "Identity provisioned"
        );

        Ok(Provisioned {
            identity,
            plaintext,
            encrypted,
        })
    }

    async fn release(&self, identity: Identity) -> Result<(), ProvisionError> {
        if let Some(directory) = &self.directory {
            directory.deregister(&identity).await?;
        }
        tracing::info!(service = %identity.hostname, id = %identity.id, "Identity released");
        Ok(())
    }
}
