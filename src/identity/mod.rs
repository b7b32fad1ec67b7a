//! Network identity provisioning.
//!
//! # Data Flow
//! ```text
//! provision(name)
//!     → state_dir/<name>/ (persisted identity id)
//!     → bind plaintext listener (+ TLS listener when a certificate is set)
//!     → register with the device directory, if one is configured
//!     → Provisioned { identity, listeners }
//!
//! release(identity)
//!     → deregister from the device directory
//! ```
//!
//! # Design Decisions
//! - Listeners are owned by the caller once provisioned; dropping them closes them
//! - The identity id survives restarts so the directory sees the same device
//! - `release` is called at most once per successful `provision`

pub mod directory;
pub mod local;
pub mod tls;

use std::net::SocketAddr;

use async_trait::async_trait;
use axum_server::tls_rustls::RustlsConfig;
use thiserror::Error;
use tokio::net::TcpListener;

pub use directory::DirectoryClient;
pub use local::LocalProvider;

/// Failure to acquire or release a service identity.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("state directory {path}: {source}")]
    StateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to bind listener: {0}")]
    Bind(#[source] std::io::Error),

    #[error("failed to load TLS certificate: {0}")]
    Tls(#[source] std::io::Error),

    #[error("device directory: {0}")]
    Directory(String),
}

/// The network presence of one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub hostname: String,
    pub plaintext_addr: SocketAddr,
    pub tls_addr: Option<SocketAddr>,
}

/// TLS listener handed to `axum-server`.
pub struct EncryptedListener {
    pub listener: std::net::TcpListener,
    pub config: RustlsConfig,
}

impl std::fmt::Debug for EncryptedListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedListener")
            .field("listener", &self.listener)
            .finish_non_exhaustive()
    }
}

/// Result of a successful `provision`.
#[derive(Debug)]
pub struct Provisioned {
    pub identity: Identity,
    pub plaintext: TcpListener,
    pub encrypted: Option<EncryptedListener>,
}

/// Source of service identities and their listeners.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn provision(&self, name: &str) -> Result<Provisioned, ProvisionError>;

    async fn release(&self, identity: Identity) -> Result<(), ProvisionError>;
}
