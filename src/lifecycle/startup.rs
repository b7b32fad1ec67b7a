//! Process startup.
//!
//! The admin listener is bound before any service is provisioned, so a
//! taken admin port fails startup with nothing to tear down.

use tokio::net::TcpListener;

use crate::config::{ProxyConfig, ServiceConfig};
use crate::manager::Manager;

/// Bind the admin listener, then start every configured service.
///
/// Returns `None` for the listener when the admin API is disabled.
pub async fn start(config: &ProxyConfig, manager: &Manager) -> std::io::Result<Option<TcpListener>> {
    let admin = if config.admin.enabled {
        let listener = TcpListener::bind(config.admin.bind_address()).await?;
        tracing::info!(address = %listener.local_addr()?, "Admin API listening");
        Some(listener)
    } else {
        None
    };

    let running = start_services(manager, &config.services).await;
    tracing::info!(
        running,
        configured = config.services.len(),
        "Services started"
    );

    Ok(admin)
}

/// Add each service in order. A service that fails is logged and skipped.
pub async fn start_services(manager: &Manager, services: &[ServiceConfig]) -> usize {
    for service in services {
        if let Err(e) = manager.add_service(service.clone()).await {
            tracing::error!(service = %service.name, error = %e, "Skipping service");
        }
    }
    manager.len().await
}
