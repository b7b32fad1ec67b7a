//! mesh-proxy
//!
//! Gives every configured service its own identity and listeners, and
//! proxies to its backend while the backend is healthy.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────┐
//!                    │                    MESH PROXY                     │
//!                    │                                                   │
//!  Client ──────────▶│  identity listener ─▶ http server ─▶ dispatcher ──┼──▶ Backend
//!  (per service)     │   (plaintext/TLS)     (request id)   (gate, match)│
//!                    │                                          ▲        │
//!                    │                              health flag │        │
//!                    │                                   prober ┘        │
//!                    │                                                   │
//!  Operator ────────▶│  admin API ─▶ manager ─▶ registry                 │
//!                    │                  │                                │
//!                    │                  └─▶ config store (write-back)    │
//!                    └──────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use mesh_proxy::admin::{setup_admin_router, AdminState};
use mesh_proxy::config::{read_config, validate_config, ConfigError, ConfigStore};
use mesh_proxy::http::HttpForwarderFactory;
use mesh_proxy::identity::LocalProvider;
use mesh_proxy::lifecycle::{self, signals, stop_channel};
use mesh_proxy::manager::Manager;
use mesh_proxy::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "mesh-proxy")]
#[command(about = "Health-gated reverse proxy giving each service its own identity", long_about = None)]
struct Args {
    /// Path to the configuration file.
    #[arg(short, long, env = "MESH_PROXY_CONFIG", default_value = "config/services.toml")]
    config: PathBuf,

    /// Identity credential; overrides `auth_key` from the file.
    #[arg(long, env = "MESH_PROXY_AUTH_KEY", hide_env_values = true)]
    auth_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let file_config = read_config(&args.config)?;
    let mut config = file_config.clone();
    if let Some(key) = args.auth_key.filter(|k| !k.is_empty()) {
        config.auth_key = key;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init(&config.logging)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        services = config.services.len(),
        "mesh-proxy starting"
    );

    if config.metrics.enabled {
        let addr: SocketAddr = config.metrics.address().parse()?;
        metrics::init_metrics(addr)?;
    }

    let provider = LocalProvider::from_config(&config)?;
    let manager = Arc::new(Manager::new(
        Arc::new(provider),
        Arc::new(HttpForwarderFactory),
    ));

    let admin_listener = lifecycle::startup::start(&config, &manager).await?;

    let (admin_stop, admin_signal) = stop_channel();
    let admin = if let Some(listener) = admin_listener {
        let store = Arc::new(ConfigStore::new(file_config, args.config.clone()));
        let state = AdminState::new(Arc::clone(&manager), store, config.admin.api_key.clone());

        let mut signal = admin_signal;
        Some(tokio::spawn(async move {
            let served = axum::serve(listener, setup_admin_router(state))
                .with_graceful_shutdown(async move { signal.stopped().await })
                .await;
            if let Err(e) = served {
                tracing::error!(error = %e, "Admin API failed");
            }
        }))
    } else {
        None
    };

    signals::terminated().await;
    tracing::info!("Shutdown signal received");

    admin_stop.stop();
    if let Some(admin) = admin {
        let _ = admin.await;
    }

    manager.shutdown().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
