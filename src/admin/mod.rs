//! Administrative HTTP API.
//!
//! # Routes
//! ```text
//! GET    /api/services          list services
//! GET    /api/services/{name}   one service
//! POST   /api/services          add a service
//! DELETE /api/services/{name}   remove a service
//! GET    /api/health            name → healthy
//! GET    /api/status            version and service count
//! ```

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::get,
    Router,
};
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

use crate::config::ConfigStore;
use crate::http::request::RequestIdLayer;
use crate::manager::Manager;
use self::auth::admin_auth_middleware;
use self::handlers::*;

/// Shared state of the admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub manager: Arc<Manager>,
    pub store: Arc<ConfigStore>,
    pub api_key: Option<String>,
    /// Held across a manager mutation and its config write-back so the
    /// saved file follows the same order as the registry.
    mutations: Arc<Mutex<()>>,
}

impl AdminState {
    pub fn new(manager: Arc<Manager>, store: Arc<ConfigStore>, api_key: Option<String>) -> Self {
        Self {
            manager,
            store,
            api_key: api_key.filter(|key| !key.is_empty()),
            mutations: Arc::default(),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/api/services", get(list_services).post(add_service))
        .route("/api/services/{name}", get(get_service).delete(remove_service))
        .route("/api/health", get(get_health))
        .route("/api/status", get(get_status))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(RequestIdLayer)
}
