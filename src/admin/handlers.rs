//! Admin API handlers and wire types.

use std::collections::BTreeMap;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::admin::AdminState;
use crate::config::{BackendTlsConfig, HealthCheckConfig, ServiceConfig};
use crate::manager::ManagerError;
use crate::registry::{Listeners, ServiceSnapshot};

/// Service definition as accepted by `POST /api/services`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceRequest {
    pub name: String,
    pub backend: String,
    pub paths: Vec<String>,
    pub strip_prefix: bool,
    pub health_check: HealthCheckView,
    pub tls: TlsView,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HealthCheckView {
    pub enabled: bool,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unhealthy_threshold: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TlsView {
    pub enabled: bool,
    pub skip_verify: bool,
}

/// A running service as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceView {
    #[serde(flatten)]
    pub service: ServiceRequest,
    pub healthy: bool,
    pub listeners: Listeners,
}

impl From<ServiceRequest> for ServiceConfig {
    fn from(request: ServiceRequest) -> Self {
        let health = request.health_check;
        ServiceConfig {
            name: request.name,
            backend: request.backend,
            paths: request.paths,
            strip_prefix: request.strip_prefix,
            health_check: HealthCheckConfig {
                enabled: health.enabled,
                path: health.path,
                interval_ms: health.interval_ms,
                timeout_ms: health.timeout_ms,
                unhealthy_threshold: health.unhealthy_threshold,
            },
            tls: BackendTlsConfig {
                enabled: request.tls.enabled,
                skip_verify: request.tls.skip_verify,
            },
        }
    }
}

impl From<ServiceConfig> for ServiceRequest {
    fn from(config: ServiceConfig) -> Self {
        let health = config.health_check;
        ServiceRequest {
            name: config.name,
            backend: config.backend,
            paths: config.paths,
            strip_prefix: config.strip_prefix,
            health_check: HealthCheckView {
                enabled: health.enabled,
                path: health.path,
                interval_ms: health.interval_ms,
                timeout_ms: health.timeout_ms,
                unhealthy_threshold: health.unhealthy_threshold,
            },
            tls: TlsView {
                enabled: config.tls.enabled,
                skip_verify: config.tls.skip_verify,
            },
        }
    }
}

impl From<&ServiceSnapshot> for ServiceView {
    fn from(snapshot: &ServiceSnapshot) -> Self {
        Self {
            service: snapshot.spec.to_config().into(),
            healthy: snapshot.healthy,
            listeners: snapshot.listeners,
        }
    }
}

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub services: usize,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Success {
    pub status: String,
    pub message: String,
}

impl Success {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            status: "success".into(),
            message: message.into(),
        })
    }
}

/// Error body: `{"status":"error","kind":...,"message":...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }
}

impl From<ManagerError> for ApiError {
    fn from(e: ManagerError) -> Self {
        let status = match e {
            ManagerError::Validation(_) => StatusCode::BAD_REQUEST,
            ManagerError::DuplicateName(_) => StatusCode::CONFLICT,
            ManagerError::NotFound(_) => StatusCode::NOT_FOUND,
            ManagerError::Provisioning(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ManagerError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        };
        Self::new(status, e.kind(), e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation", rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "status": "error",
            "kind": self.kind,
            "message": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        services: state.manager.len().await,
    })
}

pub async fn list_services(State(state): State<AdminState>) -> Json<Vec<ServiceView>> {
    let services = state.manager.list().await;
    Json(services.iter().map(ServiceView::from).collect())
}

pub async fn get_service(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> Result<Json<ServiceView>, ApiError> {
    match state.manager.get(&name).await {
        Some(snapshot) => Ok(Json(ServiceView::from(&snapshot))),
        None => Err(ManagerError::NotFound(name).into()),
    }
}

pub async fn add_service(
    State(state): State<AdminState>,
    body: Result<Json<ServiceRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Success>), ApiError> {
    let Json(request) = body?;
    let config = ServiceConfig::from(request);

    let _guard = state.mutations.lock().await;
    state.manager.add_service(config.clone()).await?;

    let name = config.name.clone();
    if let Err(e) = state.store.add_service(config).await {
        tracing::warn!(service = %name, error = %e, "Failed to save config after add");
    }

    Ok((
        StatusCode::CREATED,
        Success::new(format!("Service {} added", name)),
    ))
}

pub async fn remove_service(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> Result<Json<Success>, ApiError> {
    let _guard = state.mutations.lock().await;
    let result = state.manager.remove_service(&name).await;

    // The service is gone unless it never existed.
    if !matches!(result, Err(ManagerError::NotFound(_))) {
        if let Err(e) = state.store.remove_service(&name).await {
            tracing::warn!(service = %name, error = %e, "Failed to save config after remove");
        }
    }

    result?;
    Ok(Success::new(format!("Service {} removed", name)))
}

pub async fn get_health(State(state): State<AdminState>) -> Json<BTreeMap<String, bool>> {
    Json(state.manager.health().await)
}
