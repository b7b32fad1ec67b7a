//! Health-gated multi-service reverse proxy library.
//!
//! Each configured service gets its own network identity and listeners;
//! requests are gated on the service's health, matched against its path
//! prefixes and forwarded to a single backend.

// Core subsystems
pub mod config;
pub mod http;
pub mod routing;

// Service lifecycle
pub mod health;
pub mod identity;
pub mod manager;
pub mod registry;

// Cross-cutting concerns
pub mod admin;
pub mod lifecycle;
pub mod observability;

pub use config::schema::ProxyConfig;
pub use lifecycle::Shutdown;
pub use manager::{Manager, ManagerError};
