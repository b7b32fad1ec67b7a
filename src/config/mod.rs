//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated)
//!     → resolve.rs (fill defaults per service)
//!     → ServiceSpec (complete, immutable)
//!
//! Admin add/remove:
//!     validation.rs + resolve.rs again for the new service
//!     → store.rs writes the file back
//! ```
//!
//! # Design Decisions
//! - Validation never mutates; default filling never rejects
//! - Optional fields stay unset on disk so write-back does not inflate the file
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod resolve;
pub mod schema;
pub mod store;
pub mod validation;

pub use loader::{load_config, read_config, render_config, ConfigError};
pub use resolve::{resolve_service, HealthCheckSpec, ServiceSpec};
pub use schema::{
    AdminConfig, BackendTlsConfig, HealthCheckConfig, IdentityConfig, LogFormat, LoggingConfig,
    MetricsConfig, ProxyConfig, ServiceConfig,
};
pub use store::ConfigStore;
pub use validation::{validate_config, validate_service, ValidationError};
