//! Manager error types.

use thiserror::Error;

use crate::config::ValidationError;
use crate::registry::RegistryError;

/// Failure of a manager operation.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("invalid service configuration: {}", join(.0))]
    Validation(Vec<ValidationError>),

    #[error("service {0} already exists")]
    DuplicateName(String),

    #[error("service {0} not found")]
    NotFound(String),

    #[error("provisioning failed: {0}")]
    Provisioning(String),

    #[error("manager is shutting down")]
    ShuttingDown,
}

impl ManagerError {
    /// Stable machine-readable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            ManagerError::Validation(_) => "validation",
            ManagerError::DuplicateName(_) => "duplicate_name",
            ManagerError::NotFound(_) => "not_found",
            ManagerError::Provisioning(_) => "provisioning",
            ManagerError::ShuttingDown => "shutting_down",
        }
    }
}

impl From<RegistryError> for ManagerError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::DuplicateName(name) => ManagerError::DuplicateName(name),
            RegistryError::Closed => ManagerError::ShuttingDown,
        }
    }
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
