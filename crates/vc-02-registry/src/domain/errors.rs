//! # Registry Errors
//!
//! Every error maps onto one [`FailureKind`], which is what callers see in
//! the `error_kind` field of a failed result.

use crate::ports::driver::DriverError;
use shared_types::FailureKind;
use thiserror::Error;

/// Errors from registry and route table operations.
///
/// An operation that returns one of these has left the registry unchanged.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A required parameter is absent or empty.
    #[error("Missing '{field}'")]
    MissingField { field: &'static str },

    /// A parameter is present but unusable.
    #[error("Invalid '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("VPN instance '{name}' already exists")]
    InstanceExists { name: String },

    #[error("VPN instance '{name}' not found")]
    InstanceNotFound { name: String },

    #[error("Routing rule '{id}' already exists")]
    RouteExists { id: String },

    #[error("Routing rule '{id}' not found")]
    RouteNotFound { id: String },

    /// The operation needs a running instance.
    #[error("VPN instance '{name}' is not running")]
    NotRunning { name: String },

    #[error("Tunnel driver failed: {0}")]
    Driver(#[from] DriverError),
}

impl RegistryError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }

    /// The failure class reported to callers.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::MissingField { .. } | Self::InvalidField { .. } => FailureKind::Validation,
            Self::InstanceExists { .. } | Self::RouteExists { .. } => FailureKind::Conflict,
            Self::InstanceNotFound { .. } | Self::RouteNotFound { .. } => FailureKind::NotFound,
            Self::NotRunning { .. } | Self::Driver(_) => FailureKind::State,
        }
    }

    /// Field named by a validation error.
    #[must_use]
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::MissingField { field } | Self::InvalidField { field, .. } => Some(field),
            _ => None,
        }
    }
}
