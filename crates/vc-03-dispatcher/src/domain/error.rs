//! Handler errors.
//!
//! A handler failure is not a protocol error: it travels inside a normal
//! `result` as `{success: false, error, error_kind}`.

use shared_types::{FailureKind, Outcome};
use thiserror::Error;
use vc_02_registry::RegistryError;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct RpcError {
    pub kind: FailureKind,
    pub message: String,
}

impl RpcError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// `Missing '<field>'`
    #[must_use]
    pub fn missing(field: &'static str) -> Self {
        RegistryError::MissingField { field }.into()
    }

    /// `Invalid '<field>': <reason>`
    pub fn invalid(field: &str, reason: impl std::fmt::Display) -> Self {
        Self::new(FailureKind::Validation, format!("Invalid '{field}': {reason}"))
    }

    #[must_use]
    pub fn into_outcome(self) -> Outcome {
        Outcome::failure(self.kind, self.message)
    }
}

impl From<RegistryError> for RpcError {
    fn from(err: RegistryError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}
