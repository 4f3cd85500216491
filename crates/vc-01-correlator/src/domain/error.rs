//! Call errors.

use shared_bus::TransportError;
use shared_types::{codes, FailureKind, RequestId, RpcErrorObject};
use std::time::Duration;
use thiserror::Error;

/// Why a call did not produce a successful result.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CallError {
    /// The request never left this process.
    #[error("Request not sent: {0}")]
    Transport(#[from] TransportError),

    /// Sent, but no response before the deadline. The operation may still
    /// have been applied by the service.
    #[error("Request {id} ({method}) timed out after {}ms", .timeout.as_millis())]
    TimedOut {
        id: RequestId,
        method: String,
        timeout: Duration,
    },

    /// The caller gave up before a response arrived.
    #[error("Request {id} cancelled")]
    Cancelled { id: RequestId },

    /// Sent, and the service answered with an envelope-level error
    /// (unknown method, malformed request).
    #[error("Remote error {code}: {message}")]
    Remote { code: i32, message: String },

    /// Sent, and the handler reported `success: false`.
    #[error("Rejected ({kind}): {message}")]
    Rejected { kind: FailureKind, message: String },

    /// The request could not be encoded.
    #[error("Encode failed: {0}")]
    Encode(String),
}

impl CallError {
    /// True when the request reached the broker.
    #[must_use]
    pub fn was_sent(&self) -> bool {
        !matches!(self, Self::Transport(_) | Self::Encode(_))
    }

    /// True when the caller cannot know whether the operation happened.
    #[must_use]
    pub fn is_outcome_unknown(&self) -> bool {
        matches!(self, Self::TimedOut { .. } | Self::Cancelled { .. })
    }

    #[must_use]
    pub fn is_method_not_found(&self) -> bool {
        matches!(self, Self::Remote { code, .. } if *code == codes::METHOD_NOT_FOUND)
    }
}

impl From<RpcErrorObject> for CallError {
    fn from(error: RpcErrorObject) -> Self {
        Self::Remote {
            code: error.code,
            message: error.message,
        }
    }
}
