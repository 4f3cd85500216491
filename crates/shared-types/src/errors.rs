//! # Error Types
//!
//! JSON-RPC error codes and envelope decoding failures.

use thiserror::Error;

/// Standard JSON-RPC 2.0 error codes.
pub mod codes {
    // JSON-RPC 2.0 standard errors (-32700 to -32600)
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;

    // Server errors (-32000 to -32099)
    pub const SERVER_ERROR: i32 = -32000;
    pub const RESOURCE_NOT_FOUND: i32 = -32001;
    pub const TIMEOUT: i32 = -32006;
}

/// Errors raised while decoding an envelope from the wire.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    /// The payload is not JSON, or not the expected JSON shape.
    #[error("Malformed envelope: {0}")]
    Malformed(String),

    /// `jsonrpc` is present but is not "2.0".
    #[error("Unsupported protocol version: {0}")]
    UnsupportedVersion(String),

    /// Request id is missing or empty.
    #[error("Missing request id")]
    MissingId,

    /// A response carried neither `result` nor `error`.
    #[error("Response has neither 'result' nor 'error'")]
    EmptyResponse,

    /// A response carried both `result` and `error`.
    #[error("Response has both 'result' and 'error'")]
    AmbiguousResponse,
}

impl EnvelopeError {
    /// JSON-RPC code reported when this failure is echoed back to a caller.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::Malformed(_) => codes::PARSE_ERROR,
            _ => codes::INVALID_REQUEST,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(EnvelopeError::Malformed("x".into()).code(), codes::PARSE_ERROR);
        assert_eq!(EnvelopeError::MissingId.code(), codes::INVALID_REQUEST);
        assert_eq!(
            EnvelopeError::UnsupportedVersion("1.0".into()).code(),
            codes::INVALID_REQUEST
        );
    }
}
