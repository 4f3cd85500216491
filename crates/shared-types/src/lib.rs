//! # Shared Types Crate
//!
//! Every type that crosses the broker lives here: the JSON-RPC request and
//! response envelopes, the closed set of method names, the topic naming
//! scheme and the result-shape convention callers depend on.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: the client side (correlator) and the
//!   service side (dispatcher) both decode with these types.
//! - **Closed Method Set**: method names are an enum; an unknown name is a
//!   decode-time fact, not a string comparison buried in a handler.
//! - **Uniform Results**: every handler result is `{success: true, ..}` or
//!   `{success: false, error, error_kind}`; envelope-level errors are
//!   reserved for protocol failures.
//!
//! ## Wire Shape
//!
//! ```text
//! Request:  { "jsonrpc": "2.0", "id": "<id>", "method": "<name>", "params": {..} }
//! Response: { "jsonrpc": "2.0", "id": "<id>", "result": {..} }
//!         | { "jsonrpc": "2.0", "id": "<id>", "error": {"code": -32601, "message": ".."} }
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod envelope;
pub mod errors;
pub mod methods;
pub mod outcome;
pub mod topics;

pub use envelope::{RequestEnvelope, RequestId, ResponseEnvelope, ResponsePayload, RpcErrorObject};
pub use errors::{codes, EnvelopeError};
pub use methods::{Method, UnknownMethod};
pub use outcome::{FailureKind, Outcome};
pub use topics::ServiceTopics;

/// JSON-RPC protocol version carried in every envelope.
pub const JSONRPC_VERSION: &str = "2.0";

/// Service name used when none is configured.
pub const DEFAULT_SERVICE_NAME: &str = "ur-vpn-manager";
