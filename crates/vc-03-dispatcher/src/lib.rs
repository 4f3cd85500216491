//! # Method Dispatcher (vc-03)
//!
//! The service side of JSON-RPC over pub/sub. Requests arriving on the
//! service's request topic are decoded, routed by method name to a handler
//! over the shared [`ControlPlane`](vc_02_registry::ControlPlane), and
//! answered on the response topic with the request's id.
//!
//! ## Guarantees
//!
//! | Guarantee | Enforcement |
//! |-----------|-------------|
//! | Every method has exactly one handler | exhaustive match in `handlers::handler_for` |
//! | Reads see a consistent state | read handlers run under the registry read lock |
//! | Mutations are serialized | write handlers run under the registry write lock |
//! | A failed mutation leaves no trace | the state is restored from a pre-write copy |
//! | Handler failures are results, not protocol errors | `{success: false, error, error_kind}` |
//! | Redeliveries run once | `DeliveryDedup` keyed on request id and payload digest |
//!
//! ## Flow
//!
//! ```text
//! broker ──→ Transport ──inbound──→ request loop ──semaphore──→ RequestProcessor
//!                                                                    │
//!                        decode ─→ dedup ─→ Method::from_str ─→ Dispatcher::dispatch
//!                                                                    │
//! broker ←── Transport ←──publish(response)─────────────────────────┘
//! ```
//!
//! Protocol errors (undecodable request, unknown method) become JSON-RPC
//! `error` members. Everything a handler reports, including validation
//! failures, is a `result` in the uniform outcome shape.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod dispatcher;
pub mod domain;
pub mod handlers;
pub mod ipc;

pub use dispatcher::{DispatchStats, DispatchStatsSnapshot, Dispatcher};
pub use domain::config::DispatcherConfig;
pub use domain::error::RpcError;
pub use domain::params::Params;
pub use handlers::{handler_for, Handler};
pub use ipc::heartbeat::{heartbeat_payload, heartbeat_task};
pub use ipc::service::{DispatcherService, RequestProcessor, ServiceStatsSnapshot};
