//! # Request Correlator
//!
//! The caller side of JSON-RPC over pub/sub. A call publishes a request
//! envelope on a service's request topic and suspends on its own oneshot
//! until the matching response arrives on the response topic, its deadline
//! passes, or the caller cancels.
//!
//! ## Guarantees
//!
//! | Guarantee | Enforcement |
//! |-----------|-------------|
//! | No two pending calls share an id | `PendingCallStore::register` rejects occupied ids |
//! | Each call resolves exactly once | the pending entry is removed by whichever of complete/expire/cancel wins |
//! | Late responses never resurrect a call | `complete` on a removed id is counted as unmatched and dropped |
//! | Correlation is by id only | responses are matched by `RequestId`, never by arrival order |
//!
//! ## Flow
//!
//! ```text
//! caller ──call()──→ RpcClient ──register──→ PendingCallStore
//!                       │                          ↑
//!                       └──publish(request)──→ Transport ──→ broker ──→ service
//!                                                                         │
//! ResponseListener ←──inbound channel←── Transport ←── broker ←─response──┘
//!        │
//!        └──complete(id)──→ PendingCallStore ──oneshot──→ caller
//! ```
//!
//! ## Error taxonomy
//!
//! [`CallError`] separates "never sent" (`Transport`), "sent, no answer"
//! (`TimedOut`, outcome unknown), and "sent, rejected" (`Remote` for
//! protocol errors, `Rejected` for handler failures).

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod domain;
pub mod ipc;

pub use domain::config::ClientConfig;
pub use domain::error::CallError;
pub use domain::pending::{CallResolution, PendingCallStore, PendingStats, PendingStatsSnapshot};
pub use domain::request_id::RequestIdGenerator;
pub use ipc::client::{CallHandle, RpcClient};
pub use ipc::listener::ResponseListener;
