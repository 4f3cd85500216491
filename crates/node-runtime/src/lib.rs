//! # Node Runtime Library
//!
//! Configuration and assembly of a VPN control node. The `vc-node` binary
//! is a thin wrapper; integration tests start nodes through this library.
//!
//! - `config` - TOML file, `VC_*` environment overrides, validation
//! - `runtime` - registry restore, transport, request service, shutdown

pub mod config;
pub mod runtime;

pub use config::{ConfigError, NodeConfig, TransportKind};
pub use runtime::NodeRuntime;
