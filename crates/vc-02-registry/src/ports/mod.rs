//! # Ports
//!
//! Outbound interfaces the registry depends on.

pub mod driver;
pub mod store;

pub use driver::{DriverError, TunnelDriver, TunnelSpec, WorkerStatus};
pub use store::{SnapshotStore, StoreError};
