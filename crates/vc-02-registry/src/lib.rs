//! # Instance Registry and Route Table (vc-02)
//!
//! Holds the set of managed VPN instances, the global custom-route table and
//! each instance's own routes, and keeps instance run state in step with the
//! tunnel workers a [`TunnelDriver`] runs.
//!
//! ## Guarantees
//!
//! | Guarantee | Enforcement |
//! |-----------|-------------|
//! | Unique instance names (case-sensitive) | `ControlPlane::add_instance` |
//! | Unique route ids per table | `ControlPlane::add_custom_route` / `add_instance_route` |
//! | Deleting an instance drops its routes | `ControlPlane::delete_instance` |
//! | Failed operations change nothing | validate, then drive, then write |
//! | Start/stop are idempotent | [`Transition::Unchanged`] |
//! | Restarting a node forgets old workers | `ControlPlane::reset_runtime_state` |
//!
//! ## Hexagonal Architecture
//!
//! - **Domain Layer** (`domain/`): records, rules, config parsing, [`ControlPlane`]
//! - **Ports Layer** (`ports/`): [`TunnelDriver`] and [`SnapshotStore`]
//! - **Adapters Layer** (`adapters/`): in-memory driver, JSON file store

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod domain;
pub mod ports;

pub use adapters::{InMemoryTunnelDriver, JsonFileStore};
pub use domain::{
    ApplyReport, ConfigProfile, ControlPlane, DeleteReport, DetectedRoute, EnableReport,
    InstanceRecord, InstanceStatus, NewInstance, PurgeReport, RegistryError, RegistryStats,
    RouteDraft, RoutePatch, RouteProtocol, RouteRule, RouteScope, RouteSource, Transition,
    VpnType, WorkerReport,
};
pub use ports::{DriverError, SnapshotStore, StoreError, TunnelDriver, TunnelSpec, WorkerStatus};
