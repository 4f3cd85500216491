//! # Tunnel Driver Port
//!
//! The registry decides *whether* a tunnel runs; a [`TunnelDriver`] makes
//! it so. Calls are synchronous because they happen inside the
//! dispatcher's critical section.

use crate::domain::{RouteRule, VpnType};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// What a driver needs to bring a tunnel up.
#[derive(Debug, Clone, Copy)]
pub struct TunnelSpec<'a> {
    pub instance_name: &'a str,
    pub vpn_type: VpnType,
    pub config_content: &'a str,
}

/// Liveness of one worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerStatus {
    pub worker_id: u64,
    pub instance_name: String,
    pub alive: bool,
    pub started_at: DateTime<Utc>,
    pub restarts: u32,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DriverError {
    #[error("worker {0} does not exist")]
    UnknownWorker(u64),

    #[error("failed to start tunnel '{instance}': {reason}")]
    StartFailed { instance: String, reason: String },

    #[error("failed to apply routes on worker {worker_id}: {reason}")]
    RouteApplyFailed { worker_id: u64, reason: String },
}

/// Tunnel process control.
///
/// Implementations must leave a worker untouched when `restart` or
/// `apply_routes` fails.
pub trait TunnelDriver: Send + Sync {
    /// Start a worker for the tunnel and return its id.
    fn start(&self, spec: TunnelSpec<'_>) -> Result<u64, DriverError>;

    /// Stop a worker. Stopping an unknown worker is an error.
    fn stop(&self, worker_id: u64) -> Result<(), DriverError>;

    /// Replace a worker's tunnel with `spec`, keeping its id.
    fn restart(&self, worker_id: u64, spec: TunnelSpec<'_>) -> Result<(), DriverError>;

    fn worker_status(&self, worker_id: u64) -> Option<WorkerStatus>;

    /// Install `routes` on the worker's tunnel. Returns how many were installed.
    fn apply_routes(&self, worker_id: u64, routes: &[RouteRule]) -> Result<usize, DriverError>;

    /// Destinations the running tunnel reports (routes pushed by the server).
    fn detect_routes(&self, worker_id: u64) -> Result<Vec<String>, DriverError>;
}
