use crate::domain::RouteRule;
use crate::ports::driver::{DriverError, TunnelDriver, TunnelSpec, WorkerStatus};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

struct Worker {
    instance_name: String,
    started_at: DateTime<Utc>,
    restarts: u32,
    installed_routes: Vec<String>,
}

/// Tunnel driver that keeps workers as bookkeeping only.
///
/// Used by the node when no real tunnel backend is configured, and by
/// tests, which can make starts fail for chosen instances and script the
/// routes a server "pushes".
pub struct InMemoryTunnelDriver {
    workers: Mutex<HashMap<u64, Worker>>,
    next_id: AtomicU64,
    failing: Mutex<HashSet<String>>,
    pushed_routes: Mutex<HashMap<String, Vec<String>>>,
}

impl Default for InMemoryTunnelDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTunnelDriver {
    pub fn new() -> Self {
        Self {
            workers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            failing: Mutex::new(HashSet::new()),
            pushed_routes: Mutex::new(HashMap::new()),
        }
    }

    /// Make every start or restart of `instance` fail from now on.
    pub fn fail_starts_for(&self, instance: impl Into<String>) {
        self.failing.lock().insert(instance.into());
    }

    pub fn allow_starts_for(&self, instance: &str) {
        self.failing.lock().remove(instance);
    }

    /// Routes `detect_routes` reports for workers of `instance`.
    pub fn push_routes<I, S>(&self, instance: &str, routes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pushed_routes
            .lock()
            .entry(instance.to_string())
            .or_default()
            .extend(routes.into_iter().map(Into::into));
    }

    pub fn live_workers(&self) -> usize {
        self.workers.lock().len()
    }

    /// Destinations installed by the last `apply_routes` on a worker.
    pub fn installed_routes(&self, worker_id: u64) -> Vec<String> {
        self.workers
            .lock()
            .get(&worker_id)
            .map(|w| w.installed_routes.clone())
            .unwrap_or_default()
    }

    fn check_allowed(&self, spec: &TunnelSpec<'_>) -> Result<(), DriverError> {
        if self.failing.lock().contains(spec.instance_name) {
            return Err(DriverError::StartFailed {
                instance: spec.instance_name.to_string(),
                reason: "tunnel process exited during startup".into(),
            });
        }
        Ok(())
    }
}

impl TunnelDriver for InMemoryTunnelDriver {
    fn start(&self, spec: TunnelSpec<'_>) -> Result<u64, DriverError> {
        self.check_allowed(&spec)?;
        let worker_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.workers.lock().insert(
            worker_id,
            Worker {
                instance_name: spec.instance_name.to_string(),
                started_at: Utc::now(),
                restarts: 0,
                installed_routes: Vec::new(),
            },
        );
        info!(
            worker_id,
            instance = spec.instance_name,
            vpn_type = %spec.vpn_type,
            config_bytes = spec.config_content.len(),
            "Tunnel worker started"
        );
        Ok(worker_id)
    }

    fn stop(&self, worker_id: u64) -> Result<(), DriverError> {
        let worker = self
            .workers
            .lock()
            .remove(&worker_id)
            .ok_or(DriverError::UnknownWorker(worker_id))?;
        info!(worker_id, instance = %worker.instance_name, "Tunnel worker stopped");
        Ok(())
    }

    fn restart(&self, worker_id: u64, spec: TunnelSpec<'_>) -> Result<(), DriverError> {
        let mut workers = self.workers.lock();
        let worker = workers
            .get_mut(&worker_id)
            .ok_or(DriverError::UnknownWorker(worker_id))?;
        self.check_allowed(&spec)?;

        worker.instance_name = spec.instance_name.to_string();
        worker.started_at = Utc::now();
        worker.restarts += 1;
        worker.installed_routes.clear();
        info!(worker_id, instance = spec.instance_name, restarts = worker.restarts, "Tunnel worker restarted");
        Ok(())
    }

    fn worker_status(&self, worker_id: u64) -> Option<WorkerStatus> {
        self.workers.lock().get(&worker_id).map(|w| WorkerStatus {
            worker_id,
            instance_name: w.instance_name.clone(),
            alive: true,
            started_at: w.started_at,
            restarts: w.restarts,
        })
    }

    fn apply_routes(&self, worker_id: u64, routes: &[RouteRule]) -> Result<usize, DriverError> {
        let mut workers = self.workers.lock();
        let worker = workers
            .get_mut(&worker_id)
            .ok_or(DriverError::UnknownWorker(worker_id))?;
        worker.installed_routes = routes.iter().map(|r| r.destination.clone()).collect();
        debug!(worker_id, count = routes.len(), "Routes installed");
        Ok(routes.len())
    }

    fn detect_routes(&self, worker_id: u64) -> Result<Vec<String>, DriverError> {
        let instance = self
            .workers
            .lock()
            .get(&worker_id)
            .map(|w| w.instance_name.clone())
            .ok_or(DriverError::UnknownWorker(worker_id))?;
        Ok(self
            .pushed_routes
            .lock()
            .get(&instance)
            .cloned()
            .unwrap_or_default())
    }
}
