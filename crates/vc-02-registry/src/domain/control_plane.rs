//! # Control Plane State
//!
//! The instance registry and both route tables in one owned value.
//!
//! ## Invariants
//!
//! | Invariant | Enforcement |
//! |-----------|-------------|
//! | Instance names are unique | `add_instance` / `enable_instance` reject or reuse existing names |
//! | Route ids are unique per scope | `add_*_route` reject existing ids |
//! | Instance routes never outlive their instance | `delete_instance` and `purge` drop the instance's table |
//! | A failed operation changes nothing | every operation validates and calls the driver before writing |
//! | `is_running` ⇔ a live driver worker | workers are started/stopped before the record is updated |

use super::errors::RegistryError;
use super::instance::{InstanceRecord, InstanceStatus};
use super::profile::{detect_vpn_type, parse_config};
use super::route::{RouteDraft, RoutePatch, RouteRule, RouteScope};
use super::value_objects::{validate_identifier, VpnType};
use crate::ports::driver::{DriverError, TunnelDriver, TunnelSpec};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Input for creating an instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInstance {
    pub name: String,
    pub config_content: String,
    /// Detected from the config when absent.
    pub vpn_type: Option<VpnType>,
    pub auto_start: bool,
}

/// Whether a start/stop actually changed anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Changed,
    /// Already in the requested state.
    Unchanged,
}

impl Transition {
    #[must_use]
    pub fn changed(self) -> bool {
        self == Self::Changed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    pub was_running: bool,
    pub routes_removed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EnableReport {
    pub created: bool,
    pub started: Transition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub applied: usize,
    /// Disabled rules that were left out.
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    pub instances_removed: usize,
    pub workers_stopped: usize,
    pub instance_routes_removed: usize,
    pub custom_routes_removed: usize,
    /// Instances whose worker could not be stopped cleanly.
    pub stop_failures: Vec<String>,
}

/// Where a detected route came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteSource {
    Config,
    Driver,
}

/// A route the tunnel would carry, found by `detect_instance_routes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectedRoute {
    pub destination: String,
    pub source: RouteSource,
    /// An instance route with this destination already exists.
    pub already_present: bool,
    /// Id to use when adding this route.
    pub suggested_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerReport {
    pub instance_name: String,
    pub worker_id: Option<u64>,
    pub running: bool,
    /// The driver still knows the worker.
    pub alive: bool,
    pub uptime_secs: u64,
    pub restarts: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub total_instances: usize,
    pub running_instances: usize,
    pub enabled_instances: usize,
    pub openvpn_instances: usize,
    pub wireguard_instances: usize,
    pub custom_routes: usize,
    pub instance_routes: usize,
    pub applied_routes: usize,
}

/// Registry plus route tables.
///
/// Mutating methods take the tunnel driver explicitly; the value itself is
/// plain data and serializes as the persisted snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlPlane {
    instances: BTreeMap<String, InstanceRecord>,
    custom_routes: BTreeMap<String, RouteRule>,
    instance_routes: BTreeMap<String, BTreeMap<String, RouteRule>>,
}

impl ControlPlane {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Instances
    // =========================================================================

    pub fn add_instance(
        &mut self,
        request: NewInstance,
        driver: &dyn TunnelDriver,
    ) -> Result<&InstanceRecord, RegistryError> {
        validate_identifier("instance_name", &request.name)?;
        let parsed = parse_config(&request.config_content, request.vpn_type)?;
        if self.instances.contains_key(&request.name) {
            return Err(RegistryError::InstanceExists { name: request.name });
        }

        let now = Utc::now();
        let mut record = InstanceRecord {
            name: request.name,
            vpn_type: parsed.vpn_type,
            config_content: request.config_content,
            is_running: false,
            is_enabled: request.auto_start,
            auto_start: request.auto_start,
            created_at: now,
            updated_at: now,
            started_at: None,
            worker_id: None,
            profile: parsed.profile,
        };

        if request.auto_start {
            let worker_id = driver.start(spec_of(&record))?;
            record.mark_started(worker_id, now);
        }

        info!(
            instance = %record.name,
            vpn_type = %record.vpn_type,
            running = record.is_running,
            "VPN instance added"
        );
        let name = record.name.clone();
        Ok(self.instances.entry(name).or_insert(record))
    }

    /// Replace an instance's config. A running instance is restarted with it.
    ///
    /// Returns whether a restart happened.
    pub fn update_instance(
        &mut self,
        name: &str,
        config_content: String,
        vpn_type: Option<VpnType>,
        driver: &dyn TunnelDriver,
    ) -> Result<bool, RegistryError> {
        validate_identifier("instance_name", name)?;
        let record = self.record(name)?;

        let vpn_type = vpn_type
            .or_else(|| detect_vpn_type(&config_content))
            .unwrap_or(record.vpn_type);
        let parsed = parse_config(&config_content, Some(vpn_type))?;

        let mut updated = record.clone();
        updated.vpn_type = parsed.vpn_type;
        updated.config_content = config_content;
        updated.profile = parsed.profile;
        let now = Utc::now();
        updated.updated_at = now;

        let restarted = updated.is_running;
        if let Some(worker_id) = updated.worker_id.filter(|_| updated.is_running) {
            let worker_id = restart_worker(driver, worker_id, spec_of(&updated))?;
            updated.mark_started(worker_id, now);
        }

        info!(instance = name, restarted, "VPN instance updated");
        self.instances.insert(name.to_string(), updated);
        if restarted {
            self.clear_applied(name);
        }
        Ok(restarted)
    }

    /// Remove an instance from any state, stopping its worker and dropping
    /// its routes.
    pub fn delete_instance(
        &mut self,
        name: &str,
        driver: &dyn TunnelDriver,
    ) -> Result<DeleteReport, RegistryError> {
        validate_identifier("instance_name", name)?;
        let record = self.record(name)?;
        let was_running = record.is_running;
        if let Some(worker_id) = record.worker_id {
            stop_worker(driver, worker_id)?;
        }

        self.instances.remove(name);
        let routes_removed = self
            .instance_routes
            .remove(name)
            .map_or(0, |routes| routes.len());
        info!(instance = name, was_running, routes_removed, "VPN instance deleted");
        Ok(DeleteReport {
            was_running,
            routes_removed,
        })
    }

    /// Start an instance. Starting a running instance changes nothing.
    pub fn start_instance(
        &mut self,
        name: &str,
        driver: &dyn TunnelDriver,
    ) -> Result<Transition, RegistryError> {
        validate_identifier("instance_name", name)?;
        let record = self.record(name)?;
        if record.is_running {
            debug!(instance = name, "Start requested for running instance");
            return Ok(Transition::Unchanged);
        }

        let worker_id = driver.start(spec_of(record))?;
        let now = Utc::now();
        let record = self.record_mut(name)?;
        record.mark_started(worker_id, now);
        record.updated_at = now;
        info!(instance = name, worker_id, "VPN instance started");
        Ok(Transition::Changed)
    }

    /// Stop an instance. Stopping a stopped instance changes nothing.
    pub fn stop_instance(
        &mut self,
        name: &str,
        driver: &dyn TunnelDriver,
    ) -> Result<Transition, RegistryError> {
        validate_identifier("instance_name", name)?;
        let record = self.record(name)?;
        let Some(worker_id) = record.worker_id.filter(|_| record.is_running) else {
            debug!(instance = name, "Stop requested for stopped instance");
            return Ok(Transition::Unchanged);
        };

        stop_worker(driver, worker_id)?;
        let record = self.record_mut(name)?;
        record.mark_stopped();
        record.updated_at = Utc::now();
        self.clear_applied(name);
        info!(instance = name, worker_id, "VPN instance stopped");
        Ok(Transition::Changed)
    }

    /// Restart a running instance, or start a stopped one.
    pub fn restart_instance(
        &mut self,
        name: &str,
        driver: &dyn TunnelDriver,
    ) -> Result<(), RegistryError> {
        validate_identifier("instance_name", name)?;
        let record = self.record(name)?;
        let worker_id = match record.worker_id.filter(|_| record.is_running) {
            Some(worker_id) => restart_worker(driver, worker_id, spec_of(record))?,
            None => driver.start(spec_of(record))?,
        };

        let now = Utc::now();
        let record = self.record_mut(name)?;
        record.mark_started(worker_id, now);
        record.updated_at = now;
        self.clear_applied(name);
        info!(instance = name, worker_id, "VPN instance restarted");
        Ok(())
    }

    /// Mark an instance enabled and make sure it runs, creating it first
    /// when absent. An existing instance keeps its config.
    pub fn enable_instance(
        &mut self,
        name: &str,
        config: Option<(String, Option<VpnType>)>,
        driver: &dyn TunnelDriver,
    ) -> Result<EnableReport, RegistryError> {
        validate_identifier("instance_name", name)?;

        if !self.instances.contains_key(name) {
            let (config_content, vpn_type) = config
                .filter(|(content, _)| !content.trim().is_empty())
                .ok_or(RegistryError::MissingField {
                    field: "config_content",
                })?;
            self.add_instance(
                NewInstance {
                    name: name.to_string(),
                    config_content,
                    vpn_type,
                    auto_start: true,
                },
                driver,
            )?;
            return Ok(EnableReport {
                created: true,
                started: Transition::Changed,
            });
        }

        let started = self.start_instance(name, driver)?;
        let record = self.record_mut(name)?;
        record.is_enabled = true;
        record.auto_start = true;
        record.updated_at = Utc::now();
        Ok(EnableReport {
            created: false,
            started,
        })
    }

    /// Stop an instance and clear its enabled flag, keeping the record.
    pub fn disable_instance(
        &mut self,
        name: &str,
        driver: &dyn TunnelDriver,
    ) -> Result<Transition, RegistryError> {
        let stopped = self.stop_instance(name, driver)?;
        let record = self.record_mut(name)?;
        record.is_enabled = false;
        record.auto_start = false;
        record.updated_at = Utc::now();
        Ok(stopped)
    }

    pub fn instance(&self, name: &str) -> Result<&InstanceRecord, RegistryError> {
        validate_identifier("instance_name", name)?;
        self.record(name)
    }

    pub fn instances(&self) -> impl Iterator<Item = &InstanceRecord> {
        self.instances.values()
    }

    /// Instances of one type, or all. An unrecognized type matches nothing.
    #[must_use]
    pub fn list_instances(&self, vpn_type: Option<&str>) -> Vec<&InstanceRecord> {
        match vpn_type.map(str::parse::<VpnType>) {
            None => self.instances.values().collect(),
            Some(Ok(wanted)) => self
                .instances
                .values()
                .filter(|record| record.vpn_type == wanted)
                .collect(),
            Some(Err(_)) => Vec::new(),
        }
    }

    pub fn instance_status(
        &self,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<InstanceStatus, RegistryError> {
        let record = self.instance(name)?;
        Ok(record.status(self.route_count(name), now))
    }

    #[must_use]
    pub fn status_of(&self, record: &InstanceRecord, now: DateTime<Utc>) -> InstanceStatus {
        record.status(self.route_count(&record.name), now)
    }

    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    #[must_use]
    pub fn running_count(&self) -> usize {
        self.instances.values().filter(|r| r.is_running).count()
    }

    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        let mut stats = RegistryStats {
            total_instances: self.instances.len(),
            custom_routes: self.custom_routes.len(),
            ..RegistryStats::default()
        };
        for record in self.instances.values() {
            stats.running_instances += usize::from(record.is_running);
            stats.enabled_instances += usize::from(record.is_enabled);
            match record.vpn_type {
                VpnType::OpenVpn => stats.openvpn_instances += 1,
                VpnType::WireGuard => stats.wireguard_instances += 1,
            }
        }
        for routes in self.instance_routes.values() {
            stats.instance_routes += routes.len();
            stats.applied_routes += routes.values().filter(|r| r.applied).count();
        }
        stats
    }

    // =========================================================================
    // Workers
    // =========================================================================

    pub fn worker_report(
        &self,
        name: &str,
        driver: &dyn TunnelDriver,
        now: DateTime<Utc>,
    ) -> Result<WorkerReport, RegistryError> {
        let record = self.instance(name)?;
        Ok(worker_report(record, driver, now))
    }

    #[must_use]
    pub fn worker_reports(&self, driver: &dyn TunnelDriver, now: DateTime<Utc>) -> Vec<WorkerReport> {
        self.instances
            .values()
            .map(|record| worker_report(record, driver, now))
            .collect()
    }

    /// Start every enabled instance that is not running.
    ///
    /// Returns the instances that failed to start.
    pub fn start_all_enabled(&mut self, driver: &dyn TunnelDriver) -> Vec<(String, RegistryError)> {
        let names: Vec<String> = self
            .instances
            .values()
            .filter(|r| r.is_enabled && !r.is_running)
            .map(|r| r.name.clone())
            .collect();

        let mut failures = Vec::new();
        for name in names {
            if let Err(e) = self.start_instance(&name, driver) {
                warn!(instance = %name, error = %e, "Failed to start enabled instance");
                failures.push((name, e));
            }
        }
        failures
    }

    /// Forget runtime state after loading a snapshot: no worker from a
    /// previous run is alive, and no route is installed.
    pub fn reset_runtime_state(&mut self) {
        for record in self.instances.values_mut() {
            record.mark_stopped();
        }
        for routes in self.instance_routes.values_mut() {
            for rule in routes.values_mut() {
                rule.applied = false;
            }
        }
        for rule in self.custom_routes.values_mut() {
            rule.applied = false;
        }
    }

    /// Stop every worker and clear instances and both route tables.
    ///
    /// A worker that fails to stop is reported, not fatal.
    pub fn purge(&mut self, driver: &dyn TunnelDriver) -> PurgeReport {
        let mut report = PurgeReport::default();

        for record in self.instances.values() {
            if let Some(worker_id) = record.worker_id {
                match stop_worker(driver, worker_id) {
                    Ok(()) => report.workers_stopped += 1,
                    Err(e) => {
                        warn!(instance = %record.name, error = %e, "Worker did not stop during purge");
                        report.stop_failures.push(record.name.clone());
                    }
                }
            }
        }

        report.instances_removed = self.instances.len();
        report.instance_routes_removed = self.instance_routes.values().map(BTreeMap::len).sum();
        report.custom_routes_removed = self.custom_routes.len();
        self.instances.clear();
        self.instance_routes.clear();
        self.custom_routes.clear();

        info!(
            instances = report.instances_removed,
            instance_routes = report.instance_routes_removed,
            custom_routes = report.custom_routes_removed,
            "Registry purged"
        );
        report
    }

    // =========================================================================
    // Global custom routes
    // =========================================================================

    pub fn add_custom_route(&mut self, draft: RouteDraft) -> Result<&RouteRule, RegistryError> {
        let rule = draft.into_rule(RouteScope::Global)?;
        if self.custom_routes.contains_key(&rule.id) {
            return Err(RegistryError::RouteExists { id: rule.id });
        }
        debug!(route_id = %rule.id, destination = %rule.destination, "Custom route added");
        let id = rule.id.clone();
        Ok(self.custom_routes.entry(id).or_insert(rule))
    }

    pub fn update_custom_route(
        &mut self,
        id: &str,
        patch: RoutePatch,
    ) -> Result<&RouteRule, RegistryError> {
        validate_identifier("id", id)?;
        let existing = self
            .custom_routes
            .get_mut(id)
            .ok_or_else(|| RegistryError::RouteNotFound { id: id.to_string() })?;
        *existing = existing.patched(patch)?;
        debug!(route_id = id, "Custom route updated");
        Ok(existing)
    }

    pub fn delete_custom_route(&mut self, id: &str) -> Result<RouteRule, RegistryError> {
        validate_identifier("id", id)?;
        let removed = self
            .custom_routes
            .remove(id)
            .ok_or_else(|| RegistryError::RouteNotFound { id: id.to_string() })?;
        debug!(route_id = id, "Custom route deleted");
        Ok(removed)
    }

    pub fn custom_route(&self, id: &str) -> Result<&RouteRule, RegistryError> {
        validate_identifier("id", id)?;
        self.custom_routes
            .get(id)
            .ok_or_else(|| RegistryError::RouteNotFound { id: id.to_string() })
    }

    /// Global rules ordered by priority, then id.
    #[must_use]
    pub fn custom_routes(&self) -> Vec<&RouteRule> {
        by_priority(self.custom_routes.values())
    }

    // =========================================================================
    // Instance routes
    // =========================================================================

    pub fn add_instance_route(
        &mut self,
        instance: &str,
        draft: RouteDraft,
    ) -> Result<&RouteRule, RegistryError> {
        self.instance(instance)?;
        let rule = draft.into_rule(RouteScope::Instance {
            name: instance.to_string(),
        })?;

        let routes = self.instance_routes.entry(instance.to_string()).or_default();
        if routes.contains_key(&rule.id) {
            return Err(RegistryError::RouteExists { id: rule.id });
        }
        debug!(instance, route_id = %rule.id, destination = %rule.destination, "Instance route added");
        let id = rule.id.clone();
        Ok(routes.entry(id).or_insert(rule))
    }

    pub fn delete_instance_route(
        &mut self,
        instance: &str,
        id: &str,
    ) -> Result<RouteRule, RegistryError> {
        self.instance(instance)?;
        validate_identifier("rule_id", id)?;
        let not_found = || RegistryError::RouteNotFound { id: id.to_string() };

        let routes = self.instance_routes.get_mut(instance).ok_or_else(not_found)?;
        let removed = routes.remove(id).ok_or_else(not_found)?;
        if routes.is_empty() {
            self.instance_routes.remove(instance);
        }
        debug!(instance, route_id = id, "Instance route deleted");
        Ok(removed)
    }

    /// An instance's rules ordered by priority, then id.
    pub fn instance_routes(&self, instance: &str) -> Result<Vec<&RouteRule>, RegistryError> {
        self.instance(instance)?;
        Ok(self
            .instance_routes
            .get(instance)
            .map(|routes| by_priority(routes.values()))
            .unwrap_or_default())
    }

    #[must_use]
    pub fn route_count(&self, instance: &str) -> usize {
        self.instance_routes.get(instance).map_or(0, BTreeMap::len)
    }

    /// Hand an instance's enabled rules to its running worker.
    pub fn apply_instance_routes(
        &mut self,
        instance: &str,
        driver: &dyn TunnelDriver,
    ) -> Result<ApplyReport, RegistryError> {
        let record = self.instance(instance)?;
        let Some(worker_id) = record.worker_id.filter(|_| record.is_running) else {
            return Err(RegistryError::NotRunning {
                name: instance.to_string(),
            });
        };

        let rules = self.instance_routes(instance)?;
        let enabled: Vec<RouteRule> = rules.iter().filter(|r| r.enabled).map(|r| (*r).clone()).collect();
        let skipped = rules.len() - enabled.len();
        let applied = driver.apply_routes(worker_id, &enabled)?;

        if let Some(routes) = self.instance_routes.get_mut(instance) {
            for rule in routes.values_mut() {
                rule.applied = rule.enabled;
            }
        }
        info!(instance, applied, skipped, "Instance routes applied");
        Ok(ApplyReport { applied, skipped })
    }

    /// Routes the instance's tunnel would carry: those in its config plus
    /// those a running worker reports. Changes nothing.
    pub fn detect_instance_routes(
        &self,
        instance: &str,
        driver: &dyn TunnelDriver,
    ) -> Result<Vec<DetectedRoute>, RegistryError> {
        let record = self.instance(instance)?;

        let mut candidates: Vec<(String, RouteSource)> = record
            .profile
            .routes
            .iter()
            .map(|d| (d.clone(), RouteSource::Config))
            .collect();
        if let Some(worker_id) = record.worker_id.filter(|_| record.is_running) {
            for destination in driver.detect_routes(worker_id)? {
                let Ok(destination) = super::value_objects::normalize_destination(&destination) else {
                    warn!(instance, destination = %destination, "Ignoring unparsable route from driver");
                    continue;
                };
                if !candidates.iter().any(|(d, _)| *d == destination) {
                    candidates.push((destination, RouteSource::Driver));
                }
            }
        }

        let present: Vec<&str> = self
            .instance_routes
            .get(instance)
            .map(|routes| routes.values().map(|r| r.destination.as_str()).collect())
            .unwrap_or_default();

        Ok(candidates
            .into_iter()
            .map(|(destination, source)| DetectedRoute {
                already_present: present.contains(&destination.as_str()),
                suggested_id: suggested_route_id(&destination),
                destination,
                source,
            })
            .collect())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn record(&self, name: &str) -> Result<&InstanceRecord, RegistryError> {
        self.instances
            .get(name)
            .ok_or_else(|| RegistryError::InstanceNotFound {
                name: name.to_string(),
            })
    }

    /// A fresh or stopped worker carries none of the instance's routes.
    fn clear_applied(&mut self, name: &str) {
        if let Some(routes) = self.instance_routes.get_mut(name) {
            for rule in routes.values_mut() {
                rule.applied = false;
            }
        }
    }

    fn record_mut(&mut self, name: &str) -> Result<&mut InstanceRecord, RegistryError> {
        self.instances
            .get_mut(name)
            .ok_or_else(|| RegistryError::InstanceNotFound {
                name: name.to_string(),
            })
    }
}

fn spec_of(record: &InstanceRecord) -> TunnelSpec<'_> {
    TunnelSpec {
        instance_name: &record.name,
        vpn_type: record.vpn_type,
        config_content: &record.config_content,
    }
}

/// Stop a worker; one the driver no longer knows counts as stopped.
fn stop_worker(driver: &dyn TunnelDriver, worker_id: u64) -> Result<(), DriverError> {
    match driver.stop(worker_id) {
        Err(DriverError::UnknownWorker(_)) => {
            warn!(worker_id, "Worker already gone");
            Ok(())
        }
        other => other,
    }
}

/// Restart a worker in place; one the driver no longer knows is started anew.
fn restart_worker(
    driver: &dyn TunnelDriver,
    worker_id: u64,
    spec: TunnelSpec<'_>,
) -> Result<u64, DriverError> {
    match driver.restart(worker_id, spec) {
        Ok(()) => Ok(worker_id),
        Err(DriverError::UnknownWorker(_)) => {
            warn!(worker_id, instance = spec.instance_name, "Worker gone, starting a new one");
            driver.start(spec)
        }
        Err(e) => Err(e),
    }
}

fn worker_report(record: &InstanceRecord, driver: &dyn TunnelDriver, now: DateTime<Utc>) -> WorkerReport {
    let status = record.worker_id.and_then(|id| driver.worker_status(id));
    WorkerReport {
        instance_name: record.name.clone(),
        worker_id: record.worker_id,
        running: record.is_running,
        alive: status.as_ref().is_some_and(|s| s.alive),
        uptime_secs: record.uptime_secs(now),
        restarts: status.map_or(0, |s| s.restarts),
    }
}

fn by_priority<'a>(rules: impl Iterator<Item = &'a RouteRule>) -> Vec<&'a RouteRule> {
    let mut rules: Vec<&RouteRule> = rules.collect();
    rules.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
    rules
}

/// `auto-` plus the destination with separators replaced (`10.0.0.0/8` →
/// `auto-10.0.0.0-8`).
fn suggested_route_id(destination: &str) -> String {
    let body: String = destination
        .chars()
        .map(|c| if c == '/' || c == ':' { '-' } else { c })
        .collect();
    format!("auto-{body}")
}
