//! # Dispatcher
//!
//! Owns the control-plane state and runs handlers against it.
//!
//! ## Locking
//!
//! One `RwLock` guards the whole [`ControlPlane`]. Read handlers share the
//! read lock and see a consistent snapshot; write handlers hold the write
//! lock for their whole run, so mutations are serialized and never
//! observed half-done.
//!
//! ## Atomicity
//!
//! A write handler runs against the live state after a copy is taken. If
//! it fails, the copy is put back. After a successful write that changed
//! something, the state is saved through the optional [`SnapshotStore`]
//! while the write lock is still held, so saves happen in mutation order.

use crate::domain::error::RpcError;
use crate::domain::params::Params;
use crate::handlers::{handler_for, Handler, HandlerEnv, HandlerResult, RuntimeView, WriteHandler};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use shared_types::{Method, Outcome, UnknownMethod};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use vc_02_registry::{ControlPlane, SnapshotStore, StoreError, TunnelDriver};

/// Dispatch counters.
#[derive(Debug, Default)]
pub struct DispatchStats {
    reads: AtomicU64,
    writes: AtomicU64,
    failures: AtomicU64,
    rollbacks: AtomicU64,
    persist_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStatsSnapshot {
    pub reads: u64,
    pub writes: u64,
    /// Handler results with `success: false`.
    pub failures: u64,
    /// Failed writes whose partial changes were undone.
    pub rollbacks: u64,
    pub persist_failures: u64,
}

impl DispatchStats {
    #[must_use]
    pub fn snapshot(&self) -> DispatchStatsSnapshot {
        DispatchStatsSnapshot {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            rollbacks: self.rollbacks.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
        }
    }
}

pub struct Dispatcher {
    state: RwLock<ControlPlane>,
    driver: Arc<dyn TunnelDriver>,
    store: Option<Arc<dyn SnapshotStore>>,
    service_name: String,
    started_at: DateTime<Utc>,
    stats: DispatchStats,
}

impl Dispatcher {
    pub fn new(service_name: impl Into<String>, driver: Arc<dyn TunnelDriver>) -> Self {
        Self {
            state: RwLock::new(ControlPlane::new()),
            driver,
            store: None,
            service_name: service_name.into(),
            started_at: Utc::now(),
            stats: DispatchStats::default(),
        }
    }

    /// Save the state through `store` after every successful mutation.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn with_state(self, state: ControlPlane) -> Self {
        *self.state.write() = state;
        self
    }

    /// Build a dispatcher from the last saved snapshot.
    ///
    /// Workers from a previous run are gone, so every instance comes back
    /// stopped and enabled instances are started again.
    pub fn restore(
        service_name: impl Into<String>,
        driver: Arc<dyn TunnelDriver>,
        store: Arc<dyn SnapshotStore>,
    ) -> Result<Self, StoreError> {
        let mut state = store.load()?.unwrap_or_default();
        state.reset_runtime_state();
        let failed = state.start_all_enabled(driver.as_ref());

        info!(
            instances = state.instance_count(),
            running = state.running_count(),
            failed = failed.len(),
            "Registry restored"
        );
        store.save(&state)?;
        Ok(Self::new(service_name, driver).with_state(state).with_store(store))
    }

    /// Run `method`. Handler failures come back as a failed [`Outcome`].
    pub fn dispatch(&self, method: Method, params: &Params) -> Outcome {
        let env = HandlerEnv {
            driver: self.driver.as_ref(),
            runtime: self.runtime_view(),
            now: Utc::now(),
        };

        let result = match handler_for(method) {
            Handler::Read(handler) => {
                self.stats.reads.fetch_add(1, Ordering::Relaxed);
                let state = self.state.read();
                handler(&state, &env, params)
            }
            Handler::Write(handler) => {
                self.stats.writes.fetch_add(1, Ordering::Relaxed);
                self.run_write(method, handler, &env, params)
            }
        };

        match result {
            Ok(outcome) => outcome,
            Err(err) => {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                debug!(method = %method, kind = %err.kind, error = %err, "Handler failed");
                err.into_outcome()
            }
        }
    }

    /// Run a method given by wire name.
    pub fn dispatch_named(&self, method: &str, params: &Params) -> Result<Outcome, UnknownMethod> {
        let method = method.parse::<Method>()?;
        Ok(self.dispatch(method, params))
    }

    fn run_write(
        &self,
        method: Method,
        handler: WriteHandler,
        env: &HandlerEnv<'_>,
        params: &Params,
    ) -> HandlerResult {
        let mut state = self.state.write();
        let before = state.clone();

        match handler(&mut state, env, params) {
            Ok(outcome) => {
                if *state != before {
                    self.persist(&state);
                }
                Ok(outcome)
            }
            Err(err) => {
                if *state != before {
                    self.stats.rollbacks.fetch_add(1, Ordering::Relaxed);
                    warn!(method = %method, error = %err, "Rolling back failed mutation");
                    *state = before;
                }
                Err(err)
            }
        }
    }

    /// A failed save is logged and counted; the mutation stands.
    fn persist(&self, state: &ControlPlane) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store.save(state) {
            self.stats.persist_failures.fetch_add(1, Ordering::Relaxed);
            error!(error = %e, "Failed to save registry snapshot");
        }
    }

    fn runtime_view(&self) -> RuntimeView<'_> {
        RuntimeView {
            service_name: &self.service_name,
            version: env!("CARGO_PKG_VERSION"),
            started_at: self.started_at,
            dispatch: self.stats.snapshot(),
        }
    }

    /// Consistent copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> ControlPlane {
        self.state.read().clone()
    }

    /// `(instances, running)`.
    #[must_use]
    pub fn instance_counts(&self) -> (usize, usize) {
        let state = self.state.read();
        (state.instance_count(), state.running_count())
    }

    #[must_use]
    pub fn stats(&self) -> DispatchStatsSnapshot {
        self.stats.snapshot()
    }

    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Stop every running worker, keeping records and routes.
    ///
    /// Used on shutdown. Nothing is saved, so enabled instances start
    /// again on the next run.
    pub fn stop_all(&self) -> Vec<(String, RpcError)> {
        let mut state = self.state.write();
        let running: Vec<String> = state
            .instances()
            .filter(|r| r.is_running)
            .map(|r| r.name.clone())
            .collect();

        running
            .into_iter()
            .filter_map(|name| {
                state
                    .stop_instance(&name, self.driver.as_ref())
                    .err()
                    .map(|e| (name, RpcError::from(e)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use shared_types::FailureKind;
    use vc_02_registry::{InMemoryTunnelDriver, RouteDraft};

    const OPENVPN: &str = "client\ndev tun\nproto udp\nremote vpn.example.com 1194\nroute 10.20.0.0 255.255.0.0\n";

    fn dispatcher() -> (Dispatcher, Arc<InMemoryTunnelDriver>) {
        let driver = Arc::new(InMemoryTunnelDriver::new());
        (Dispatcher::new("test-vpn", driver.clone()), driver)
    }

    fn call(d: &Dispatcher, method: &str, params: Value) -> Value {
        let Value::Object(params) = params else {
            panic!("params must be an object");
        };
        d.dispatch_named(method, &params).unwrap().into_value()
    }

    fn add_vpn0(d: &Dispatcher) -> Value {
        call(
            d,
            "add",
            json!({"name": "vpn0", "config": OPENVPN, "auto_start": false}),
        )
    }

    #[derive(Default)]
    struct MemoryStore {
        saved: parking_lot::Mutex<Option<ControlPlane>>,
        saves: AtomicU64,
    }

    impl SnapshotStore for MemoryStore {
        fn load(&self) -> Result<Option<ControlPlane>, StoreError> {
            Ok(self.saved.lock().clone())
        }

        fn save(&self, state: &ControlPlane) -> Result<(), StoreError> {
            self.saves.fetch_add(1, Ordering::Relaxed);
            *self.saved.lock() = Some(state.clone());
            Ok(())
        }
    }

    #[test]
    fn test_add_then_duplicate() {
        let (d, _) = dispatcher();
        let first = add_vpn0(&d);
        assert_eq!(first["success"], true);
        assert_eq!(first["message"], "VPN instance added successfully");
        assert_eq!(first["instance"]["type"], "openvpn");

        let before = d.snapshot();
        let second = call(&d, "add", json!({"instance_name": "vpn0", "config_content": "[Interface]\n"}));
        assert_eq!(second["success"], false);
        assert_eq!(second["error_kind"], "conflict");
        assert!(second["error"].as_str().unwrap().contains("already exists"));
        assert_eq!(d.snapshot(), before);
    }

    #[test]
    fn test_add_defaults_to_auto_start() {
        let (d, driver) = dispatcher();
        let result = call(&d, "add", json!({"instance_name": "vpn0", "config_content": OPENVPN}));
        assert_eq!(result["message"], "VPN instance added and started successfully");
        assert_eq!(result["instance"]["status"], "running");
        assert_eq!(driver.live_workers(), 1);
    }

    #[test]
    fn test_missing_field_is_named() {
        let (d, _) = dispatcher();
        let result = call(&d, "start", json!({}));
        assert_eq!(
            result,
            json!({"success": false, "error": "Missing 'instance_name'", "error_kind": "validation"})
        );
    }

    #[test]
    fn test_status_round_trip_and_delete() {
        let (d, _) = dispatcher();
        add_vpn0(&d);

        let status = call(&d, "status", json!({"instance_name": "vpn0"}));
        assert_eq!(status["config_content"], OPENVPN);
        assert_eq!(status["status"]["name"], "vpn0");
        assert_eq!(status["status"]["status"], "stopped");

        assert_eq!(call(&d, "delete", json!({"instance_name": "vpn0"}))["success"], true);
        let status = call(&d, "status", json!({"instance_name": "vpn0"}));
        assert_eq!(status["error_kind"], "not_found");
        assert_eq!(call(&d, "list", json!({}))["instances"], json!([]));
    }

    #[test]
    fn test_start_stop_are_idempotent() {
        let (d, _) = dispatcher();
        add_vpn0(&d);

        assert_eq!(call(&d, "start", json!({"instance_name": "vpn0"}))["changed"], true);
        let running = d.snapshot();
        let again = call(&d, "start", json!({"instance_name": "vpn0"}));
        assert_eq!(again["success"], true);
        assert_eq!(again["changed"], false);
        assert_eq!(d.snapshot(), running);

        call(&d, "stop", json!({"instance_name": "vpn0"}));
        let stopped = d.snapshot();
        let again = call(&d, "stop", json!({"instance_name": "vpn0"}));
        assert_eq!(again["success"], true);
        assert_eq!(again["message"], "Instance already stopped");
        assert_eq!(d.snapshot(), stopped);
    }

    #[test]
    fn test_list_unknown_type_is_empty() {
        let (d, _) = dispatcher();
        add_vpn0(&d);
        let result = call(&d, "list", json!({"vpn_type": "bogus"}));
        assert_eq!(result, json!({"success": true, "count": 0, "instances": []}));
        assert_eq!(call(&d, "list", json!({"type": "openvpn"}))["count"], 1);
    }

    #[test]
    fn test_delete_missing_custom_route() {
        let (d, _) = dispatcher();
        let result = call(&d, "delete-custom-route", json!({"id": "r1"}));
        assert_eq!(result["success"], false);
        assert_eq!(result["error_kind"], "not_found");
        assert!(result["error"].as_str().unwrap().contains("not found"));
    }

    #[test]
    fn test_partial_custom_route_update() {
        let (d, _) = dispatcher();
        call(
            &d,
            "add-custom-route",
            json!({"id": "r1", "destination": "10.0.0.0/8", "description": "office", "gateway": "10.8.0.1"}),
        );
        let result = call(&d, "update-custom-route", json!({"id": "r1", "priority": 7}));
        assert_eq!(result["success"], true);

        let rule = &call(&d, "get-custom-route", json!({"id": "r1"}))["routing_rule"];
        assert_eq!(rule["priority"], 7);
        assert_eq!(rule["destination"], "10.0.0.0/8");
        assert_eq!(rule["description"], "office");
        assert_eq!(rule["gateway"], "10.8.0.1");
    }

    #[test]
    fn test_delete_cascades_to_instance_routes_only() {
        let (d, _) = dispatcher();
        add_vpn0(&d);
        for i in 0..3 {
            let result = call(
                &d,
                "add-instance-route",
                json!({"instance_name": "vpn0", "id": format!("r{i}"), "destination": format!("10.{i}.0.0/16")}),
            );
            assert_eq!(result["success"], true, "{result}");
        }
        call(&d, "add-custom-route", json!({"id": "g1", "destination": "172.16.0.0/12"}));
        assert_eq!(call(&d, "get-instance-routes", json!({"instance_name": "vpn0"}))["count"], 3);

        call(&d, "delete", json!({"instance_name": "vpn0"}));
        add_vpn0(&d);
        assert_eq!(call(&d, "get-instance-routes", json!({"instance_name": "vpn0"}))["count"], 0);
        assert_eq!(call(&d, "list-custom-routes", json!({}))["count"], 1);
    }

    #[test]
    fn test_apply_and_detect() {
        let (d, driver) = dispatcher();
        add_vpn0(&d);
        call(&d, "add-instance-route", json!({"instance_name": "vpn0", "id": "r1", "destination": "10.1.0.0/16"}));

        let result = call(&d, "apply-instance-routes", json!({"instance_name": "vpn0"}));
        assert_eq!(result["error_kind"], "state");

        call(&d, "start", json!({"instance_name": "vpn0"}));
        driver.push_routes("vpn0", ["192.168.50.0/24"]);
        let result = call(&d, "apply-instance-routes", json!({"instance_name": "vpn0"}));
        assert_eq!(result["applied"], 1);

        let before = d.snapshot();
        let detected = call(&d, "detect-instance-routes", json!({"instance_name": "vpn0"}));
        assert_eq!(detected["count"], 2);
        assert_eq!(detected["detected_routes"][0]["destination"], "10.20.0.0/16");
        assert_eq!(detected["detected_routes"][1]["source"], "driver");
        assert_eq!(d.snapshot(), before);
    }

    #[test]
    fn test_purge_requires_confirmation() {
        let (d, driver) = dispatcher();
        call(&d, "add", json!({"instance_name": "vpn0", "config_content": OPENVPN}));

        let refused = call(&d, "purge-cleanup", json!({}));
        assert_eq!(refused["error"], "Missing 'confirm'");
        assert_eq!(d.instance_counts(), (1, 1));

        let done = call(&d, "purge-cleanup", json!({"confirm": true}));
        assert_eq!(done["report"]["instances_removed"], 1);
        assert_eq!(d.instance_counts(), (0, 0));
        assert_eq!(driver.live_workers(), 0);
    }

    #[test]
    fn test_thread_methods() {
        let (d, _) = dispatcher();
        add_vpn0(&d);

        let all = call(&d, "thread_status", json!({}));
        assert_eq!(all["total_threads"], 1);
        assert_eq!(all["running_threads"], 0);

        let started = call(&d, "thread_operation", json!({"thread_name": "vpn0", "operation": "start"}));
        assert_eq!(started["message"], "Thread started");
        assert_eq!(started["thread"]["alive"], true);

        let status = call(&d, "thread_operation", json!({"thread_name": "vpn0"}));
        assert_eq!(status["thread"]["running"], true);

        let missing = call(&d, "thread_operation", json!({"thread_name": "ghost", "operation": "stop"}));
        assert_eq!(missing["error_kind"], "not_found");
    }

    #[test]
    fn test_runtime_info_counts_dispatches() {
        let (d, _) = dispatcher();
        add_vpn0(&d);
        call(&d, "start", json!({}));

        let info = call(&d, "runtime-info", json!({}));
        assert_eq!(info["service"], "test-vpn");
        assert_eq!(info["status"], "running");
        assert_eq!(info["total_threads"], 1);
        assert_eq!(info["dispatch"]["writes"], 2);
        assert_eq!(info["dispatch"]["failures"], 1);
    }

    #[test]
    fn test_unknown_method() {
        let (d, _) = dispatcher();
        let err = d.dispatch_named("frobnicate", &Params::new()).unwrap_err();
        assert_eq!(err, UnknownMethod("frobnicate".into()));
    }

    fn add_route_then_fail(state: &mut ControlPlane, _env: &HandlerEnv<'_>, _params: &Params) -> HandlerResult {
        state.add_custom_route(RouteDraft::new("half", "10.0.0.0/8"))?;
        Err(RpcError::new(FailureKind::State, "second step failed"))
    }

    #[test]
    fn test_failed_write_is_rolled_back() {
        let (d, _) = dispatcher();
        let env = HandlerEnv {
            driver: d.driver.as_ref(),
            runtime: d.runtime_view(),
            now: Utc::now(),
        };

        let err = d
            .run_write(Method::AddCustomRoute, add_route_then_fail, &env, &Params::new())
            .unwrap_err();
        assert_eq!(err.message, "second step failed");
        assert!(d.snapshot().custom_routes().is_empty());
        assert_eq!(d.stats().rollbacks, 1);
    }

    #[test]
    fn test_saves_only_after_changes() {
        let driver = Arc::new(InMemoryTunnelDriver::new());
        let store = Arc::new(MemoryStore::default());
        let d = Dispatcher::new("test-vpn", driver).with_store(store.clone());

        add_vpn0(&d);
        assert_eq!(store.saves.load(Ordering::Relaxed), 1);

        call(&d, "list", json!({}));
        call(&d, "stop", json!({"instance_name": "vpn0"}));
        call(&d, "add", json!({"instance_name": "vpn0", "config_content": OPENVPN}));
        assert_eq!(store.saves.load(Ordering::Relaxed), 1);

        call(&d, "start", json!({"instance_name": "vpn0"}));
        assert_eq!(store.saves.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_restore_restarts_enabled_instances() {
        let store = Arc::new(MemoryStore::default());
        {
            let d = Dispatcher::new("test-vpn", Arc::new(InMemoryTunnelDriver::new()))
                .with_store(store.clone());
            call(&d, "add", json!({"instance_name": "on", "config_content": OPENVPN}));
            add_vpn0(&d);
        }

        let driver = Arc::new(InMemoryTunnelDriver::new());
        let d = Dispatcher::restore("test-vpn", driver.clone(), store).unwrap();
        let state = d.snapshot();
        assert!(state.instance("on").unwrap().is_running);
        assert!(!state.instance("vpn0").unwrap().is_running);
        assert_eq!(driver.live_workers(), 1);
    }

    #[test]
    fn test_stop_all() {
        let (d, driver) = dispatcher();
        call(&d, "add", json!({"instance_name": "a", "config_content": OPENVPN}));
        call(&d, "add", json!({"instance_name": "b", "config_content": OPENVPN}));
        assert!(d.stop_all().is_empty());
        assert_eq!(driver.live_workers(), 0);
        assert_eq!(d.instance_counts(), (2, 0));
    }
}
