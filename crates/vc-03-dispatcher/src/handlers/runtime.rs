//! Maintenance, worker and runtime handlers.

use super::{HandlerEnv, HandlerResult};
use crate::domain::params::{
    FromParams, Params, PurgeRequest, ThreadOp, ThreadOperationRequest, ThreadStatusRequest,
};
use shared_types::Outcome;
use tracing::warn;
use vc_02_registry::ControlPlane;

pub(crate) fn purge_cleanup(
    state: &mut ControlPlane,
    env: &HandlerEnv<'_>,
    params: &Params,
) -> HandlerResult {
    PurgeRequest::from_params(params)?;
    let report = state.purge(env.driver);
    if !report.stop_failures.is_empty() {
        warn!(instances = ?report.stop_failures, "Purge removed instances whose workers did not stop");
    }
    Ok(Outcome::message("Purge cleanup completed").with("report", report))
}

pub(crate) fn thread_status(
    state: &ControlPlane,
    env: &HandlerEnv<'_>,
    params: &Params,
) -> HandlerResult {
    match ThreadStatusRequest::from_params(params)?.thread {
        Some(name) => {
            let report = state.worker_report(&name, env.driver, env.now)?;
            Ok(Outcome::success().with("thread", report))
        }
        None => {
            let reports = state.worker_reports(env.driver, env.now);
            let running = reports.iter().filter(|r| r.running).count();
            Ok(Outcome::success()
                .with("total_threads", reports.len())
                .with("running_threads", running)
                .with("threads", reports))
        }
    }
}

/// Start, stop or restart one instance's worker, or report on it.
pub(crate) fn thread_operation(
    state: &mut ControlPlane,
    env: &HandlerEnv<'_>,
    params: &Params,
) -> HandlerResult {
    let ThreadOperationRequest { thread, operation } = ThreadOperationRequest::from_params(params)?;
    let message = match operation {
        ThreadOp::Start => {
            if state.start_instance(&thread, env.driver)?.changed() {
                "Thread started"
            } else {
                "Thread already running"
            }
        }
        ThreadOp::Stop => {
            if state.stop_instance(&thread, env.driver)?.changed() {
                "Thread stopped"
            } else {
                "Thread already stopped"
            }
        }
        ThreadOp::Restart => {
            state.restart_instance(&thread, env.driver)?;
            "Thread restarted"
        }
        ThreadOp::Status => "Thread status",
    };
    let report = state.worker_report(&thread, env.driver, env.now)?;
    Ok(Outcome::message(message).with("thread", report))
}

pub(crate) fn runtime_info(
    state: &ControlPlane,
    env: &HandlerEnv<'_>,
    _params: &Params,
) -> HandlerResult {
    let runtime = &env.runtime;
    let threads = state.worker_reports(env.driver, env.now);
    let running = threads.iter().filter(|t| t.running).count();
    let uptime = u64::try_from((env.now - runtime.started_at).num_seconds()).unwrap_or(0);

    Ok(Outcome::message(format!("{} is running", runtime.service_name))
        .with("status", "running")
        .with("service", runtime.service_name)
        .with("version", runtime.version)
        .with("started_at", runtime.started_at)
        .with("uptime_seconds", uptime)
        .with("total_threads", threads.len())
        .with("running_threads", running)
        .with("threads", threads)
        .with("registry", state.stats())
        .with("dispatch", runtime.dispatch))
}
