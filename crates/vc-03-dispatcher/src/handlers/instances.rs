//! Instance lifecycle and query handlers.

use super::{HandlerEnv, HandlerResult};
use crate::domain::params::{
    AddRequest, EnableRequest, FromParams, InstanceRef, ListRequest, Params, ParseRequest,
    StatusRequest, UpdateRequest,
};
use shared_types::Outcome;
use vc_02_registry::domain::parse_config;
use vc_02_registry::{ControlPlane, InstanceStatus, Transition};

pub(crate) fn add(state: &mut ControlPlane, env: &HandlerEnv<'_>, params: &Params) -> HandlerResult {
    let AddRequest(request) = AddRequest::from_params(params)?;
    let record = state.add_instance(request, env.driver)?;
    let message = if record.is_running {
        "VPN instance added and started successfully"
    } else {
        "VPN instance added successfully"
    };
    let status = record.status(0, env.now);
    Ok(Outcome::message(message).with("instance", status))
}

pub(crate) fn delete(state: &mut ControlPlane, env: &HandlerEnv<'_>, params: &Params) -> HandlerResult {
    let InstanceRef { name } = InstanceRef::from_params(params)?;
    let report = state.delete_instance(&name, env.driver)?;
    Ok(Outcome::message("VPN instance deleted successfully")
        .with("instance_name", name)
        .with("was_running", report.was_running)
        .with("routes_removed", report.routes_removed))
}

pub(crate) fn update(state: &mut ControlPlane, env: &HandlerEnv<'_>, params: &Params) -> HandlerResult {
    let request = UpdateRequest::from_params(params)?;
    let restarted = state.update_instance(
        &request.name,
        request.config_content,
        request.vpn_type,
        env.driver,
    )?;
    let message = if restarted {
        "VPN instance updated and restarted successfully"
    } else {
        "VPN instance updated successfully"
    };
    let status = state.instance_status(&request.name, env.now)?;
    Ok(Outcome::message(message)
        .with("restarted", restarted)
        .with("instance", status))
}

pub(crate) fn start(state: &mut ControlPlane, env: &HandlerEnv<'_>, params: &Params) -> HandlerResult {
    let InstanceRef { name } = InstanceRef::from_params(params)?;
    let transition = state.start_instance(&name, env.driver)?;
    Ok(transition_outcome(transition, "Instance started", "Instance already running", name))
}

pub(crate) fn stop(state: &mut ControlPlane, env: &HandlerEnv<'_>, params: &Params) -> HandlerResult {
    let InstanceRef { name } = InstanceRef::from_params(params)?;
    let transition = state.stop_instance(&name, env.driver)?;
    Ok(transition_outcome(transition, "Instance stopped", "Instance already stopped", name))
}

pub(crate) fn restart(state: &mut ControlPlane, env: &HandlerEnv<'_>, params: &Params) -> HandlerResult {
    let InstanceRef { name } = InstanceRef::from_params(params)?;
    state.restart_instance(&name, env.driver)?;
    Ok(Outcome::message("Instance restarted").with("instance_name", name))
}

pub(crate) fn enable(state: &mut ControlPlane, env: &HandlerEnv<'_>, params: &Params) -> HandlerResult {
    let EnableRequest { name, config } = EnableRequest::from_params(params)?;
    let report = state.enable_instance(&name, config, env.driver)?;
    Ok(Outcome::message("Instance enabled and started")
        .with("instance_name", name)
        .with("created", report.created)
        .with("changed", report.created || report.started.changed()))
}

pub(crate) fn disable(state: &mut ControlPlane, env: &HandlerEnv<'_>, params: &Params) -> HandlerResult {
    let InstanceRef { name } = InstanceRef::from_params(params)?;
    let stopped = state.disable_instance(&name, env.driver)?;
    Ok(Outcome::message("Instance disabled and stopped")
        .with("instance_name", name)
        .with("was_running", stopped.changed()))
}

pub(crate) fn list(state: &ControlPlane, env: &HandlerEnv<'_>, params: &Params) -> HandlerResult {
    let request = ListRequest::from_params(params)?;
    let instances: Vec<InstanceStatus> = state
        .list_instances(request.vpn_type.as_deref())
        .into_iter()
        .map(|record| state.status_of(record, env.now))
        .collect();
    Ok(Outcome::success()
        .with("count", instances.len())
        .with("instances", instances))
}

pub(crate) fn status(state: &ControlPlane, env: &HandlerEnv<'_>, params: &Params) -> HandlerResult {
    match StatusRequest::from_params(params)?.name {
        Some(name) => {
            let record = state.instance(&name)?;
            Ok(Outcome::success()
                .with("status", state.status_of(record, env.now))
                .with("config_content", &record.config_content))
        }
        None => {
            let instances: Vec<InstanceStatus> = state
                .instances()
                .map(|record| state.status_of(record, env.now))
                .collect();
            Ok(Outcome::success()
                .with("count", instances.len())
                .with("instances", instances))
        }
    }
}

pub(crate) fn stats(state: &ControlPlane, _env: &HandlerEnv<'_>, _params: &Params) -> HandlerResult {
    Ok(Outcome::success().with("stats", state.stats()))
}

pub(crate) fn parse(_state: &ControlPlane, _env: &HandlerEnv<'_>, params: &Params) -> HandlerResult {
    let request = ParseRequest::from_params(params)?;
    let parsed = parse_config(&request.config_content, request.vpn_type)?;
    Ok(Outcome::success()
        .with("vpn_type", parsed.vpn_type)
        .with("display_name", parsed.vpn_type.display_name())
        .with("config_length", request.config_content.len())
        .with("profile", parsed.profile))
}

fn transition_outcome(
    transition: Transition,
    changed: &str,
    unchanged: &str,
    name: String,
) -> Outcome {
    let message = if transition.changed() { changed } else { unchanged };
    Outcome::message(message)
        .with("instance_name", name)
        .with("changed", transition.changed())
}
