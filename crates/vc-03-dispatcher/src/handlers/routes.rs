//! Global custom-route and per-instance route handlers.

use super::{HandlerEnv, HandlerResult};
use crate::domain::params::{
    FromParams, InstanceRef, InstanceRouteRef, NewInstanceRouteRequest, NewRouteRequest, Params,
    RouteRef, UpdateRouteRequest,
};
use shared_types::Outcome;
use vc_02_registry::ControlPlane;

pub(crate) fn add_custom_route(
    state: &mut ControlPlane,
    _env: &HandlerEnv<'_>,
    params: &Params,
) -> HandlerResult {
    let NewRouteRequest { draft } = NewRouteRequest::from_params(params)?;
    let rule = state.add_custom_route(draft)?;
    Ok(Outcome::message("Routing rule added successfully").with("routing_rule", rule))
}

pub(crate) fn update_custom_route(
    state: &mut ControlPlane,
    _env: &HandlerEnv<'_>,
    params: &Params,
) -> HandlerResult {
    let UpdateRouteRequest { id, patch } = UpdateRouteRequest::from_params(params)?;
    let rule = state.update_custom_route(&id, patch)?;
    Ok(Outcome::message("Routing rule updated successfully").with("routing_rule", rule))
}

pub(crate) fn delete_custom_route(
    state: &mut ControlPlane,
    _env: &HandlerEnv<'_>,
    params: &Params,
) -> HandlerResult {
    let RouteRef { id } = RouteRef::from_params(params)?;
    state.delete_custom_route(&id)?;
    Ok(Outcome::message("Routing rule deleted successfully").with("id", id))
}

pub(crate) fn get_custom_route(
    state: &ControlPlane,
    _env: &HandlerEnv<'_>,
    params: &Params,
) -> HandlerResult {
    let RouteRef { id } = RouteRef::from_params(params)?;
    Ok(Outcome::success().with("routing_rule", state.custom_route(&id)?))
}

pub(crate) fn list_custom_routes(
    state: &ControlPlane,
    _env: &HandlerEnv<'_>,
    _params: &Params,
) -> HandlerResult {
    let rules = state.custom_routes();
    Ok(Outcome::success()
        .with("count", rules.len())
        .with("routing_rules", rules))
}

pub(crate) fn add_instance_route(
    state: &mut ControlPlane,
    _env: &HandlerEnv<'_>,
    params: &Params,
) -> HandlerResult {
    let NewInstanceRouteRequest { instance, draft } = NewInstanceRouteRequest::from_params(params)?;
    let rule = state.add_instance_route(&instance, draft)?;
    Ok(Outcome::message("Routing rule added successfully")
        .with("instance_name", &instance)
        .with("routing_rule", rule))
}

pub(crate) fn delete_instance_route(
    state: &mut ControlPlane,
    _env: &HandlerEnv<'_>,
    params: &Params,
) -> HandlerResult {
    let InstanceRouteRef { instance, id } = InstanceRouteRef::from_params(params)?;
    state.delete_instance_route(&instance, &id)?;
    Ok(Outcome::message("Routing rule deleted successfully")
        .with("instance_name", instance)
        .with("rule_id", id))
}

pub(crate) fn get_instance_routes(
    state: &ControlPlane,
    _env: &HandlerEnv<'_>,
    params: &Params,
) -> HandlerResult {
    let InstanceRef { name } = InstanceRef::from_params(params)?;
    let rules = state.instance_routes(&name)?;
    Ok(Outcome::success()
        .with("instance_name", &name)
        .with("count", rules.len())
        .with("routing_rules", rules))
}

pub(crate) fn apply_instance_routes(
    state: &mut ControlPlane,
    env: &HandlerEnv<'_>,
    params: &Params,
) -> HandlerResult {
    let InstanceRef { name } = InstanceRef::from_params(params)?;
    let report = state.apply_instance_routes(&name, env.driver)?;
    Ok(Outcome::message(format!("Applied {} routing rules", report.applied))
        .with("instance_name", name)
        .with("applied", report.applied)
        .with("skipped", report.skipped))
}

pub(crate) fn detect_instance_routes(
    state: &ControlPlane,
    env: &HandlerEnv<'_>,
    params: &Params,
) -> HandlerResult {
    let InstanceRef { name } = InstanceRef::from_params(params)?;
    let detected = state.detect_instance_routes(&name, env.driver)?;
    let new_routes = detected.iter().filter(|r| !r.already_present).count();
    Ok(Outcome::success()
        .with("instance_name", &name)
        .with("count", detected.len())
        .with("new_routes", new_routes)
        .with("detected_routes", detected))
}
