//! # Request Parameters
//!
//! Every handler starts by turning the free-form `params` object into one
//! of the typed requests below. Extraction fails before any state is
//! touched, and its errors always name the offending field.
//!
//! Wire names: `instance_name` (alias `name`), `config_content` (alias
//! `config`), `vpn_type` (alias `type` for `list`), route `id` (alias
//! `rule_id`), `route_rule` (an object carrying the route fields),
//! `confirm`, `thread_name`, `operation`.

use super::error::RpcError;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use shared_types::FailureKind;
use std::borrow::Cow;
use std::str::FromStr;
use vc_02_registry::{NewInstance, RouteDraft, RoutePatch, VpnType};

pub type Params = Map<String, Value>;

/// Built from a request's `params`.
pub trait FromParams: Sized {
    fn from_params(params: &Params) -> Result<Self, RpcError>;
}

/// Deserialize `params` into a raw shape whose fields are all optional.
///
/// On a type error, each key is tried on its own to find which one is bad.
fn extract<T: DeserializeOwned>(params: &Params) -> Result<T, RpcError> {
    serde_json::from_value(Value::Object(params.clone())).map_err(|err| {
        params
            .iter()
            .find_map(|(key, value)| {
                let single = Map::from_iter([(key.clone(), value.clone())]);
                serde_json::from_value::<T>(Value::Object(single))
                    .err()
                    .map(|e| RpcError::invalid(key, e))
            })
            .unwrap_or_else(|| {
                RpcError::new(FailureKind::Validation, format!("Invalid parameters: {err}"))
            })
    })
}

fn required(field: &'static str, value: Option<String>) -> Result<String, RpcError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| RpcError::missing(field))
}

fn vpn_type(raw: Option<String>) -> Result<Option<VpnType>, RpcError> {
    raw.filter(|v| !v.is_empty())
        .map(|v| v.parse::<VpnType>())
        .transpose()
        .map_err(RpcError::from)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawInstance {
    #[serde(alias = "name")]
    instance_name: Option<String>,
    #[serde(alias = "config")]
    config_content: Option<String>,
    vpn_type: Option<String>,
    auto_start: Option<bool>,
}

/// Target of `start`, `stop`, `restart`, `delete`, `disable`, and of the
/// read-only per-instance route methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceRef {
    pub name: String,
}

impl FromParams for InstanceRef {
    fn from_params(params: &Params) -> Result<Self, RpcError> {
        let raw: RawInstance = extract(params)?;
        Ok(Self {
            name: required("instance_name", raw.instance_name)?,
        })
    }
}

/// `add`. `auto_start` defaults to true.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddRequest(pub NewInstance);

impl FromParams for AddRequest {
    fn from_params(params: &Params) -> Result<Self, RpcError> {
        let raw: RawInstance = extract(params)?;
        Ok(Self(NewInstance {
            name: required("instance_name", raw.instance_name)?,
            config_content: required("config_content", raw.config_content)?,
            vpn_type: vpn_type(raw.vpn_type)?,
            auto_start: raw.auto_start.unwrap_or(true),
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    pub name: String,
    pub config_content: String,
    pub vpn_type: Option<VpnType>,
}

impl FromParams for UpdateRequest {
    fn from_params(params: &Params) -> Result<Self, RpcError> {
        let raw: RawInstance = extract(params)?;
        Ok(Self {
            name: required("instance_name", raw.instance_name)?,
            config_content: required("config_content", raw.config_content)?,
            vpn_type: vpn_type(raw.vpn_type)?,
        })
    }
}

/// `enable`. The config is only used when the instance does not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnableRequest {
    pub name: String,
    pub config: Option<(String, Option<VpnType>)>,
}

impl FromParams for EnableRequest {
    fn from_params(params: &Params) -> Result<Self, RpcError> {
        let raw: RawInstance = extract(params)?;
        let name = required("instance_name", raw.instance_name)?;
        let vpn_type = vpn_type(raw.vpn_type)?;
        Ok(Self {
            name,
            config: raw
                .config_content
                .filter(|c| !c.trim().is_empty())
                .map(|c| (c, vpn_type)),
        })
    }
}

/// `status`: one instance, or all when no name is given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRequest {
    pub name: Option<String>,
}

impl FromParams for StatusRequest {
    fn from_params(params: &Params) -> Result<Self, RpcError> {
        let raw: RawInstance = extract(params)?;
        Ok(Self {
            name: raw.instance_name.filter(|n| !n.is_empty()),
        })
    }
}

/// `parse`: inspect a config without registering it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRequest {
    pub config_content: String,
    pub vpn_type: Option<VpnType>,
}

impl FromParams for ParseRequest {
    fn from_params(params: &Params) -> Result<Self, RpcError> {
        let raw: RawInstance = extract(params)?;
        Ok(Self {
            config_content: required("config_content", raw.config_content)?,
            vpn_type: vpn_type(raw.vpn_type)?,
        })
    }
}

/// `list`. The filter is kept as text: an unknown type lists nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ListRequest {
    #[serde(alias = "type")]
    pub vpn_type: Option<String>,
}

impl FromParams for ListRequest {
    fn from_params(params: &Params) -> Result<Self, RpcError> {
        let mut request: Self = extract(params)?;
        request.vpn_type = request.vpn_type.filter(|t| !t.is_empty());
        Ok(request)
    }
}

// =============================================================================
// Routes
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRouteKey {
    #[serde(alias = "rule_id")]
    id: Option<String>,
    instance_name: Option<String>,
}

/// Route fields come from a `route_rule` object when one is given, else
/// from the top level. A top-level id fills in one the object lacks.
fn route_fields(params: &Params) -> Result<Cow<'_, Params>, RpcError> {
    match params.get("route_rule") {
        None | Some(Value::Null) => Ok(Cow::Borrowed(params)),
        Some(Value::Object(rule)) => {
            let mut fields = rule.clone();
            if !fields.contains_key("id") {
                if let Some(id) = params.get("id").or_else(|| params.get("rule_id")) {
                    fields.insert("id".into(), id.clone());
                }
            }
            Ok(Cow::Owned(fields))
        }
        Some(_) => Err(RpcError::invalid("route_rule", "must be an object")),
    }
}

/// `get-custom-route`, `delete-custom-route`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRef {
    pub id: String,
}

impl FromParams for RouteRef {
    fn from_params(params: &Params) -> Result<Self, RpcError> {
        let key: RawRouteKey = extract(params)?;
        Ok(Self {
            id: required("id", key.id)?,
        })
    }
}

/// `add-custom-route`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRouteRequest {
    pub draft: RouteDraft,
}

impl FromParams for NewRouteRequest {
    fn from_params(params: &Params) -> Result<Self, RpcError> {
        let fields = route_fields(params)?;
        let mut draft: RouteDraft = extract(&fields)?;
        if draft.id.is_empty() {
            let key: RawRouteKey = extract(params)?;
            draft.id = required("id", key.id)?;
        }
        Ok(Self { draft })
    }
}

/// `update-custom-route`: only the fields present are changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRouteRequest {
    pub id: String,
    pub patch: RoutePatch,
}

impl FromParams for UpdateRouteRequest {
    fn from_params(params: &Params) -> Result<Self, RpcError> {
        let fields = route_fields(params)?;
        let key: RawRouteKey = extract(&fields)?;
        Ok(Self {
            id: required("id", key.id)?,
            patch: extract(&fields)?,
        })
    }
}

/// `add-instance-route`. The instance is named by `instance_name` only,
/// since a top-level `name` is the route's own name here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInstanceRouteRequest {
    pub instance: String,
    pub draft: RouteDraft,
}

impl FromParams for NewInstanceRouteRequest {
    fn from_params(params: &Params) -> Result<Self, RpcError> {
        let key: RawRouteKey = extract(params)?;
        let instance = required("instance_name", key.instance_name)?;
        let has_rule = matches!(params.get("route_rule"), Some(v) if !v.is_null());
        let has_fields = ["id", "rule_id", "destination"]
            .iter()
            .any(|field| params.contains_key(*field));
        if !has_rule && !has_fields {
            return Err(RpcError::missing("route_rule"));
        }
        let NewRouteRequest { draft } = NewRouteRequest::from_params(params)?;
        Ok(Self { instance, draft })
    }
}

/// `delete-instance-route`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceRouteRef {
    pub instance: String,
    pub id: String,
}

impl FromParams for InstanceRouteRef {
    fn from_params(params: &Params) -> Result<Self, RpcError> {
        let InstanceRef { name } = InstanceRef::from_params(params)?;
        let key: RawRouteKey = extract(params)?;
        Ok(Self {
            instance: name,
            id: required("rule_id", key.id)?,
        })
    }
}

// =============================================================================
// Maintenance and workers
// =============================================================================

/// `purge-cleanup` runs only with `confirm: true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurgeRequest;

impl FromParams for PurgeRequest {
    fn from_params(params: &Params) -> Result<Self, RpcError> {
        #[derive(Default, Deserialize)]
        #[serde(default)]
        struct Raw {
            confirm: Option<bool>,
        }

        let raw: Raw = extract(params)?;
        match raw.confirm {
            Some(true) => Ok(Self),
            Some(false) => Err(RpcError::invalid(
                "confirm",
                "must be true to remove every instance and route",
            )),
            None => Err(RpcError::missing("confirm")),
        }
    }
}

/// Name used by `thread_status` to mean every worker.
pub const ALL_THREADS: &str = "all";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawThread {
    thread_name: Option<String>,
    operation: Option<String>,
}

/// `thread_status`: `None` selects every worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadStatusRequest {
    pub thread: Option<String>,
}

impl FromParams for ThreadStatusRequest {
    fn from_params(params: &Params) -> Result<Self, RpcError> {
        let raw: RawThread = extract(params)?;
        Ok(Self {
            thread: raw
                .thread_name
                .filter(|n| !n.is_empty() && n != ALL_THREADS),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadOp {
    Start,
    Stop,
    Restart,
    Status,
}

impl FromStr for ThreadOp {
    type Err = RpcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "restart" => Ok(Self::Restart),
            "status" => Ok(Self::Status),
            other => Err(RpcError::invalid(
                "operation",
                format!("'{other}' is not one of start, stop, restart, status"),
            )),
        }
    }
}

/// `thread_operation` on one named worker. `operation` defaults to
/// `status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadOperationRequest {
    pub thread: String,
    pub operation: ThreadOp,
}

impl FromParams for ThreadOperationRequest {
    fn from_params(params: &Params) -> Result<Self, RpcError> {
        let raw: RawThread = extract(params)?;
        let thread = required("thread_name", raw.thread_name)?;
        if thread == ALL_THREADS {
            return Err(RpcError::invalid(
                "thread_name",
                "operations apply to one named worker",
            ));
        }
        let operation = raw
            .operation
            .filter(|o| !o.is_empty())
            .map_or(Ok(ThreadOp::Status), |o| o.parse())?;
        Ok(Self { thread, operation })
    }
}
