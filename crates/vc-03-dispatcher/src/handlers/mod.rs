//! # Handler Table
//!
//! Every [`Method`] maps to exactly one handler. The match in
//! [`handler_for`] is exhaustive, so a method without a handler does not
//! compile.
//!
//! Handlers are plain functions. A [`Handler::Read`] gets a shared borrow
//! of the state and runs under the read lock; a [`Handler::Write`] gets an
//! exclusive borrow and runs under the write lock.

mod instances;
mod routes;
mod runtime;

use crate::dispatcher::DispatchStatsSnapshot;
use crate::domain::error::RpcError;
use crate::domain::params::Params;
use chrono::{DateTime, Utc};
use shared_types::{Method, Outcome};
use vc_02_registry::{ControlPlane, TunnelDriver};

pub type HandlerResult = Result<Outcome, RpcError>;

pub type ReadHandler = fn(&ControlPlane, &HandlerEnv<'_>, &Params) -> HandlerResult;
pub type WriteHandler = fn(&mut ControlPlane, &HandlerEnv<'_>, &Params) -> HandlerResult;

#[derive(Clone, Copy)]
pub enum Handler {
    Read(ReadHandler),
    Write(WriteHandler),
}

impl Handler {
    #[must_use]
    pub fn is_write(&self) -> bool {
        matches!(self, Self::Write(_))
    }
}

/// Service facts exposed by `runtime-info`.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeView<'a> {
    pub service_name: &'a str,
    pub version: &'static str,
    pub started_at: DateTime<Utc>,
    pub dispatch: DispatchStatsSnapshot,
}

/// What a handler can reach besides the state itself.
pub struct HandlerEnv<'a> {
    pub driver: &'a dyn TunnelDriver,
    pub runtime: RuntimeView<'a>,
    /// Clock reading for the whole request.
    pub now: DateTime<Utc>,
}

#[must_use]
pub fn handler_for(method: Method) -> Handler {
    use Handler::{Read, Write};

    match method {
        Method::Add => Write(instances::add),
        Method::Delete => Write(instances::delete),
        Method::Update => Write(instances::update),
        Method::Start => Write(instances::start),
        Method::Stop => Write(instances::stop),
        Method::Restart => Write(instances::restart),
        Method::Enable => Write(instances::enable),
        Method::Disable => Write(instances::disable),
        Method::List => Read(instances::list),
        Method::Status => Read(instances::status),
        Method::Stats => Read(instances::stats),
        Method::Parse => Read(instances::parse),

        Method::AddCustomRoute => Write(routes::add_custom_route),
        Method::DeleteCustomRoute => Write(routes::delete_custom_route),
        Method::UpdateCustomRoute => Write(routes::update_custom_route),
        Method::GetCustomRoute => Read(routes::get_custom_route),
        Method::ListCustomRoutes => Read(routes::list_custom_routes),
        Method::AddInstanceRoute => Write(routes::add_instance_route),
        Method::DeleteInstanceRoute => Write(routes::delete_instance_route),
        Method::GetInstanceRoutes => Read(routes::get_instance_routes),
        Method::ApplyInstanceRoutes => Write(routes::apply_instance_routes),
        Method::DetectInstanceRoutes => Read(routes::detect_instance_routes),

        Method::PurgeCleanup => Write(runtime::purge_cleanup),
        Method::ThreadStatus => Read(runtime::thread_status),
        Method::ThreadOperation => Write(runtime::thread_operation),
        Method::RuntimeInfo => Read(runtime::runtime_info),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_mode_matches_method_kind() {
        for method in Method::ALL {
            assert_eq!(
                handler_for(*method).is_write(),
                method.is_mutating(),
                "{method} runs under the wrong lock"
            );
        }
    }
}
