//! End-to-end flows over the in-process broker.

pub mod persistence;
pub mod resilience;
pub mod rpc_flows;
