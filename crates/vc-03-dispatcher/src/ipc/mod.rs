//! Broker-facing side of the dispatcher.

pub mod heartbeat;
pub mod service;
