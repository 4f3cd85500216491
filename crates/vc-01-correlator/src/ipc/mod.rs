//! Broker-facing side of the correlator.

pub mod client;
pub mod listener;
