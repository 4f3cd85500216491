//! # Adapters Layer
//!
//! Implementations of the registry's outbound ports.

mod json_store;
mod memory_driver;

pub use json_store::JsonFileStore;
pub use memory_driver::InMemoryTunnelDriver;
