//! Correlation domain: ids, the pending-call table and call errors.

pub mod config;
pub mod error;
pub mod pending;
pub mod request_id;
