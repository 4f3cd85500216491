//! Dispatcher domain: configuration, request parameters, handler errors.

pub mod config;
pub mod error;
pub mod params;
