//! # Shared Bus - Pub/Sub Transport for the Control Plane
//!
//! Everything that touches the broker lives here: the [`Transport`] port the
//! correlator and dispatcher publish through, an in-memory MQTT-style
//! [`Broker`] used by tests and embedded deployments, and (behind the `mqtt`
//! feature) an adapter over a real MQTT client.
//!
//! ## Delivery Model
//!
//! Inbound messages are not pushed through callbacks. A transport is built
//! together with an `mpsc::Receiver<BusMessage>`; its forwarder tasks feed
//! that channel and the owner drains it on its own task.
//!
//! ```text
//! ┌──────────────┐  publish()   ┌──────────────┐  per-subscription   ┌──────────────┐
//! │  Correlator  │ ───────────→ │    Broker    │ ──────queue───────→ │  Forwarder   │
//! │  Dispatcher  │              │ (topic match)│                     │    task      │
//! └──────────────┘              └──────────────┘                     └──────┬───────┘
//!        ↑                                                                  │
//!        └──────────────────── inbound mpsc channel ───────────────────────┘
//! ```
//!
//! ## Connection Lifecycle
//!
//! - `connect()` reports failure to the caller; it never retries.
//! - A connection that drops after being established is re-established by a
//!   supervisor task with exponential backoff and a capped attempt count
//!   ([`ReconnectPolicy`]). Every recorded subscription is replayed on
//!   reconnect.
//! - `publish()` never retries: not connected, queue full and oversized
//!   payloads come back as typed [`TransportError`]s.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod broker;
pub mod dedup;
pub mod memory;
pub mod message;
#[cfg(feature = "mqtt")]
pub mod mqtt;
pub mod reconnect;
pub mod topic;
pub mod transport;

// Re-export main types
pub use broker::{Broker, BrokerStats, Session};
pub use dedup::{DedupError, DeliveryDedup};
pub use memory::MemoryTransport;
pub use message::{BusMessage, Credentials, QoS};
#[cfg(feature = "mqtt")]
pub use mqtt::MqttTransport;
pub use reconnect::ReconnectPolicy;
pub use topic::TopicFilter;
pub use transport::{ConnectionState, Transport, TransportError, TransportOptions};

/// Messages buffered per subscription before QoS 0 drops / QoS 1 rejects.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Largest payload accepted by `publish()`.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 256 * 1024;
