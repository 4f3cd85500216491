//! # Transport Port
//!
//! The interface the correlator and dispatcher use to reach the broker.

use crate::message::{Credentials, QoS};
use crate::reconnect::ReconnectPolicy;
use crate::{DEFAULT_MAX_PAYLOAD_BYTES, DEFAULT_QUEUE_CAPACITY};
use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;

/// Errors from transport operations.
///
/// None of these are retried by the transport itself.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// No live broker session.
    #[error("Not connected to broker")]
    NotConnected,

    /// The broker could not be reached.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The broker refused the presented credentials.
    #[error("Broker rejected credentials for user '{username}'")]
    AuthenticationFailed { username: String },

    /// A QoS 1/2 subscriber queue had no room.
    #[error("Subscriber queue full on topic {topic}")]
    QueueFull { topic: String },

    #[error("Payload of {size} bytes exceeds limit of {limit}")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("Invalid topic '{topic}': {reason}")]
    InvalidTopic { topic: String, reason: String },

    /// Error reported by an external broker client.
    #[error("Broker error: {0}")]
    Broker(String),
}

/// Observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Lost after being established; `attempt` counts from 1.
    Reconnecting { attempt: u32 },
    /// Reconnect attempts exhausted.
    Failed,
}

/// Options shared by every transport implementation.
#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub client_id: String,
    pub credentials: Option<Credentials>,
    pub reconnect: ReconnectPolicy,
    pub max_payload_bytes: usize,
    /// Capacity of the inbound channel handed to the owner.
    pub inbound_capacity: usize,
}

impl TransportOptions {
    pub fn with_client_id(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            ..Self::default()
        }
    }
}

impl Default for TransportOptions {
    fn default() -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self {
            client_id: format!("vpn-control-{}", &suffix[..8]),
            credentials: None,
            reconnect: ReconnectPolicy::default(),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            inbound_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// A pub/sub connection.
///
/// Inbound messages are delivered on the channel returned by the
/// implementation's constructor, never through this trait.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a session and replay every recorded subscription.
    async fn connect(&self) -> Result<(), TransportError>;

    /// Publish a payload. Fails immediately when not connected.
    async fn publish(&self, topic: &str, payload: Bytes, qos: QoS) -> Result<(), TransportError>;

    /// Record a subscription and, when connected, activate it now.
    ///
    /// A recorded subscription survives reconnects.
    async fn subscribe(&self, filter: &str, qos: QoS) -> Result<(), TransportError>;

    /// Close the session and stop reconnecting.
    async fn disconnect(&self) -> Result<(), TransportError>;

    /// Current connection state.
    fn state(&self) -> ConnectionState;

    /// Watch connection state transitions.
    fn watch_state(&self) -> watch::Receiver<ConnectionState>;

    fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }
}
