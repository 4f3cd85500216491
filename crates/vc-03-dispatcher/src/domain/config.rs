//! Dispatcher service configuration.

use shared_bus::QoS;
use shared_types::{ServiceTopics, DEFAULT_SERVICE_NAME};
use std::time::Duration;

/// Settings for the request service and heartbeat.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Name segment of the service's topics.
    pub service_name: String,
    /// Requests handled at once; further requests wait for a slot.
    pub max_concurrent_requests: usize,
    /// How long a delivered request is remembered for duplicate
    /// suppression. Zero disables suppression.
    pub dedup_window: Duration,
    /// Zero disables the heartbeat.
    pub heartbeat_interval: Duration,
    /// QoS for the request subscription and response publishes.
    pub qos: QoS,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            max_concurrent_requests: 64,
            dedup_window: Duration::from_secs(2),
            heartbeat_interval: Duration::from_secs(10),
            qos: QoS::AtLeastOnce,
        }
    }
}

impl DispatcherConfig {
    pub fn for_service(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn topics(&self) -> ServiceTopics {
        ServiceTopics::for_service(&self.service_name)
    }
}
