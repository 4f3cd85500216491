//! Client configuration.

use shared_bus::QoS;
use std::time::Duration;

/// Correlator settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Timeout applied when a call does not specify one.
    pub default_timeout: Duration,
    /// How often the sweep removes pending calls whose deadline passed.
    pub cleanup_interval: Duration,
    /// QoS used for request publishes and the response subscription.
    pub qos: QoS,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(10),
            cleanup_interval: Duration::from_secs(30),
            qos: QoS::AtLeastOnce,
        }
    }
}

impl ClientConfig {
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }
}
