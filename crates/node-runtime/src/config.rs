//! # Node Configuration
//!
//! Loaded from an optional TOML file, then overridden from `VC_*`
//! environment variables, then validated. Every field has a default, so an
//! empty file (or no file) yields a working development node on the
//! in-process broker.
//!
//! ```toml
//! log_level = "info"
//!
//! [service]
//! name = "ur-vpn-manager"
//! heartbeat_interval_secs = 10
//!
//! [broker]
//! transport = "mqtt"
//! uri = "tcp://localhost:1883"
//!
//! [storage]
//! state_file = "/var/lib/vc-node/registry.json"
//! ```

use serde::Deserialize;
use shared_bus::{Credentials, ReconnectPolicy, TransportOptions};
use shared_types::DEFAULT_SERVICE_NAME;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use vc_03_dispatcher::DispatcherConfig;

/// Environment variables read by [`NodeConfig::apply_env`].
pub const ENV_SERVICE_NAME: &str = "VC_SERVICE_NAME";
pub const ENV_BROKER_URI: &str = "VC_BROKER_URI";
pub const ENV_BROKER_USERNAME: &str = "VC_BROKER_USERNAME";
pub const ENV_BROKER_PASSWORD: &str = "VC_BROKER_PASSWORD";
pub const ENV_STATE_FILE: &str = "VC_STATE_FILE";
pub const ENV_LOG_LEVEL: &str = "VC_LOG_LEVEL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Complete node configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeConfig {
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
    pub service: ServiceConfig,
    pub broker: BrokerConfig,
    pub storage: StorageConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            service: ServiceConfig::default(),
            broker: BrokerConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Name segment of the request, response and heartbeat topics.
    pub name: String,
    /// Zero disables the heartbeat.
    pub heartbeat_interval_secs: u64,
    pub max_concurrent_requests: usize,
    /// Zero disables duplicate suppression.
    pub dedup_window_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let dispatcher = DispatcherConfig::default();
        Self {
            name: DEFAULT_SERVICE_NAME.to_string(),
            heartbeat_interval_secs: dispatcher.heartbeat_interval.as_secs(),
            max_concurrent_requests: dispatcher.max_concurrent_requests,
            dedup_window_ms: u64::try_from(dispatcher.dedup_window.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// In-process broker. Nothing outside the process can reach it.
    Memory,
    /// External MQTT broker; requires the `mqtt` feature.
    Mqtt,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrokerConfig {
    pub transport: TransportKind,
    pub uri: String,
    /// Generated when unset.
    pub client_id: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive_secs: u64,
    pub max_payload_bytes: usize,
    pub reconnect_initial_ms: u64,
    pub reconnect_max_ms: u64,
    pub reconnect_multiplier: f64,
    pub reconnect_max_attempts: u32,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        let reconnect = ReconnectPolicy::default();
        Self {
            transport: TransportKind::Memory,
            uri: "tcp://localhost:1883".to_string(),
            client_id: None,
            username: None,
            password: None,
            keep_alive_secs: 60,
            max_payload_bytes: shared_bus::DEFAULT_MAX_PAYLOAD_BYTES,
            reconnect_initial_ms: u64::try_from(reconnect.initial_backoff.as_millis()).unwrap_or(500),
            reconnect_max_ms: u64::try_from(reconnect.max_backoff.as_millis()).unwrap_or(30_000),
            reconnect_multiplier: reconnect.multiplier,
            reconnect_max_attempts: reconnect.max_attempts,
        }
    }
}

impl BrokerConfig {
    #[must_use]
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    #[must_use]
    pub fn transport_options(&self) -> TransportOptions {
        let mut options = match &self.client_id {
            Some(id) => TransportOptions::with_client_id(id.clone()),
            None => TransportOptions::default(),
        };
        options.credentials = self
            .username
            .as_ref()
            .map(|user| Credentials::new(user.clone(), self.password.clone().unwrap_or_default()));
        options.reconnect = ReconnectPolicy {
            initial_backoff: Duration::from_millis(self.reconnect_initial_ms),
            max_backoff: Duration::from_millis(self.reconnect_max_ms),
            multiplier: self.reconnect_multiplier,
            max_attempts: self.reconnect_max_attempts,
        };
        options.max_payload_bytes = self.max_payload_bytes;
        options
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Registry snapshot. Without one the registry lives in memory only.
    pub state_file: Option<PathBuf>,
}

impl NodeConfig {
    /// Read `path` if given, apply the process environment, validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Override fields from `VC_*` variables. Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(name) = get(ENV_SERVICE_NAME) {
            self.service.name = name;
        }
        if let Some(uri) = get(ENV_BROKER_URI) {
            self.broker.uri = uri;
            self.broker.transport = TransportKind::Mqtt;
        }
        if let Some(username) = get(ENV_BROKER_USERNAME) {
            self.broker.username = Some(username);
        }
        if let Some(password) = get(ENV_BROKER_PASSWORD) {
            self.broker.password = Some(password);
        }
        if let Some(path) = get(ENV_STATE_FILE) {
            self.storage.state_file = Some(PathBuf::from(path));
        }
        if let Some(level) = get(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let name = &self.service.name;
        if name.is_empty() || name.contains(['/', '+', '#']) {
            return Err(ConfigError::invalid(
                "service.name",
                format!("'{name}' cannot be used as a topic segment"),
            ));
        }
        if self.service.max_concurrent_requests == 0 {
            return Err(ConfigError::invalid("service.max_concurrent_requests", "must be at least 1"));
        }
        if self.broker.transport == TransportKind::Mqtt && self.broker.uri.is_empty() {
            return Err(ConfigError::invalid("broker.uri", "required for the mqtt transport"));
        }
        if self.broker.password.is_some() && self.broker.username.is_none() {
            return Err(ConfigError::invalid("broker.password", "set without a username"));
        }
        if self.broker.max_payload_bytes == 0 {
            return Err(ConfigError::invalid("broker.max_payload_bytes", "must be positive"));
        }
        if self.broker.reconnect_max_ms < self.broker.reconnect_initial_ms {
            return Err(ConfigError::invalid(
                "broker.reconnect_max_ms",
                "must not be below reconnect_initial_ms",
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            service_name: self.service.name.clone(),
            max_concurrent_requests: self.service.max_concurrent_requests,
            dedup_window: Duration::from_millis(self.service.dedup_window_ms),
            heartbeat_interval: Duration::from_secs(self.service.heartbeat_interval_secs),
            ..DispatcherConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = NodeConfig::default();
        config.validate().unwrap();
        assert_eq!(config.service.name, DEFAULT_SERVICE_NAME);
        assert_eq!(config.broker.transport, TransportKind::Memory);
        assert!(config.storage.state_file.is_none());
    }

    #[test]
    fn test_partial_file() {
        let config: NodeConfig = toml::from_str(
            r#"
            [service]
            name = "edge-vpn"
            dedup_window_ms = 0

            [broker]
            transport = "mqtt"
            uri = "tcp://broker:1883"
            "#,
        )
        .unwrap();

        assert_eq!(config.service.name, "edge-vpn");
        assert_eq!(config.broker.transport, TransportKind::Mqtt);
        assert_eq!(config.broker.keep_alive(), Duration::from_secs(60));

        let dispatcher = config.dispatcher_config();
        assert!(dispatcher.dedup_window.is_zero());
        assert_eq!(dispatcher.topics().requests, "direct_messaging/edge-vpn/requests");
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(toml::from_str::<NodeConfig>("[service]\nnmae = \"typo\"\n").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = NodeConfig::default();
        config.apply_env(env(&[
            (ENV_SERVICE_NAME, "from-env"),
            (ENV_BROKER_URI, "tcp://10.0.0.5:1883"),
            (ENV_BROKER_USERNAME, "svc"),
            (ENV_BROKER_PASSWORD, "secret"),
            (ENV_STATE_FILE, "/tmp/registry.json"),
            (ENV_LOG_LEVEL, ""),
        ]));

        assert_eq!(config.service.name, "from-env");
        assert_eq!(config.broker.transport, TransportKind::Mqtt);
        assert_eq!(config.storage.state_file, Some(PathBuf::from("/tmp/registry.json")));
        assert_eq!(config.log_level, "info");

        let options = config.broker.transport_options();
        assert_eq!(options.credentials, Some(Credentials::new("svc", "secret")));
    }

    #[test]
    fn test_validation() {
        let mut config = NodeConfig::default();
        config.service.name = "a/b".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "service.name", .. })
        ));

        let mut config = NodeConfig::default();
        config.broker.password = Some("orphan".into());
        assert!(config.validate().is_err());

        let mut config = NodeConfig::default();
        config.service.max_concurrent_requests = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = NodeConfig::from_file(Path::new("/nonexistent/vc-node.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
