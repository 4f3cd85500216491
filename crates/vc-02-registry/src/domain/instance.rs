//! # Instance Records

use super::profile::ConfigProfile;
use super::value_objects::VpnType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A managed tunnel.
///
/// `is_running` holds exactly when `worker_id` names a worker the tunnel
/// driver started and nobody has stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub name: String,
    pub vpn_type: VpnType,
    pub config_content: String,
    pub is_running: bool,
    pub is_enabled: bool,
    pub auto_start: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub worker_id: Option<u64>,
    pub profile: ConfigProfile,
}

/// What `status` and `list` report for an instance.
///
/// Leaves out the raw config, which may carry key material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceStatus {
    pub name: String,
    #[serde(rename = "type")]
    pub vpn_type: VpnType,
    pub status: &'static str,
    pub is_running: bool,
    pub enabled: bool,
    pub auto_start: bool,
    pub server: Option<String>,
    pub port: Option<u16>,
    pub protocol: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub uptime_secs: u64,
    pub worker_id: Option<u64>,
    pub route_count: usize,
    pub config_length: usize,
}

impl InstanceRecord {
    #[must_use]
    pub fn status_label(&self) -> &'static str {
        if self.is_running {
            "running"
        } else {
            "stopped"
        }
    }

    /// Seconds since the current worker started, zero when stopped.
    #[must_use]
    pub fn uptime_secs(&self, now: DateTime<Utc>) -> u64 {
        match (self.is_running, self.started_at) {
            (true, Some(started)) => u64::try_from((now - started).num_seconds()).unwrap_or(0),
            _ => 0,
        }
    }

    #[must_use]
    pub fn status(&self, route_count: usize, now: DateTime<Utc>) -> InstanceStatus {
        InstanceStatus {
            name: self.name.clone(),
            vpn_type: self.vpn_type,
            status: self.status_label(),
            is_running: self.is_running,
            enabled: self.is_enabled,
            auto_start: self.auto_start,
            server: self.profile.server.clone(),
            port: self.profile.port,
            protocol: self.profile.protocol.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            started_at: self.started_at,
            uptime_secs: self.uptime_secs(now),
            worker_id: self.worker_id,
            route_count,
            config_length: self.config_content.len(),
        }
    }

    pub(crate) fn mark_started(&mut self, worker_id: u64, now: DateTime<Utc>) {
        self.is_running = true;
        self.worker_id = Some(worker_id);
        self.started_at = Some(now);
    }

    pub(crate) fn mark_stopped(&mut self) {
        self.is_running = false;
        self.worker_id = None;
        self.started_at = None;
    }
}
