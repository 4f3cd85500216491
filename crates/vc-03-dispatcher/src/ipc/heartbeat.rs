//! Liveness beacon on the service's heartbeat topic.

use crate::dispatcher::Dispatcher;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use shared_bus::{QoS, Transport};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

#[must_use]
pub fn heartbeat_payload(dispatcher: &Dispatcher, now: DateTime<Utc>) -> Value {
    let (instances, running) = dispatcher.instance_counts();
    let uptime = u64::try_from((now - dispatcher.started_at()).num_seconds()).unwrap_or(0);
    json!({
        "service": dispatcher.service_name(),
        "status": "alive",
        "timestamp": now,
        "uptime_secs": uptime,
        "instances": instances,
        "running": running,
    })
}

/// Publish a heartbeat every `interval` until the task is aborted.
///
/// Heartbeats are fire-and-forget: ticks while disconnected are skipped.
pub async fn heartbeat_task(
    dispatcher: Arc<Dispatcher>,
    transport: Arc<dyn Transport>,
    topic: String,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        if !transport.is_connected() {
            trace!("Skipping heartbeat while disconnected");
            continue;
        }

        let payload = heartbeat_payload(&dispatcher, Utc::now());
        let Ok(bytes) = serde_json::to_vec(&payload) else {
            continue;
        };
        if let Err(e) = transport.publish(&topic, Bytes::from(bytes), QoS::AtMostOnce).await {
            debug!(error = %e, "Heartbeat not sent");
        }
    }
}
