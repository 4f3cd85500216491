//! # MQTT Transport
//!
//! [`Transport`] over an external MQTT broker using the Eclipse Paho async
//! client. Paho's own automatic reconnect is left off; the same
//! [`ReconnectPolicy`](crate::ReconnectPolicy) used by the memory transport
//! drives `reconnect()` here, followed by a replay of recorded subscriptions.

use crate::message::{BusMessage, QoS};
use crate::topic::TopicFilter;
use crate::transport::{ConnectionState, Transport, TransportError, TransportOptions};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::StreamExt;
use paho_mqtt as mqtt;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Transport over a Paho MQTT client.
pub struct MqttTransport {
    shared: Arc<Shared>,
}

struct Shared {
    client: mqtt::AsyncClient,
    options: TransportOptions,
    keep_alive: Duration,
    recorded: Mutex<Vec<(TopicFilter, QoS)>>,
    state: watch::Sender<ConnectionState>,
    closing: AtomicBool,
    pump: Mutex<Option<JoinHandle<()>>>,
    stream: Mutex<Option<mqtt::AsyncReceiver<Option<mqtt::Message>>>>,
    inbound: mpsc::Sender<BusMessage>,
}

fn broker_error(err: mqtt::Error) -> TransportError {
    TransportError::Broker(err.to_string())
}

impl MqttTransport {
    /// Create the client for `server_uri` (e.g. `tcp://localhost:1883`).
    pub fn new(
        server_uri: &str,
        keep_alive: Duration,
        options: TransportOptions,
    ) -> Result<(Self, mpsc::Receiver<BusMessage>), TransportError> {
        let buffered = i32::try_from(options.inbound_capacity).unwrap_or(i32::MAX);
        let mut client = mqtt::CreateOptionsBuilder::new()
            .server_uri(server_uri)
            .client_id(&options.client_id)
            .max_buffered_messages(buffered)
            .create_client()
            .map_err(broker_error)?;
        let stream = client.get_stream(options.inbound_capacity.max(1));

        let (inbound, rx) = mpsc::channel(options.inbound_capacity.max(1));
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let shared = Arc::new(Shared {
            client,
            options,
            keep_alive,
            recorded: Mutex::new(Vec::new()),
            state,
            closing: AtomicBool::new(false),
            pump: Mutex::new(None),
            stream: Mutex::new(Some(stream)),
            inbound,
        });
        Ok((Self { shared }, rx))
    }
}

impl Shared {
    fn connect_options(&self) -> mqtt::ConnectOptions {
        let mut builder = mqtt::ConnectOptionsBuilder::new();
        builder
            .keep_alive_interval(self.keep_alive)
            .clean_session(true);
        if let Some(credentials) = &self.options.credentials {
            builder
                .user_name(credentials.username.clone())
                .password(credentials.password.clone());
        }
        builder.finalize()
    }

    async fn resubscribe(&self) -> Result<usize, TransportError> {
        let recorded = self.recorded.lock().clone();
        for (filter, qos) in &recorded {
            self.client
                .subscribe(filter.as_str(), i32::from(qos.as_u8()))
                .await
                .map_err(broker_error)?;
        }
        Ok(recorded.len())
    }

    async fn pump(self: Arc<Self>, mut stream: mqtt::AsyncReceiver<Option<mqtt::Message>>) {
        while let Some(next) = stream.next().await {
            match next {
                Some(message) => {
                    let qos = u8::try_from(message.qos())
                        .ok()
                        .and_then(QoS::from_u8)
                        .unwrap_or_default();
                    let bus_message = BusMessage {
                        topic: message.topic().to_string(),
                        payload: Bytes::copy_from_slice(message.payload()),
                        qos,
                    };
                    if self.inbound.send(bus_message).await.is_err() {
                        debug!("Inbound channel closed, stopping MQTT pump");
                        return;
                    }
                }
                None => {
                    if self.closing.load(Ordering::Acquire) {
                        return;
                    }
                    warn!(client_id = %self.options.client_id, "MQTT connection lost");
                    if !self.reconnect().await {
                        return;
                    }
                }
            }
        }
    }

    async fn reconnect(&self) -> bool {
        let policy = &self.options.reconnect;
        for attempt in 1..=policy.max_attempts {
            self.state
                .send_replace(ConnectionState::Reconnecting { attempt });
            tokio::time::sleep(policy.delay_for(attempt)).await;
            if self.closing.load(Ordering::Acquire) {
                return false;
            }

            let restored = match self.client.reconnect().await {
                Ok(_) => self.resubscribe().await,
                Err(e) => Err(broker_error(e)),
            };
            match restored {
                Ok(subscriptions) => {
                    self.state.send_replace(ConnectionState::Connected);
                    info!(attempt, subscriptions, "Reconnected to MQTT broker");
                    return true;
                }
                Err(e) => warn!(attempt, error = %e, "MQTT reconnect attempt failed"),
            }
        }

        error!(attempts = policy.max_attempts, "Giving up on MQTT reconnect");
        self.state.send_replace(ConnectionState::Failed);
        false
    }
}

#[async_trait]
impl Transport for MqttTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        if self.shared.client.is_connected() {
            return Ok(());
        }
        self.shared.closing.store(false, Ordering::Release);
        self.shared.state.send_replace(ConnectionState::Connecting);

        if let Err(e) = self.shared.client.connect(self.shared.connect_options()).await {
            self.shared
                .state
                .send_replace(ConnectionState::Disconnected);
            return Err(TransportError::ConnectionFailed(e.to_string()));
        }

        let subscriptions = self.shared.resubscribe().await?;
        self.shared.state.send_replace(ConnectionState::Connected);
        info!(
            client_id = %self.shared.options.client_id,
            subscriptions,
            "Connected to MQTT broker"
        );

        let stream = self.shared.stream.lock().take();
        if let Some(stream) = stream {
            let handle = tokio::spawn(Arc::clone(&self.shared).pump(stream));
            *self.shared.pump.lock() = Some(handle);
        }
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Bytes, qos: QoS) -> Result<(), TransportError> {
        let limit = self.shared.options.max_payload_bytes;
        if payload.len() > limit {
            return Err(TransportError::PayloadTooLarge {
                size: payload.len(),
                limit,
            });
        }
        crate::topic::validate_topic(topic)?;
        if !self.shared.client.is_connected() {
            return Err(TransportError::NotConnected);
        }

        let message = mqtt::MessageBuilder::new()
            .topic(topic)
            .payload(payload.to_vec())
            .qos(i32::from(qos.as_u8()))
            .finalize();
        self.shared
            .client
            .publish(message)
            .await
            .map_err(broker_error)
    }

    async fn subscribe(&self, filter: &str, qos: QoS) -> Result<(), TransportError> {
        let parsed = TopicFilter::new(filter)?;
        {
            let mut recorded = self.shared.recorded.lock();
            recorded.retain(|(existing, _)| existing != &parsed);
            recorded.push((parsed, qos));
        }
        if self.shared.client.is_connected() {
            self.shared
                .client
                .subscribe(filter, i32::from(qos.as_u8()))
                .await
                .map_err(broker_error)?;
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.shared.closing.store(true, Ordering::Release);
        let result = if self.shared.client.is_connected() {
            self.shared
                .client
                .disconnect(None)
                .await
                .map(|_| ())
                .map_err(broker_error)
        } else {
            Ok(())
        };
        self.shared
            .state
            .send_replace(ConnectionState::Disconnected);
        result
    }

    fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }
}
