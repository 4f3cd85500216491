//! # Memory Transport
//!
//! [`Transport`] over the in-process [`Broker`].
//!
//! A supervisor task watches the live session. When the broker drops it
//! the supervisor reconnects per the [`ReconnectPolicy`](crate::ReconnectPolicy)
//! and replays every recorded subscription; each subscription queue is
//! drained by a forwarder task into the single inbound channel.

use crate::broker::{wait_closed, Broker, Session};
use crate::message::{BusMessage, QoS};
use crate::topic::TopicFilter;
use crate::transport::{ConnectionState, Transport, TransportError, TransportOptions};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// Transport over an in-memory broker.
pub struct MemoryTransport {
    shared: Arc<Shared>,
}

struct Shared {
    broker: Broker,
    options: TransportOptions,
    inbound: mpsc::Sender<BusMessage>,
    session: Mutex<Option<Session>>,
    /// Subscriptions to replay on every (re)connect.
    recorded: Mutex<Vec<(TopicFilter, QoS)>>,
    forwarders: Mutex<Vec<JoinHandle<()>>>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
    state: watch::Sender<ConnectionState>,
    closing: AtomicBool,
}

impl MemoryTransport {
    /// Build a transport and the channel its inbound messages arrive on.
    pub fn new(broker: Broker, options: TransportOptions) -> (Self, mpsc::Receiver<BusMessage>) {
        let (inbound, rx) = mpsc::channel(options.inbound_capacity.max(1));
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let shared = Arc::new(Shared {
            broker,
            options,
            inbound,
            session: Mutex::new(None),
            recorded: Mutex::new(Vec::new()),
            forwarders: Mutex::new(Vec::new()),
            supervisor: Mutex::new(None),
            state,
            closing: AtomicBool::new(false),
        });
        (Self { shared }, rx)
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.shared.options.client_id
    }

    /// Filters replayed on reconnect.
    #[must_use]
    pub fn recorded_subscriptions(&self) -> Vec<String> {
        self.shared
            .recorded
            .lock()
            .iter()
            .map(|(filter, _)| filter.as_str().to_string())
            .collect()
    }
}

impl Shared {
    /// Open a session and replay recorded subscriptions.
    fn establish(&self) -> Result<watch::Receiver<()>, TransportError> {
        let session = self
            .broker
            .connect(&self.options.client_id, self.options.credentials.as_ref())?;
        let signal = session.close_signal();

        let recorded = self.recorded.lock().clone();
        for (filter, qos) in &recorded {
            let rx = session.subscribe(filter.as_str(), *qos)?;
            self.spawn_forwarder(filter.as_str().to_string(), rx);
        }

        *self.session.lock() = Some(session);
        self.state.send_replace(ConnectionState::Connected);
        info!(
            client_id = %self.options.client_id,
            subscriptions = recorded.len(),
            "Connected to broker"
        );
        Ok(signal)
    }

    fn spawn_forwarder(&self, filter: String, mut rx: mpsc::Receiver<BusMessage>) {
        let inbound = self.inbound.clone();
        let handle = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                if inbound.send(message).await.is_err() {
                    debug!(filter = %filter, "Inbound channel closed, stopping forwarder");
                    return;
                }
            }
            trace!(filter = %filter, "Subscription queue closed");
        });

        let mut forwarders = self.forwarders.lock();
        forwarders.retain(|h| !h.is_finished());
        forwarders.push(handle);
    }

    async fn supervise(self: Arc<Self>, mut signal: watch::Receiver<()>) {
        loop {
            wait_closed(&mut signal).await;
            if self.closing.load(Ordering::Acquire) {
                return;
            }

            self.session.lock().take();
            warn!(client_id = %self.options.client_id, "Broker connection lost");

            match self.reconnect().await {
                Some(next) => signal = next,
                None => return,
            }
        }
    }

    async fn reconnect(&self) -> Option<watch::Receiver<()>> {
        let policy = &self.options.reconnect;
        for attempt in 1..=policy.max_attempts {
            self.state
                .send_replace(ConnectionState::Reconnecting { attempt });
            let delay = policy.delay_for(attempt);
            debug!(attempt, delay_ms = delay.as_millis() as u64, "Reconnecting to broker");
            tokio::time::sleep(delay).await;

            if self.closing.load(Ordering::Acquire) {
                return None;
            }
            match self.establish() {
                Ok(signal) => {
                    info!(attempt, "Reconnected to broker");
                    return Some(signal);
                }
                Err(e) => warn!(attempt, error = %e, "Reconnect attempt failed"),
            }
        }

        error!(
            attempts = policy.max_attempts,
            "Giving up on broker reconnect"
        );
        self.state.send_replace(ConnectionState::Failed);
        None
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        if self.shared.session.lock().as_ref().is_some_and(Session::is_open) {
            return Ok(());
        }

        self.shared.closing.store(false, Ordering::Release);
        self.shared.state.send_replace(ConnectionState::Connecting);

        match self.shared.establish() {
            Ok(signal) => {
                let handle = tokio::spawn(Arc::clone(&self.shared).supervise(signal));
                if let Some(previous) = self.shared.supervisor.lock().replace(handle) {
                    previous.abort();
                }
                Ok(())
            }
            Err(e) => {
                self.shared.session.lock().take();
                self.shared
                    .state
                    .send_replace(ConnectionState::Disconnected);
                warn!(client_id = %self.shared.options.client_id, error = %e, "Connect failed");
                Err(e)
            }
        }
    }

    async fn publish(&self, topic: &str, payload: Bytes, qos: QoS) -> Result<(), TransportError> {
        let limit = self.shared.options.max_payload_bytes;
        if payload.len() > limit {
            return Err(TransportError::PayloadTooLarge {
                size: payload.len(),
                limit,
            });
        }

        let session = self.shared.session.lock();
        let session = session.as_ref().ok_or(TransportError::NotConnected)?;
        let receivers = session.publish(topic, payload, qos)?;
        trace!(topic, receivers, "Published");
        Ok(())
    }

    async fn subscribe(&self, filter: &str, qos: QoS) -> Result<(), TransportError> {
        let parsed = TopicFilter::new(filter)?;
        {
            let mut recorded = self.shared.recorded.lock();
            recorded.retain(|(existing, _)| existing != &parsed);
            recorded.push((parsed, qos));
        }

        let session = self.shared.session.lock();
        if let Some(session) = session.as_ref() {
            let rx = session.subscribe(filter, qos)?;
            self.shared.spawn_forwarder(filter.to_string(), rx);
        } else {
            debug!(filter, "Subscription recorded; active on next connect");
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.shared.closing.store(true, Ordering::Release);
        if let Some(supervisor) = self.shared.supervisor.lock().take() {
            supervisor.abort();
        }
        if let Some(session) = self.shared.session.lock().take() {
            session.disconnect();
        }
        for forwarder in self.shared.forwarders.lock().drain(..) {
            forwarder.abort();
        }
        self.shared
            .state
            .send_replace(ConnectionState::Disconnected);
        info!(client_id = %self.shared.options.client_id, "Disconnected from broker");
        Ok(())
    }

    fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }
}
