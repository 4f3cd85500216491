//! # In-Memory Broker
//!
//! An MQTT-style broker living inside the process. Each subscription gets
//! its own bounded queue; a publish is matched against every live
//! subscription's filter.
//!
//! ## Queue-full semantics
//!
//! - Effective QoS 0: the message is dropped for that subscriber and counted.
//! - Effective QoS 1/2: the whole publish fails with `QueueFull` and nothing
//!   is delivered to anyone (permits are reserved before any send).
//!
//! ## Outages
//!
//! `set_available(false)` and `restart()` drop every session. Their
//! subscription queues close, which is how connected transports notice the
//! loss and start reconnecting.

use crate::message::{BusMessage, Credentials, QoS};
use crate::topic::{validate_topic, TopicFilter};
use crate::transport::TransportError;
use crate::DEFAULT_QUEUE_CAPACITY;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Shared in-memory broker. Clones share state.
#[derive(Clone)]
pub struct Broker {
    inner: Arc<BrokerInner>,
}

struct BrokerInner {
    sessions: RwLock<HashMap<u64, SessionEntry>>,
    next_session_id: AtomicU64,
    available: AtomicBool,
    credentials: RwLock<Option<Credentials>>,
    queue_capacity: usize,
    messages_published: AtomicU64,
    messages_delivered: AtomicU64,
    messages_dropped: AtomicU64,
    connections_accepted: AtomicU64,
}

struct SessionEntry {
    client_id: String,
    subscriptions: Vec<SubscriptionEntry>,
    /// Dropped together with the entry; wakes `Session::close_signal` watchers.
    _alive: watch::Sender<()>,
}

struct SubscriptionEntry {
    filter: TopicFilter,
    qos: QoS,
    sender: mpsc::Sender<BusMessage>,
}

/// Point-in-time broker counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrokerStats {
    pub messages_published: u64,
    pub messages_delivered: u64,
    pub messages_dropped: u64,
    pub connections_accepted: u64,
    pub sessions: usize,
    pub subscriptions: usize,
}

impl Broker {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Broker whose subscription queues hold `queue_capacity` messages.
    #[must_use]
    pub fn with_capacity(queue_capacity: usize) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                sessions: RwLock::new(HashMap::new()),
                next_session_id: AtomicU64::new(1),
                available: AtomicBool::new(true),
                credentials: RwLock::new(None),
                queue_capacity: queue_capacity.max(1),
                messages_published: AtomicU64::new(0),
                messages_delivered: AtomicU64::new(0),
                messages_dropped: AtomicU64::new(0),
                connections_accepted: AtomicU64::new(0),
            }),
        }
    }

    /// Require these credentials on every subsequent connect.
    pub fn require_credentials(&self, credentials: Option<Credentials>) {
        *self.inner.credentials.write() = credentials;
    }

    /// Open a session for `client_id`.
    ///
    /// An existing session with the same client id is taken over (closed).
    pub fn connect(
        &self,
        client_id: &str,
        credentials: Option<&Credentials>,
    ) -> Result<Session, TransportError> {
        if !self.inner.available.load(Ordering::Acquire) {
            return Err(TransportError::ConnectionFailed(
                "broker unavailable".to_string(),
            ));
        }

        if let Some(required) = self.inner.credentials.read().as_ref() {
            if credentials != Some(required) {
                return Err(TransportError::AuthenticationFailed {
                    username: credentials.map(|c| c.username.clone()).unwrap_or_default(),
                });
            }
        }

        let id = self.inner.next_session_id.fetch_add(1, Ordering::Relaxed);
        let (alive_tx, alive_rx) = watch::channel(());

        {
            let mut sessions = self.inner.sessions.write();
            let before = sessions.len();
            sessions.retain(|_, entry| entry.client_id != client_id);
            if sessions.len() != before {
                warn!(client_id, "Session taken over by new connection");
            }
            sessions.insert(
                id,
                SessionEntry {
                    client_id: client_id.to_string(),
                    subscriptions: Vec::new(),
                    _alive: alive_tx,
                },
            );
        }

        self.inner.connections_accepted.fetch_add(1, Ordering::Relaxed);
        debug!(client_id, session = id, "Client connected");

        Ok(Session {
            id,
            client_id: client_id.to_string(),
            broker: Arc::clone(&self.inner),
            alive: alive_rx,
        })
    }

    /// Simulate an outage (`false`) or recovery (`true`).
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::Release);
        if !available {
            let dropped = self.drop_all_sessions();
            warn!(sessions = dropped, "Broker went unavailable");
        } else {
            info!("Broker available");
        }
    }

    /// Drop every session while staying available.
    pub fn restart(&self) {
        let dropped = self.drop_all_sessions();
        info!(sessions = dropped, "Broker restarted");
    }

    fn drop_all_sessions(&self) -> usize {
        let mut sessions = self.inner.sessions.write();
        let count = sessions.len();
        sessions.clear();
        count
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.inner.available.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.inner.sessions.read().len()
    }

    /// Number of subscriptions with a live receiver.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.inner
            .sessions
            .read()
            .values()
            .flat_map(|s| s.subscriptions.iter())
            .filter(|sub| !sub.sender.is_closed())
            .count()
    }

    #[must_use]
    pub fn stats(&self) -> BrokerStats {
        BrokerStats {
            messages_published: self.inner.messages_published.load(Ordering::Relaxed),
            messages_delivered: self.inner.messages_delivered.load(Ordering::Relaxed),
            messages_dropped: self.inner.messages_dropped.load(Ordering::Relaxed),
            connections_accepted: self.inner.connections_accepted.load(Ordering::Relaxed),
            sessions: self.session_count(),
            subscriptions: self.subscription_count(),
        }
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

/// One client's session with the broker.
///
/// Dropping the handle disconnects the session.
pub struct Session {
    id: u64,
    client_id: String,
    broker: Arc<BrokerInner>,
    alive: watch::Receiver<()>,
}

impl Session {
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Whether the broker still holds this session.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.broker.sessions.read().contains_key(&self.id)
    }

    /// Receiver whose `changed()` fails once the broker drops this session.
    #[must_use]
    pub fn close_signal(&self) -> watch::Receiver<()> {
        self.alive.clone()
    }

    /// Subscribe; replaces an existing subscription with the same filter.
    pub fn subscribe(
        &self,
        filter: &str,
        qos: QoS,
    ) -> Result<mpsc::Receiver<BusMessage>, TransportError> {
        let filter = TopicFilter::new(filter)?;
        let mut sessions = self.broker.sessions.write();
        let entry = sessions
            .get_mut(&self.id)
            .ok_or(TransportError::NotConnected)?;

        let (tx, rx) = mpsc::channel(self.broker.queue_capacity);
        entry
            .subscriptions
            .retain(|sub| sub.filter != filter && !sub.sender.is_closed());
        debug!(client_id = %self.client_id, filter = filter.as_str(), ?qos, "Subscribed");
        entry.subscriptions.push(SubscriptionEntry {
            filter,
            qos,
            sender: tx,
        });
        Ok(rx)
    }

    /// Remove a subscription. Returns whether it existed.
    pub fn unsubscribe(&self, filter: &str) -> bool {
        let mut sessions = self.broker.sessions.write();
        let Some(entry) = sessions.get_mut(&self.id) else {
            return false;
        };
        let before = entry.subscriptions.len();
        entry.subscriptions.retain(|sub| sub.filter.as_str() != filter);
        entry.subscriptions.len() != before
    }

    /// Publish to every matching subscription.
    ///
    /// Returns the number of subscriptions the message was queued for.
    pub fn publish(&self, topic: &str, payload: Bytes, qos: QoS) -> Result<usize, TransportError> {
        validate_topic(topic)?;

        let sessions = self.broker.sessions.read();
        if !sessions.contains_key(&self.id) {
            return Err(TransportError::NotConnected);
        }
        self.broker.messages_published.fetch_add(1, Ordering::Relaxed);

        let mut permits = Vec::new();
        let mut dropped = 0u64;
        for sub in sessions
            .values()
            .flat_map(|s| s.subscriptions.iter())
            .filter(|sub| sub.filter.matches(topic))
        {
            let effective = qos.min(sub.qos);
            match sub.sender.try_reserve() {
                Ok(permit) => permits.push((permit, effective)),
                Err(TrySendError::Full(())) if effective == QoS::AtMostOnce => dropped += 1,
                Err(TrySendError::Full(())) => {
                    return Err(TransportError::QueueFull {
                        topic: topic.to_string(),
                    });
                }
                // Receiver gone; pruned on the owner's next subscribe
                Err(TrySendError::Closed(())) => {}
            }
        }

        if dropped > 0 {
            self.broker
                .messages_dropped
                .fetch_add(dropped, Ordering::Relaxed);
            debug!(topic, dropped, "QoS 0 message dropped for slow subscribers");
        }

        let delivered = permits.len();
        for (permit, effective) in permits {
            permit.send(BusMessage {
                topic: topic.to_string(),
                payload: payload.clone(),
                qos: effective,
            });
        }
        self.broker
            .messages_delivered
            .fetch_add(delivered as u64, Ordering::Relaxed);

        Ok(delivered)
    }

    /// Close the session.
    pub fn disconnect(self) {
        // Drop does the work
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.broker.sessions.write().remove(&self.id).is_some() {
            debug!(client_id = %self.client_id, session = self.id, "Client disconnected");
        }
    }
}

/// Resolve once the session behind `signal` has been dropped by the broker.
pub async fn wait_closed(signal: &mut watch::Receiver<()>) {
    while signal.changed().await.is_ok() {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const TOPIC: &str = "direct_messaging/svc/requests";

    #[tokio::test]
    async fn test_publish_reaches_matching_subscribers_only() {
        let broker = Broker::new();
        let a = broker.connect("a", None).unwrap();
        let b = broker.connect("b", None).unwrap();

        let mut exact = a.subscribe(TOPIC, QoS::AtLeastOnce).unwrap();
        let mut wildcard = b.subscribe("direct_messaging/+/requests", QoS::AtMostOnce).unwrap();
        let mut other = b.subscribe("clients/#", QoS::AtMostOnce).unwrap();

        let delivered = a.publish(TOPIC, Bytes::from_static(b"hi"), QoS::AtLeastOnce).unwrap();
        assert_eq!(delivered, 2);

        let msg = exact.recv().await.unwrap();
        assert_eq!(msg.payload, Bytes::from_static(b"hi"));
        assert_eq!(msg.qos, QoS::AtLeastOnce);
        // Effective QoS is the lower of publish and subscription levels
        assert_eq!(wildcard.recv().await.unwrap().qos, QoS::AtMostOnce);
        assert!(other.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_qos1_queue_full_is_an_error_and_delivers_nothing() {
        let broker = Broker::with_capacity(1);
        let publisher = broker.connect("pub", None).unwrap();
        let slow = broker.connect("slow", None).unwrap();
        let fast = broker.connect("fast", None).unwrap();
        let mut slow_rx = slow.subscribe(TOPIC, QoS::AtLeastOnce).unwrap();
        let mut fast_rx = fast.subscribe(TOPIC, QoS::AtLeastOnce).unwrap();

        publisher.publish(TOPIC, Bytes::from_static(b"1"), QoS::AtLeastOnce).unwrap();
        fast_rx.recv().await.unwrap();

        let err = publisher
            .publish(TOPIC, Bytes::from_static(b"2"), QoS::AtLeastOnce)
            .unwrap_err();
        assert_eq!(err, TransportError::QueueFull { topic: TOPIC.into() });
        assert!(fast_rx.try_recv().is_err());
        assert_eq!(slow_rx.recv().await.unwrap().payload, Bytes::from_static(b"1"));
    }

    #[tokio::test]
    async fn test_qos0_queue_full_drops_silently() {
        let broker = Broker::with_capacity(1);
        let session = broker.connect("c", None).unwrap();
        let _rx = session.subscribe(TOPIC, QoS::AtMostOnce).unwrap();

        session.publish(TOPIC, Bytes::from_static(b"1"), QoS::AtMostOnce).unwrap();
        let delivered = session.publish(TOPIC, Bytes::from_static(b"2"), QoS::AtMostOnce).unwrap();
        assert_eq!(delivered, 0);
        assert_eq!(broker.stats().messages_dropped, 1);
    }

    #[tokio::test]
    async fn test_unavailable_broker_refuses_and_closes_sessions() {
        let broker = Broker::new();
        let session = broker.connect("c", None).unwrap();
        let mut rx = session.subscribe(TOPIC, QoS::AtLeastOnce).unwrap();
        let mut signal = session.close_signal();

        broker.set_available(false);
        assert!(rx.recv().await.is_none());
        tokio::time::timeout(Duration::from_secs(1), wait_closed(&mut signal))
            .await
            .unwrap();
        assert!(!session.is_open());
        assert_eq!(
            session.publish(TOPIC, Bytes::new(), QoS::AtMostOnce),
            Err(TransportError::NotConnected)
        );
        assert!(matches!(
            broker.connect("c", None),
            Err(TransportError::ConnectionFailed(_))
        ));

        broker.set_available(true);
        assert!(broker.connect("c", None).is_ok());
    }

    #[test]
    fn test_credentials_enforced() {
        let broker = Broker::new();
        broker.require_credentials(Some(Credentials::new("svc", "secret")));

        assert!(matches!(
            broker.connect("c", Some(&Credentials::new("svc", "wrong"))),
            Err(TransportError::AuthenticationFailed { .. })
        ));
        assert!(broker.connect("c", None).is_err());
        assert!(broker.connect("c", Some(&Credentials::new("svc", "secret"))).is_ok());
    }

    #[test]
    fn test_client_id_takeover() {
        let broker = Broker::new();
        let first = broker.connect("same", None).unwrap();
        let _second = broker.connect("same", None).unwrap();
        assert!(!first.is_open());
        assert_eq!(broker.session_count(), 1);
    }

    #[test]
    fn test_drop_disconnects() {
        let broker = Broker::new();
        {
            let session = broker.connect("c", None).unwrap();
            let _rx = session.subscribe(TOPIC, QoS::AtMostOnce).unwrap();
            assert_eq!(broker.subscription_count(), 1);
        }
        assert_eq!(broker.session_count(), 0);
        assert_eq!(broker.subscription_count(), 0);
    }

    #[test]
    fn test_resubscribe_replaces_and_unsubscribe_removes() {
        let broker = Broker::new();
        let session = broker.connect("c", None).unwrap();
        let _old = session.subscribe(TOPIC, QoS::AtMostOnce).unwrap();
        let _new = session.subscribe(TOPIC, QoS::AtLeastOnce).unwrap();
        assert_eq!(broker.subscription_count(), 1);
        assert!(session.unsubscribe(TOPIC));
        assert!(!session.unsubscribe(TOPIC));
    }
}
