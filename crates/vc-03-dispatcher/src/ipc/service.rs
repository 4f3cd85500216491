//! Request service: request topic → dispatcher → response topic.
//!
//! Each delivered request is handled on its own task, bounded by a
//! semaphore. Handlers run on the blocking pool because they hold the
//! registry lock and call into the tunnel driver.

use crate::dispatcher::Dispatcher;
use crate::domain::config::DispatcherConfig;
use crate::ipc::heartbeat::heartbeat_task;
use bytes::Bytes;
use parking_lot::Mutex;
use serde::Serialize;
use shared_bus::{BusMessage, DeliveryDedup, Transport, TransportError};
use shared_types::{Method, RequestEnvelope, ResponseEnvelope, RpcErrorObject, ServiceTopics};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

#[derive(Debug, Default)]
pub struct ServiceStats {
    received: AtomicU64,
    malformed: AtomicU64,
    duplicates: AtomicU64,
    unknown_methods: AtomicU64,
    responses_sent: AtomicU64,
    publish_errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ServiceStatsSnapshot {
    pub received: u64,
    /// Undecodable payloads, answered when an id could be recovered.
    pub malformed: u64,
    /// Redeliveries dropped without a second dispatch.
    pub duplicates: u64,
    pub unknown_methods: u64,
    pub responses_sent: u64,
    pub publish_errors: u64,
}

impl ServiceStats {
    #[must_use]
    pub fn snapshot(&self) -> ServiceStatsSnapshot {
        ServiceStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            unknown_methods: self.unknown_methods.load(Ordering::Relaxed),
            responses_sent: self.responses_sent.load(Ordering::Relaxed),
            publish_errors: self.publish_errors.load(Ordering::Relaxed),
        }
    }
}

/// Turns request deliveries into responses.
pub struct RequestProcessor {
    dispatcher: Arc<Dispatcher>,
    transport: Arc<dyn Transport>,
    topics: ServiceTopics,
    config: DispatcherConfig,
    dedup: Mutex<DeliveryDedup>,
    stats: ServiceStats,
}

impl RequestProcessor {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        transport: Arc<dyn Transport>,
        config: DispatcherConfig,
    ) -> Self {
        let dedup = DeliveryDedup::with_config(config.dedup_window, DeliveryDedup::DEFAULT_GC_INTERVAL);
        Self {
            dispatcher,
            transport,
            topics: config.topics(),
            config,
            dedup: Mutex::new(dedup),
            stats: ServiceStats::default(),
        }
    }

    /// Handle one delivery and publish its response, if it gets one.
    pub async fn process(&self, message: BusMessage) {
        let Some(response) = self.respond(&message).await else {
            return;
        };

        let payload = match response.to_vec() {
            Ok(payload) => payload,
            Err(e) => {
                error!(request_id = %response.id, error = %e, "Failed to encode response");
                return;
            }
        };

        match self
            .transport
            .publish(&self.topics.responses, Bytes::from(payload), self.config.qos)
            .await
        {
            Ok(()) => {
                self.stats.responses_sent.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.stats.publish_errors.fetch_add(1, Ordering::Relaxed);
                warn!(request_id = %response.id, error = %e, "Response not sent");
            }
        }
    }

    /// The response for a delivery; `None` when nothing should be sent.
    pub async fn respond(&self, message: &BusMessage) -> Option<ResponseEnvelope> {
        if message.topic != self.topics.requests {
            trace!(topic = %message.topic, "Ignoring message on foreign topic");
            return None;
        }
        self.stats.received.fetch_add(1, Ordering::Relaxed);

        let request = match RequestEnvelope::from_slice(&message.payload) {
            Ok(request) => request,
            Err(e) => {
                self.stats.malformed.fetch_add(1, Ordering::Relaxed);
                let id = RequestEnvelope::peek_id(&message.payload);
                warn!(error = %e, request_id = ?id, bytes = message.payload.len(), "Malformed request");
                return id.map(|id| ResponseEnvelope::failure(id, RpcErrorObject::from(&e)));
            }
        };

        if self.is_duplicate(&request, &message.payload) {
            self.stats.duplicates.fetch_add(1, Ordering::Relaxed);
            debug!(request_id = %request.id, method = %request.method, "Dropping redelivered request");
            return None;
        }

        let RequestEnvelope { id, method, params, .. } = request;
        let method = match method.parse::<Method>() {
            Ok(method) => method,
            Err(_) => {
                self.stats.unknown_methods.fetch_add(1, Ordering::Relaxed);
                debug!(request_id = %id, method = %method, "Unknown method");
                return Some(ResponseEnvelope::failure(id, RpcErrorObject::method_not_found(&method)));
            }
        };

        let dispatcher = Arc::clone(&self.dispatcher);
        let outcome = tokio::task::spawn_blocking(move || dispatcher.dispatch(method, &params)).await;
        match outcome {
            Ok(outcome) => {
                debug!(request_id = %id, method = %method, success = outcome.is_success(), "Handled request");
                Some(ResponseEnvelope::success(id, outcome.into_value()))
            }
            Err(e) => {
                error!(request_id = %id, method = %method, error = %e, "Handler panicked");
                Some(ResponseEnvelope::failure(id, RpcErrorObject::internal(e)))
            }
        }
    }

    fn is_duplicate(&self, request: &RequestEnvelope, payload: &[u8]) -> bool {
        let mut dedup = self.dedup.lock();
        dedup.is_enabled() && dedup.check_and_record(request.id.as_str(), payload).is_err()
    }

    #[must_use]
    pub fn stats(&self) -> ServiceStatsSnapshot {
        self.stats.snapshot()
    }

    #[must_use]
    pub fn topics(&self) -> &ServiceTopics {
        &self.topics
    }
}

/// Read deliveries until the inbound channel closes.
async fn request_loop(
    processor: Arc<RequestProcessor>,
    mut inbound: mpsc::Receiver<BusMessage>,
    limit: usize,
) {
    let slots = Arc::new(Semaphore::new(limit.max(1)));

    while let Some(message) = inbound.recv().await {
        let Ok(permit) = Arc::clone(&slots).acquire_owned().await else {
            break;
        };
        let processor = Arc::clone(&processor);
        tokio::spawn(async move {
            processor.process(message).await;
            drop(permit);
        });
    }
    warn!(topic = %processor.topics.requests, "Inbound channel closed, stopping request service");
}

/// A running service endpoint.
///
/// Owns the request loop and heartbeat; both stop when dropped.
pub struct DispatcherService {
    processor: Arc<RequestProcessor>,
    tasks: Vec<JoinHandle<()>>,
}

impl DispatcherService {
    /// Subscribe to the request topic and start serving.
    ///
    /// `inbound` must be the channel the transport was built with. The
    /// subscription is recorded by the transport, so the service may be
    /// started before the transport connects.
    pub async fn start(
        dispatcher: Arc<Dispatcher>,
        transport: Arc<dyn Transport>,
        inbound: mpsc::Receiver<BusMessage>,
        config: DispatcherConfig,
    ) -> Result<Self, TransportError> {
        let topics = config.topics();
        transport.subscribe(&topics.requests, config.qos).await?;

        let mut tasks = Vec::with_capacity(2);
        if !config.heartbeat_interval.is_zero() {
            tasks.push(tokio::spawn(heartbeat_task(
                Arc::clone(&dispatcher),
                Arc::clone(&transport),
                topics.heartbeat.clone(),
                config.heartbeat_interval,
            )));
        }

        let limit = config.max_concurrent_requests;
        let processor = Arc::new(RequestProcessor::new(dispatcher, transport, config));
        tasks.push(tokio::spawn(request_loop(Arc::clone(&processor), inbound, limit)));

        info!(
            service = %topics.service,
            requests = %topics.requests,
            max_concurrent = limit,
            "Request service started"
        );
        Ok(Self { processor, tasks })
    }

    #[must_use]
    pub fn stats(&self) -> ServiceStatsSnapshot {
        self.processor.stats()
    }

    #[must_use]
    pub fn topics(&self) -> &ServiceTopics {
        self.processor.topics()
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.processor.dispatcher
    }
}

impl Drop for DispatcherService {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
