//! RPC client: publish a request, await the correlated response.

use crate::domain::config::ClientConfig;
use crate::domain::error::CallError;
use crate::domain::pending::{
    cleanup_task, CallResolution, PendingCallStore, PendingStatsSnapshot, MAX_WAIT,
};
use crate::domain::request_id::RequestIdGenerator;
use crate::ipc::listener::ResponseListener;
use bytes::Bytes;
use serde_json::{Map, Value};
use shared_bus::{BusMessage, Transport};
use shared_types::{Outcome, RequestEnvelope, RequestId, ServiceTopics};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Caller-side endpoint for one service.
///
/// Owns the response listener and the expiry sweep; both stop when the
/// client is dropped.
pub struct RpcClient {
    transport: Arc<dyn Transport>,
    topics: ServiceTopics,
    config: ClientConfig,
    ids: RequestIdGenerator,
    store: Arc<PendingCallStore>,
    tasks: Vec<JoinHandle<()>>,
}

impl RpcClient {
    /// Subscribe to the service's response topic and start the listener.
    ///
    /// `inbound` must be the channel the transport was built with. The
    /// subscription is recorded by the transport, so the client may be
    /// started before the transport connects.
    pub async fn start(
        transport: Arc<dyn Transport>,
        inbound: mpsc::Receiver<BusMessage>,
        topics: ServiceTopics,
        config: ClientConfig,
    ) -> Result<Self, CallError> {
        transport.subscribe(&topics.responses, config.qos).await?;

        let store = Arc::new(PendingCallStore::new());
        let listener = ResponseListener::new(Arc::clone(&store), inbound, topics.responses.clone());
        let tasks = vec![
            tokio::spawn(listener.run()),
            tokio::spawn(cleanup_task(Arc::clone(&store), config.cleanup_interval)),
        ];

        debug!(service = %topics.service, "RPC client started");
        Ok(Self {
            transport,
            topics,
            config,
            ids: RequestIdGenerator::new(),
            store,
            tasks,
        })
    }

    /// Call `method` and wait for its result.
    ///
    /// `timeout` overrides the client default for this call only.
    pub async fn call(
        &self,
        method: impl AsRef<str>,
        params: Map<String, Value>,
        timeout: Option<Duration>,
    ) -> Result<Value, CallError> {
        self.start_call(method, params, timeout).await?.wait().await
    }

    /// Like [`call`](Self::call), but a `{success: false}` result becomes
    /// [`CallError::Rejected`].
    pub async fn call_checked(
        &self,
        method: impl AsRef<str>,
        params: Map<String, Value>,
        timeout: Option<Duration>,
    ) -> Result<Outcome, CallError> {
        let value = self.call(method, params, timeout).await?;
        match Outcome::from_value(value) {
            Outcome::Failure { kind, error } => Err(CallError::Rejected {
                kind,
                message: error,
            }),
            success => Ok(success),
        }
    }

    /// Register and publish a call without waiting for its response.
    ///
    /// The pending entry exists before the request is handed to the
    /// transport; if publishing fails the entry is removed again.
    pub async fn start_call(
        &self,
        method: impl AsRef<str>,
        params: Map<String, Value>,
        timeout: Option<Duration>,
    ) -> Result<CallHandle, CallError> {
        let method = method.as_ref();
        let timeout = timeout.unwrap_or(self.config.default_timeout);

        // A collision is only possible after counter wrap-around
        let (id, rx) = loop {
            let id = self.ids.next_id();
            if let Some(rx) = self.store.register(id.clone(), method, timeout) {
                break (id, rx);
            }
        };
        let now = Instant::now();
        let deadline = now.checked_add(timeout).unwrap_or(now + MAX_WAIT);

        let payload = match RequestEnvelope::new(id.clone(), method, params).to_vec() {
            Ok(payload) => payload,
            Err(e) => {
                self.store.cancel(&id);
                return Err(CallError::Encode(e.to_string()));
            }
        };

        if let Err(e) = self
            .transport
            .publish(&self.topics.requests, Bytes::from(payload), self.config.qos)
            .await
        {
            self.store.cancel(&id);
            warn!(request_id = %id, method, error = %e, "Request not sent");
            return Err(CallError::Transport(e));
        }

        debug!(
            request_id = %id,
            method,
            timeout_ms = timeout.as_millis() as u64,
            "Sent request"
        );

        Ok(CallHandle {
            id,
            method: method.to_string(),
            rx,
            deadline,
            timeout,
            store: Arc::clone(&self.store),
            settled: false,
        })
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.store.pending_count()
    }

    #[must_use]
    pub fn stats(&self) -> PendingStatsSnapshot {
        self.store.stats().snapshot()
    }

    #[must_use]
    pub fn topics(&self) -> &ServiceTopics {
        &self.topics
    }

    #[must_use]
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// An in-flight call.
///
/// Dropping a handle that has not resolved cancels the call.
pub struct CallHandle {
    id: RequestId,
    method: String,
    rx: oneshot::Receiver<CallResolution>,
    deadline: Instant,
    timeout: Duration,
    store: Arc<PendingCallStore>,
    settled: bool,
}

impl CallHandle {
    #[must_use]
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Wait for the response or the deadline, whichever comes first.
    pub async fn wait(mut self) -> Result<Value, CallError> {
        let waited = tokio::time::timeout_at(self.deadline, &mut self.rx).await;
        self.settled = true;

        match waited {
            Ok(Ok(resolution)) => resolution.result.map_err(CallError::from),
            Ok(Err(_)) => Err(self.lost()),
            Err(_) => {
                if self.store.expire(&self.id) {
                    return Err(self.timed_out());
                }
                // The response won the race against the deadline
                match self.rx.try_recv() {
                    Ok(resolution) => resolution.result.map_err(CallError::from),
                    Err(_) => Err(self.timed_out()),
                }
            }
        }
    }

    /// Give up on the call. A response arriving later is discarded.
    ///
    /// Returns false if the call had already been resolved.
    pub fn cancel(mut self) -> bool {
        self.settled = true;
        self.store.cancel(&self.id)
    }

    fn timed_out(&self) -> CallError {
        CallError::TimedOut {
            id: self.id.clone(),
            method: self.method.clone(),
            timeout: self.timeout,
        }
    }

    /// The store dropped the entry without answering: the sweep expired it
    /// or someone cancelled it.
    fn lost(&self) -> CallError {
        if Instant::now() >= self.deadline {
            self.timed_out()
        } else {
            CallError::Cancelled {
                id: self.id.clone(),
            }
        }
    }
}

impl Drop for CallHandle {
    fn drop(&mut self) {
        if !self.settled && self.store.cancel(&self.id) {
            debug!(request_id = %self.id, method = %self.method, "Call handle dropped unresolved");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_bus::{Broker, MemoryTransport, QoS, TransportError, TransportOptions};
    use shared_types::{FailureKind, ResponseEnvelope};

    const SERVICE: &str = "ur-vpn-manager";

    /// Client plus the raw service-side session used to play the server.
    async fn setup() -> (Broker, RpcClient, mpsc::Receiver<BusMessage>, shared_bus::Session) {
        let broker = Broker::new();
        let (transport, inbound) =
            MemoryTransport::new(broker.clone(), TransportOptions::with_client_id("caller"));
        transport.connect().await.unwrap();

        let topics = ServiceTopics::for_service(SERVICE);
        let server = broker.connect("server", None).unwrap();
        let requests = server.subscribe(&topics.requests, QoS::AtLeastOnce).unwrap();

        let client = RpcClient::start(Arc::new(transport), inbound, topics, ClientConfig::default())
            .await
            .unwrap();
        (broker, client, requests, server)
    }

    async fn next_request(requests: &mut mpsc::Receiver<BusMessage>) -> RequestEnvelope {
        let message = requests.recv().await.unwrap();
        RequestEnvelope::from_slice(&message.payload).unwrap()
    }

    fn respond(server: &shared_bus::Session, id: &RequestId, result: Value) {
        let topics = ServiceTopics::for_service(SERVICE);
        let payload = ResponseEnvelope::success(id.clone(), result).to_vec().unwrap();
        server
            .publish(&topics.responses, Bytes::from(payload), QoS::AtLeastOnce)
            .unwrap();
    }

    #[tokio::test]
    async fn test_call_round_trip() {
        let (_broker, client, mut requests, server) = setup().await;

        let handle = client.start_call("list", Map::new(), None).await.unwrap();
        let request = next_request(&mut requests).await;
        assert_eq!(request.method, "list");
        assert_eq!(&request.id, handle.id());

        respond(&server, &request.id, json!({"success": true, "instances": []}));
        let result = handle.wait().await.unwrap();
        assert_eq!(result["instances"], json!([]));
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_out_of_order_responses_reach_right_callers() {
        let (_broker, client, mut requests, server) = setup().await;

        let first = client.start_call("status", Map::new(), None).await.unwrap();
        let second = client.start_call("stats", Map::new(), None).await.unwrap();
        let req_first = next_request(&mut requests).await;
        let req_second = next_request(&mut requests).await;

        respond(&server, &req_second.id, json!({"which": "second"}));
        respond(&server, &req_first.id, json!({"which": "first"}));

        assert_eq!(first.wait().await.unwrap()["which"], "first");
        assert_eq!(second.wait().await.unwrap()["which"], "second");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_then_late_response_discarded() {
        let (_broker, client, mut requests, server) = setup().await;

        let err = client
            .call("add", Map::new(), Some(Duration::from_millis(100)))
            .await
            .unwrap_err();
        assert!(matches!(err, CallError::TimedOut { .. }));
        assert!(err.is_outcome_unknown());

        let request = next_request(&mut requests).await;
        respond(&server, &request.id, json!({"success": true}));
        tokio::time::sleep(Duration::from_millis(10)).await;

        let stats = client.stats();
        assert_eq!(stats.timeouts, 1);
        assert_eq!(stats.unmatched, 1);
        assert_eq!(client.pending_count(), 0);

        // The next call only sees its own response
        let next = client.start_call("list", Map::new(), Some(Duration::from_secs(1))).await.unwrap();
        let request = next_request(&mut requests).await;
        assert_eq!(&request.id, next.id());
        respond(&server, &request.id, json!({"success": true, "count": 0}));
        assert_eq!(next.wait().await.unwrap(), json!({"success": true, "count": 0}));
        assert_eq!(client.stats().unmatched, 1);
    }

    #[tokio::test]
    async fn test_unbounded_timeout_can_be_cancelled() {
        let (_broker, client, mut requests, _server) = setup().await;

        let handle = client.start_call("list", Map::new(), Some(Duration::MAX)).await.unwrap();
        assert_eq!(&next_request(&mut requests).await.id, handle.id());
        assert_eq!(client.pending_count(), 1);

        assert!(handle.cancel());
        assert_eq!(client.pending_count(), 0);
        assert_eq!(client.stats().cancelled, 1);
    }

    #[tokio::test]
    async fn test_cancel_is_terminal() {
        let (_broker, client, mut requests, server) = setup().await;

        let handle = client.start_call("stop", Map::new(), None).await.unwrap();
        let id = handle.id().clone();
        assert!(handle.cancel());

        let request = next_request(&mut requests).await;
        assert_eq!(request.id, id);
        respond(&server, &id, json!({"success": true}));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(client.stats().cancelled, 1);
        assert_eq!(client.stats().unmatched, 1);
    }

    #[tokio::test]
    async fn test_dropped_handle_cancels() {
        let (_broker, client, _requests, _server) = setup().await;
        let handle = client.start_call("list", Map::new(), None).await.unwrap();
        assert_eq!(client.pending_count(), 1);
        drop(handle);
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_publish_failure_never_registers() {
        let broker = Broker::new();
        let (transport, inbound) = MemoryTransport::new(broker, TransportOptions::default());
        let client = RpcClient::start(
            Arc::new(transport),
            inbound,
            ServiceTopics::for_service(SERVICE),
            ClientConfig::default(),
        )
        .await
        .unwrap();

        let err = client.call("list", Map::new(), None).await.unwrap_err();
        assert_eq!(err, CallError::Transport(TransportError::NotConnected));
        assert!(!err.was_sent());
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_call_checked_maps_failure() {
        let (_broker, client, mut requests, server) = setup().await;

        let call = client.call_checked("delete-custom-route", Map::new(), None);
        let serve = async {
            let request = next_request(&mut requests).await;
            respond(
                &server,
                &request.id,
                Outcome::failure(FailureKind::NotFound, "Routing rule not found").into_value(),
            );
        };
        let (result, ()) = tokio::join!(call, serve);

        match result.unwrap_err() {
            CallError::Rejected { kind, message } => {
                assert_eq!(kind, FailureKind::NotFound);
                assert_eq!(message, "Routing rule not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
