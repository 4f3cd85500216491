//! Response listener: inbound channel → pending call store.

use crate::domain::pending::PendingCallStore;
use shared_bus::BusMessage;
use shared_types::ResponseEnvelope;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// Completes pending calls from responses delivered by the transport.
pub struct ResponseListener {
    store: Arc<PendingCallStore>,
    inbound: mpsc::Receiver<BusMessage>,
    response_topic: String,
}

impl ResponseListener {
    pub fn new(
        store: Arc<PendingCallStore>,
        inbound: mpsc::Receiver<BusMessage>,
        response_topic: impl Into<String>,
    ) -> Self {
        Self {
            store,
            inbound,
            response_topic: response_topic.into(),
        }
    }

    /// Run until the transport's inbound channel closes.
    pub async fn run(mut self) {
        while let Some(message) = self.inbound.recv().await {
            self.handle_message(&message);
        }
        warn!(topic = %self.response_topic, "Inbound channel closed, stopping response listener");
    }

    /// Returns true if the message resolved a pending call.
    fn handle_message(&self, message: &BusMessage) -> bool {
        if message.topic != self.response_topic {
            trace!(topic = %message.topic, "Ignoring message on foreign topic");
            return false;
        }

        let envelope = match ResponseEnvelope::from_slice(&message.payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, bytes = message.payload.len(), "Dropping undecodable response");
                return false;
            }
        };

        let id = envelope.id.clone();
        debug!(request_id = %id, is_error = envelope.is_error(), "Received response");
        self.store.complete(&id, envelope.into_result())
    }
}
