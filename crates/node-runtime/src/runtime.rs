//! Node assembly: registry, dispatcher, transport, request service.

use crate::config::{BrokerConfig, NodeConfig, TransportKind};
use anyhow::{Context, Result};
use shared_bus::{Broker, BusMessage, MemoryTransport, Transport};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use vc_02_registry::{InMemoryTunnelDriver, JsonFileStore, TunnelDriver};
use vc_03_dispatcher::{Dispatcher, DispatcherService};

type Connection = (Arc<dyn Transport>, mpsc::Receiver<BusMessage>, Option<Broker>);

/// A running VPN control node.
pub struct NodeRuntime {
    dispatcher: Arc<Dispatcher>,
    service: DispatcherService,
    transport: Arc<dyn Transport>,
    broker: Option<Broker>,
}

impl NodeRuntime {
    /// Restore the registry, connect to the broker and start serving.
    ///
    /// ## Startup Sequence
    ///
    /// 1. Load the registry snapshot, if a state file is configured
    /// 2. Start enabled instances
    /// 3. Record the request subscription and start the service loop
    /// 4. Connect, which activates the subscription
    pub async fn start(config: &NodeConfig) -> Result<Self> {
        let driver: Arc<dyn TunnelDriver> = Arc::new(InMemoryTunnelDriver::new());
        let name = config.service.name.clone();

        let dispatcher = match &config.storage.state_file {
            Some(path) => {
                let store = Arc::new(JsonFileStore::new(path));
                Dispatcher::restore(name, driver, store)
                    .with_context(|| format!("Failed to restore registry from {}", path.display()))?
            }
            None => {
                info!("No state file configured, registry is not persisted");
                Dispatcher::new(name, driver)
            }
        };
        let dispatcher = Arc::new(dispatcher);

        let (transport, inbound, broker) = connect_transport(&config.broker)?;
        let service = DispatcherService::start(
            Arc::clone(&dispatcher),
            Arc::clone(&transport),
            inbound,
            config.dispatcher_config(),
        )
        .await
        .context("Failed to subscribe to the request topic")?;

        transport
            .connect()
            .await
            .with_context(|| format!("Failed to connect to broker at {}", config.broker.uri))?;

        let (instances, running) = dispatcher.instance_counts();
        info!(
            service = %service.topics().service,
            requests = %service.topics().requests,
            instances,
            running,
            "Node ready"
        );

        Ok(Self {
            dispatcher,
            service,
            transport,
            broker,
        })
    }

    /// Stop workers, stop serving, disconnect.
    ///
    /// The snapshot is left as the last mutation saved it, so enabled
    /// instances start again on the next run.
    pub async fn shutdown(self) {
        info!("Initiating graceful shutdown...");

        for (instance, err) in self.dispatcher.stop_all() {
            warn!(instance = %instance, error = %err, "Worker did not stop cleanly");
        }
        let stats = self.service.stats();
        drop(self.service);

        if let Err(e) = self.transport.disconnect().await {
            warn!(error = %e, "Broker disconnect failed");
        }
        info!(
            received = stats.received,
            responses = stats.responses_sent,
            "Shutdown complete"
        );
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    #[must_use]
    pub fn service(&self) -> &DispatcherService {
        &self.service
    }

    /// The in-process broker, when the node runs on the memory transport.
    #[must_use]
    pub fn broker(&self) -> Option<&Broker> {
        self.broker.as_ref()
    }
}

fn connect_transport(config: &BrokerConfig) -> Result<Connection> {
    let options = config.transport_options();
    match config.transport {
        TransportKind::Memory => {
            warn!("Using the in-process broker; the service is unreachable from other processes");
            let broker = Broker::new();
            let (transport, inbound) = MemoryTransport::new(broker.clone(), options);
            Ok((Arc::new(transport), inbound, Some(broker)))
        }
        TransportKind::Mqtt => mqtt_transport(config, options),
    }
}

#[cfg(feature = "mqtt")]
fn mqtt_transport(config: &BrokerConfig, options: shared_bus::TransportOptions) -> Result<Connection> {
    let (transport, inbound) = shared_bus::MqttTransport::new(&config.uri, config.keep_alive(), options)
        .with_context(|| format!("Failed to create MQTT client for {}", config.uri))?;
    Ok((Arc::new(transport), inbound, None))
}

#[cfg(not(feature = "mqtt"))]
fn mqtt_transport(config: &BrokerConfig, _options: shared_bus::TransportOptions) -> Result<Connection> {
    anyhow::bail!(
        "broker.transport = \"mqtt\" ({}) needs a build with the `mqtt` feature",
        config.uri
    )
}
