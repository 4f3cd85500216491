//! Test fixture: one in-process broker, one dispatcher service, one caller.

use serde_json::{Map, Value};
use shared_bus::{Broker, MemoryTransport, ReconnectPolicy, Transport, TransportOptions};
use shared_types::ServiceTopics;
use std::sync::Arc;
use std::time::Duration;
use vc_01_correlator::{ClientConfig, RpcClient};
use vc_02_registry::InMemoryTunnelDriver;
use vc_03_dispatcher::{Dispatcher, DispatcherConfig, DispatcherService};

/// Reconnect quickly so broker-restart tests stay short.
pub fn fast_reconnect() -> ReconnectPolicy {
    ReconnectPolicy {
        initial_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(50),
        multiplier: 2.0,
        max_attempts: 20,
    }
}

fn options(client_id: &str) -> TransportOptions {
    TransportOptions {
        reconnect: fast_reconnect(),
        ..TransportOptions::with_client_id(client_id)
    }
}

/// Start a connected dispatcher service for `service` on `broker`.
pub async fn start_service(broker: &Broker, service: &str) -> DispatcherService {
    let (transport, inbound) = MemoryTransport::new(broker.clone(), options(&format!("{service}-svc")));
    let transport: Arc<dyn Transport> = Arc::new(transport);
    let dispatcher = Arc::new(Dispatcher::new(service, Arc::new(InMemoryTunnelDriver::new())));
    let config = DispatcherConfig {
        heartbeat_interval: Duration::ZERO,
        ..DispatcherConfig::for_service(service)
    };

    let started = DispatcherService::start(dispatcher, Arc::clone(&transport), inbound, config)
        .await
        .expect("service subscription");
    transport.connect().await.expect("service connect");
    started
}

/// Start a connected caller for `service` on `broker`.
pub async fn start_client(broker: &Broker, client_id: &str, service: &str, timeout: Duration) -> RpcClient {
    let (transport, inbound) = MemoryTransport::new(broker.clone(), options(client_id));
    let transport: Arc<dyn Transport> = Arc::new(transport);
    transport.connect().await.expect("client connect");

    RpcClient::start(
        transport,
        inbound,
        ServiceTopics::for_service(service),
        ClientConfig::default().with_default_timeout(timeout),
    )
    .await
    .expect("client start")
}

pub struct Harness {
    pub broker: Broker,
    pub service: DispatcherService,
    pub client: RpcClient,
}

impl Harness {
    pub async fn new(service: &str) -> Self {
        let broker = Broker::new();
        let service_handle = start_service(&broker, service).await;
        let client = start_client(&broker, "caller", service, Duration::from_secs(5)).await;
        Self {
            broker,
            service: service_handle,
            client,
        }
    }

    /// Call and return the raw `result`, panicking on protocol errors.
    pub async fn call(&self, method: &str, params: Value) -> Value {
        self.client
            .call(method, object(params), None)
            .await
            .unwrap_or_else(|e| panic!("{method} failed: {e}"))
    }
}

/// `params` as a JSON object map.
pub fn object(params: Value) -> Map<String, Value> {
    match params {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => panic!("params must be an object, got {other}"),
    }
}

pub const OPENVPN_CONFIG: &str = "client\n\
    dev tun\n\
    proto udp\n\
    remote vpn.example.com 1194\n\
    route 10.20.0.0 255.255.0.0\n";

pub const WIREGUARD_CONFIG: &str = "[Interface]\n\
    PrivateKey = aGVsbG8gd29ybGQgaGVsbG8gd29ybGQgaGVsbG8gd28=\n\
    Address = 10.8.0.2/24\n\
    \n\
    [Peer]\n\
    PublicKey = d29ybGQgaGVsbG8gd29ybGQgaGVsbG8gd29ybGQgaGU=\n\
    Endpoint = wg.example.com:51820\n\
    AllowedIPs = 10.30.0.0/16, 192.168.7.0/24\n";
