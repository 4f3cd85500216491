//! # Persistence
//!
//! A node with a state file keeps its registry across restarts.

#[cfg(test)]
mod tests {
    use crate::harness::{object, start_client, OPENVPN_CONFIG, WIREGUARD_CONFIG};
    use node_runtime::{NodeConfig, NodeRuntime};
    use serde_json::json;
    use std::path::Path;
    use std::time::Duration;
    use vc_01_correlator::RpcClient;

    const SERVICE: &str = "persist-svc";

    fn config(state_file: &Path) -> NodeConfig {
        let mut config = NodeConfig::default();
        config.service.name = SERVICE.into();
        config.service.heartbeat_interval_secs = 0;
        config.storage.state_file = Some(state_file.to_path_buf());
        config
    }

    async fn client_for(node: &NodeRuntime) -> RpcClient {
        let broker = node.broker().expect("memory transport");
        start_client(broker, "persist-caller", SERVICE, Duration::from_secs(5)).await
    }

    #[tokio::test]
    async fn test_registry_survives_node_restart() {
        let dir = tempfile::tempdir().unwrap();
        let state_file = dir.path().join("registry.json");

        let node = NodeRuntime::start(&config(&state_file)).await.unwrap();
        let client = client_for(&node).await;
        for (method, params) in [
            ("add", json!({"instance_name": "on", "config_content": OPENVPN_CONFIG})),
            ("add", json!({"instance_name": "off", "config_content": WIREGUARD_CONFIG, "auto_start": false})),
            ("add-custom-route", json!({"id": "office", "destination": "172.16.0.0/12"})),
            ("add-instance-route", json!({"instance_name": "on", "id": "lab", "destination": "10.9.0.0/16"})),
        ] {
            client.call_checked(method, object(params), None).await.unwrap();
        }
        drop(client);
        node.shutdown().await;
        assert!(state_file.exists());

        let node = NodeRuntime::start(&config(&state_file)).await.unwrap();
        let client = client_for(&node).await;

        let list = client.call("list", object(json!({})), None).await.unwrap();
        assert_eq!(list["count"], 2);
        let on = client.call("status", object(json!({"instance_name": "on"})), None).await.unwrap();
        assert_eq!(on["status"]["status"], "running");
        let off = client.call("status", object(json!({"instance_name": "off"})), None).await.unwrap();
        assert_eq!(off["status"]["status"], "stopped");

        let routes = client
            .call("get-instance-routes", object(json!({"instance_name": "on"})), None)
            .await
            .unwrap();
        assert_eq!(routes["count"], 1);
        assert_eq!(routes["routing_rules"][0]["applied"], false);
        let custom = client.call("list-custom-routes", object(json!({})), None).await.unwrap();
        assert_eq!(custom["count"], 1);

        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_failed_calls_do_not_touch_state_file() {
        let dir = tempfile::tempdir().unwrap();
        let state_file = dir.path().join("registry.json");

        let node = NodeRuntime::start(&config(&state_file)).await.unwrap();
        let before = std::fs::read_to_string(&state_file).unwrap();

        let client = client_for(&node).await;
        let result = client
            .call("delete-custom-route", object(json!({"id": "ghost"})), None)
            .await
            .unwrap();
        assert_eq!(result["success"], false);
        client.call("list", object(json!({})), None).await.unwrap();

        assert_eq!(std::fs::read_to_string(&state_file).unwrap(), before);
        node.shutdown().await;
    }
}
