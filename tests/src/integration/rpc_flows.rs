//! # RPC Flows
//!
//! Caller → broker → dispatcher → broker → caller, for each method group.

#[cfg(test)]
mod tests {
    use crate::harness::{object, Harness, OPENVPN_CONFIG, WIREGUARD_CONFIG};
    use futures::future::join_all;
    use serde_json::json;
    use shared_types::FailureKind;
    use std::time::Duration;
    use vc_01_correlator::CallError;

    const SERVICE: &str = "ur-vpn-manager";

    // =============================================================================
    // INSTANCES
    // =============================================================================

    #[tokio::test]
    async fn test_add_status_delete() {
        let h = Harness::new(SERVICE).await;

        let added = h
            .call("add", json!({"instance_name": "vpn0", "config_content": OPENVPN_CONFIG, "auto_start": false}))
            .await;
        assert_eq!(added["success"], true);
        assert_eq!(added["message"], "VPN instance added successfully");

        let status = h.call("status", json!({"instance_name": "vpn0"})).await;
        assert_eq!(status["config_content"], OPENVPN_CONFIG);
        assert_eq!(status["status"]["type"], "openvpn");

        h.call("delete", json!({"instance_name": "vpn0"})).await;
        let status = h.call("status", json!({"instance_name": "vpn0"})).await;
        assert_eq!(status["success"], false);
        assert_eq!(status["error_kind"], "not_found");
    }

    #[tokio::test]
    async fn test_duplicate_add_keeps_original() {
        let h = Harness::new(SERVICE).await;
        h.call("add", json!({"instance_name": "vpn0", "config_content": OPENVPN_CONFIG})).await;

        let err = h
            .client
            .call_checked(
                "add",
                object(json!({"instance_name": "vpn0", "config_content": WIREGUARD_CONFIG})),
                None,
            )
            .await
            .unwrap_err();
        let CallError::Rejected { kind, message } = err else {
            panic!("expected a rejected call");
        };
        assert_eq!(kind, FailureKind::Conflict);
        assert!(message.contains("already exists"));

        let status = h.call("status", json!({"instance_name": "vpn0"})).await;
        assert_eq!(status["config_content"], OPENVPN_CONFIG);
        assert_eq!(status["status"]["status"], "running");
    }

    #[tokio::test]
    async fn test_list_filters_by_type() {
        let h = Harness::new(SERVICE).await;
        h.call("add", json!({"instance_name": "ovpn", "config_content": OPENVPN_CONFIG})).await;
        h.call("add", json!({"instance_name": "wg", "config_content": WIREGUARD_CONFIG})).await;

        assert_eq!(h.call("list", json!({})).await["count"], 2);
        let wg = h.call("list", json!({"vpn_type": "wireguard"})).await;
        assert_eq!(wg["count"], 1);
        assert_eq!(wg["instances"][0]["name"], "wg");
        assert_eq!(
            h.call("list", json!({"vpn_type": "bogus"})).await,
            json!({"success": true, "count": 0, "instances": []})
        );
    }

    #[tokio::test]
    async fn test_parse_reports_profile() {
        let h = Harness::new(SERVICE).await;
        let parsed = h.call("parse", json!({"config_content": WIREGUARD_CONFIG})).await;
        assert_eq!(parsed["vpn_type"], "wireguard");
        assert_eq!(parsed["profile"]["server"], "wg.example.com");
        assert_eq!(parsed["profile"]["port"], 51820);
        assert_eq!(parsed["profile"]["routes"], json!(["10.30.0.0/16", "192.168.7.0/24"]));
    }

    #[tokio::test]
    async fn test_enable_disable_cycle() {
        let h = Harness::new(SERVICE).await;

        let enabled = h.call("enable", json!({"instance_name": "vpn0", "config_content": OPENVPN_CONFIG})).await;
        assert_eq!(enabled["created"], true);
        assert_eq!(h.call("stats", json!({})).await["stats"]["running_instances"], 1);

        h.call("disable", json!({"instance_name": "vpn0"})).await;
        let stats = h.call("stats", json!({})).await;
        assert_eq!(stats["stats"]["running_instances"], 0);
        assert_eq!(stats["stats"]["enabled_instances"], 0);
    }

    // =============================================================================
    // ROUTES
    // =============================================================================

    #[tokio::test]
    async fn test_custom_route_lifecycle() {
        let h = Harness::new(SERVICE).await;

        let added = h
            .call("add-custom-route", json!({"id": "office", "destination": "172.16.0.0/12", "gateway": "10.8.0.1"}))
            .await;
        assert_eq!(added["message"], "Routing rule added successfully");

        h.call("update-custom-route", json!({"id": "office", "enabled": false})).await;
        let rule = h.call("get-custom-route", json!({"id": "office"})).await;
        assert_eq!(rule["routing_rule"]["enabled"], false);
        assert_eq!(rule["routing_rule"]["gateway"], "10.8.0.1");

        h.call("delete-custom-route", json!({"id": "office"})).await;
        let missing = h.call("delete-custom-route", json!({"id": "office"})).await;
        assert_eq!(missing["success"], false);
        assert_eq!(missing["error_kind"], "not_found");
    }

    #[tokio::test]
    async fn test_instance_routes_detect_and_apply() {
        let h = Harness::new(SERVICE).await;
        h.call("add", json!({"instance_name": "wg", "config_content": WIREGUARD_CONFIG})).await;

        let detected = h.call("detect-instance-routes", json!({"instance_name": "wg"})).await;
        assert_eq!(detected["count"], 2);
        assert_eq!(detected["new_routes"], 2);
        let suggested = detected["detected_routes"][0]["suggested_id"].clone();

        h.call(
            "add-instance-route",
            json!({"instance_name": "wg", "id": suggested, "destination": "10.30.0.0/16"}),
        )
        .await;
        let detected = h.call("detect-instance-routes", json!({"instance_name": "wg"})).await;
        assert_eq!(detected["new_routes"], 1);

        let applied = h.call("apply-instance-routes", json!({"instance_name": "wg"})).await;
        assert_eq!(applied["applied"], 1);
        let routes = h.call("get-instance-routes", json!({"instance_name": "wg"})).await;
        assert_eq!(routes["routing_rules"][0]["applied"], true);
    }

    #[tokio::test]
    async fn test_delete_cascades_instance_routes() {
        let h = Harness::new(SERVICE).await;
        h.call("add", json!({"instance_name": "vpn0", "config_content": OPENVPN_CONFIG})).await;
        h.call("add-instance-route", json!({"instance_name": "vpn0", "id": "a", "destination": "10.1.0.0/16"})).await;
        h.call("add-custom-route", json!({"id": "g", "destination": "10.2.0.0/16"})).await;

        h.call("delete", json!({"instance_name": "vpn0"})).await;

        let routes = h.call("get-instance-routes", json!({"instance_name": "vpn0"})).await;
        assert_eq!(routes["error_kind"], "not_found");
        assert_eq!(h.call("list-custom-routes", json!({})).await["count"], 1);
    }

    // =============================================================================
    // RUNTIME
    // =============================================================================

    #[tokio::test]
    async fn test_thread_operations_and_runtime_info() {
        let h = Harness::new(SERVICE).await;
        h.call("add", json!({"instance_name": "vpn0", "config_content": OPENVPN_CONFIG})).await;

        let stopped = h.call("thread_operation", json!({"thread_name": "vpn0", "operation": "stop"})).await;
        assert_eq!(stopped["message"], "Thread stopped");

        let info = h.call("runtime-info", json!({})).await;
        assert_eq!(info["service"], SERVICE);
        assert_eq!(info["total_threads"], 1);
        assert_eq!(info["running_threads"], 0);
    }

    #[tokio::test]
    async fn test_purge_cleanup() {
        let h = Harness::new(SERVICE).await;
        h.call("add", json!({"instance_name": "a", "config_content": OPENVPN_CONFIG})).await;
        h.call("add-custom-route", json!({"id": "g", "destination": "10.2.0.0/16"})).await;

        let refused = h.call("purge-cleanup", json!({"confirm": false})).await;
        assert_eq!(refused["error_kind"], "validation");

        let purged = h.call("purge-cleanup", json!({"confirm": true})).await;
        assert_eq!(purged["report"]["instances_removed"], 1);
        assert_eq!(purged["report"]["custom_routes_removed"], 1);
        assert_eq!(h.call("list", json!({})).await["count"], 0);
    }

    // =============================================================================
    // PROTOCOL
    // =============================================================================

    #[tokio::test]
    async fn test_unknown_method_is_remote_error() {
        let h = Harness::new(SERVICE).await;
        let err = h.client.call("frobnicate", object(json!({})), None).await.unwrap_err();
        assert!(err.is_method_not_found());
        assert!(err.was_sent());
    }

    #[tokio::test]
    async fn test_concurrent_callers_get_their_own_results() {
        let h = Harness::new(SERVICE).await;

        let calls = (0..16).map(|i| {
            let client = &h.client;
            async move {
                let name = format!("vpn{i}");
                let result = client
                    .call(
                        "add",
                        object(json!({"instance_name": name, "config_content": OPENVPN_CONFIG, "auto_start": false})),
                        Some(Duration::from_secs(5)),
                    )
                    .await
                    .unwrap();
                (name, result)
            }
        });

        for (name, result) in join_all(calls).await {
            assert_eq!(result["success"], true);
            assert_eq!(result["instance"]["name"], name.as_str());
        }
        assert_eq!(h.call("list", json!({})).await["count"], 16);
    }
}
