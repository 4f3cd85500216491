//! # Resilience
//!
//! Broker restarts, outages, missing services and topic isolation.

#[cfg(test)]
mod tests {
    use crate::harness::{object, start_client, start_service, Harness, OPENVPN_CONFIG};
    use serde_json::json;
    use shared_bus::{Broker, TransportError};
    use std::time::Duration;
    use vc_01_correlator::CallError;

    /// Wait until `sessions` clients are connected with `subscriptions`
    /// live subscriptions between them.
    async fn wait_for_sessions(broker: &Broker, sessions: usize, subscriptions: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while broker.session_count() < sessions || broker.subscription_count() < subscriptions {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("clients did not reconnect");
    }

    #[tokio::test]
    async fn test_calls_work_after_broker_restart() {
        let h = Harness::new("restart-svc").await;
        h.call("add", json!({"instance_name": "vpn0", "config_content": OPENVPN_CONFIG})).await;

        h.broker.restart();
        wait_for_sessions(&h.broker, 2, 2).await;

        let status = h.call("status", json!({"instance_name": "vpn0"})).await;
        assert_eq!(status["status"]["status"], "running");
    }

    #[tokio::test]
    async fn test_outage_fails_fast_then_recovers() {
        let h = Harness::new("outage-svc").await;

        h.broker.set_available(false);
        let err = h.client.call("list", object(json!({})), None).await.unwrap_err();
        assert_eq!(err, CallError::Transport(TransportError::NotConnected));
        assert!(!err.was_sent());
        assert_eq!(h.client.pending_count(), 0);

        h.broker.set_available(true);
        wait_for_sessions(&h.broker, 2, 2).await;
        assert_eq!(h.call("list", json!({})).await["success"], true);
    }

    #[tokio::test]
    async fn test_absent_service_times_out() {
        let broker = Broker::new();
        let client = start_client(&broker, "lonely", "nobody-home", Duration::from_millis(100)).await;

        let err = client.call("list", object(json!({})), None).await.unwrap_err();
        assert!(matches!(err, CallError::TimedOut { .. }));
        assert!(err.is_outcome_unknown());
        assert_eq!(client.pending_count(), 0);
        assert_eq!(client.stats().timeouts, 1);
    }

    #[tokio::test]
    async fn test_services_on_one_broker_are_isolated() {
        let broker = Broker::new();
        let _a = start_service(&broker, "svc-a").await;
        let _b = start_service(&broker, "svc-b").await;
        let client_a = start_client(&broker, "caller-a", "svc-a", Duration::from_secs(5)).await;
        let client_b = start_client(&broker, "caller-b", "svc-b", Duration::from_secs(5)).await;

        client_a
            .call_checked(
                "add",
                object(json!({"instance_name": "only-in-a", "config_content": OPENVPN_CONFIG})),
                None,
            )
            .await
            .unwrap();

        let in_b = client_b.call("list", object(json!({})), None).await.unwrap();
        assert_eq!(in_b["count"], 0);
        let in_a = client_a.call("list", object(json!({})), None).await.unwrap();
        assert_eq!(in_a["count"], 1);
    }
}
