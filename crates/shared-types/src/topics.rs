//! Topic naming for one logical service on the broker.

/// Request, response and heartbeat topics of a service.
///
/// Several services share one broker by using distinct service names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceTopics {
    pub service: String,
    pub requests: String,
    pub responses: String,
    pub heartbeat: String,
}

impl ServiceTopics {
    pub fn for_service(service: &str) -> Self {
        Self {
            service: service.to_string(),
            requests: format!("direct_messaging/{service}/requests"),
            responses: format!("direct_messaging/{service}/responses"),
            heartbeat: format!("clients/{service}/heartbeat"),
        }
    }
}

impl Default for ServiceTopics {
    fn default() -> Self {
        Self::for_service(crate::DEFAULT_SERVICE_NAME)
    }
}
