//! # Topic Names and Filters
//!
//! MQTT rules: levels are separated by `/`; `+` matches exactly one level,
//! `#` matches the remaining levels (including none) and must be last.
//! Topics starting with `$` are never matched by a leading wildcard.

use crate::transport::TransportError;

/// Validate a concrete topic used for publishing.
pub fn validate_topic(topic: &str) -> Result<(), TransportError> {
    if topic.is_empty() {
        return Err(invalid(topic, "topic is empty"));
    }
    if topic.contains(['+', '#']) {
        return Err(invalid(topic, "wildcards are not allowed when publishing"));
    }
    if topic.contains('\0') {
        return Err(invalid(topic, "topic contains NUL"));
    }
    Ok(())
}

fn invalid(topic: &str, reason: &str) -> TransportError {
    TransportError::InvalidTopic {
        topic: topic.to_string(),
        reason: reason.to_string(),
    }
}

/// A validated subscription filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicFilter(String);

impl TopicFilter {
    pub fn new(filter: &str) -> Result<Self, TransportError> {
        if filter.is_empty() {
            return Err(invalid(filter, "filter is empty"));
        }
        let levels: Vec<&str> = filter.split('/').collect();
        for (index, level) in levels.iter().enumerate() {
            if level.contains('#') && (*level != "#" || index + 1 != levels.len()) {
                return Err(invalid(filter, "'#' must be the whole last level"));
            }
            if level.contains('+') && *level != "+" {
                return Err(invalid(filter, "'+' must be a whole level"));
            }
        }
        Ok(Self(filter.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn matches(&self, topic: &str) -> bool {
        if topic.starts_with('$') && (self.0.starts_with('+') || self.0.starts_with('#')) {
            return false;
        }

        let mut filter_levels = self.0.split('/');
        let mut topic_levels = topic.split('/');
        loop {
            match (filter_levels.next(), topic_levels.next()) {
                (Some("#"), _) => return true,
                (Some("+"), Some(_)) => {}
                (Some(f), Some(t)) if f == t => {}
                (None, None) => return true,
                _ => return false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(f: &str) -> TopicFilter {
        TopicFilter::new(f).unwrap()
    }

    #[test]
    fn test_exact_match() {
        let f = filter("direct_messaging/ur-vpn-manager/responses");
        assert!(f.matches("direct_messaging/ur-vpn-manager/responses"));
        assert!(!f.matches("direct_messaging/ur-vpn-manager/requests"));
        assert!(!f.matches("direct_messaging/ur-vpn-manager"));
    }

    #[test]
    fn test_single_level_wildcard() {
        let f = filter("direct_messaging/+/responses");
        assert!(f.matches("direct_messaging/a/responses"));
        assert!(!f.matches("direct_messaging/a/b/responses"));
        assert!(!f.matches("direct_messaging/responses"));
    }

    #[test]
    fn test_multi_level_wildcard() {
        let f = filter("clients/#");
        assert!(f.matches("clients/ur-vpn-manager/heartbeat"));
        assert!(f.matches("clients"));
        assert!(!f.matches("direct_messaging/x"));
        assert!(filter("#").matches("anything/at/all"));
    }

    #[test]
    fn test_system_topics_hidden_from_wildcards() {
        assert!(!filter("#").matches("$SYS/uptime"));
        assert!(filter("$SYS/#").matches("$SYS/uptime"));
    }

    #[test]
    fn test_invalid_filters() {
        assert!(TopicFilter::new("").is_err());
        assert!(TopicFilter::new("a/#/b").is_err());
        assert!(TopicFilter::new("a/b#").is_err());
        assert!(TopicFilter::new("a/+b").is_err());
    }

    #[test]
    fn test_publish_topic_validation() {
        assert!(validate_topic("a/b").is_ok());
        assert!(validate_topic("a/+").is_err());
        assert!(validate_topic("").is_err());
    }
}
