//! # Routing Rules
//!
//! A [`RouteRule`] lives either in the global custom-route table or in one
//! instance's route collection. Rules are created from a [`RouteDraft`]
//! and changed through a [`RoutePatch`], which only touches the fields it
//! carries.

use super::errors::RegistryError;
use super::value_objects::{normalize_destination, validate_identifier, RouteProtocol};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Priority given to rules that do not name one.
pub const DEFAULT_ROUTE_PRIORITY: u32 = 100;

/// Gateway recorded on global rules that do not name one.
pub const DEFAULT_GLOBAL_GATEWAY: &str = "VPN Server";

/// Table a rule belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RouteScope {
    Global,
    Instance { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRule {
    pub id: String,
    pub name: String,
    /// Normalized `addr/len`.
    pub destination: String,
    pub gateway: String,
    pub priority: u32,
    pub protocol: RouteProtocol,
    pub enabled: bool,
    pub description: String,
    /// Instance the rule is meant for. Global rules only; a hint, never
    /// enforced or cascaded.
    pub vpn_instance: Option<String>,
    pub is_automatic: bool,
    /// Handed to the tunnel driver by the last apply.
    pub applied: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub scope: RouteScope,
}

/// Fields for a new rule. Everything but `id` and `destination` defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RouteDraft {
    pub id: String,
    pub name: Option<String>,
    pub destination: String,
    pub gateway: Option<String>,
    #[serde(alias = "metric")]
    pub priority: Option<u32>,
    pub protocol: Option<String>,
    pub enabled: Option<bool>,
    pub description: Option<String>,
    pub vpn_instance: Option<String>,
    pub is_automatic: bool,
}

impl RouteDraft {
    pub fn new(id: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            destination: destination.into(),
            ..Self::default()
        }
    }

    /// Validate and build the rule for `scope`.
    pub fn into_rule(self, scope: RouteScope) -> Result<RouteRule, RegistryError> {
        validate_identifier("id", &self.id)?;
        let destination = normalize_destination(&self.destination)?;
        let protocol = self
            .protocol
            .as_deref()
            .map(str::parse::<RouteProtocol>)
            .transpose()?
            .unwrap_or_default();

        let vpn_instance = match scope {
            RouteScope::Global => self.vpn_instance.filter(|v| !v.is_empty()),
            RouteScope::Instance { .. } => None,
        };
        if let Some(instance) = &vpn_instance {
            validate_identifier("vpn_instance", instance)?;
        }

        let gateway = self.gateway.unwrap_or_else(|| match scope {
            RouteScope::Global => DEFAULT_GLOBAL_GATEWAY.to_string(),
            RouteScope::Instance { .. } => String::new(),
        });

        let now = Utc::now();
        Ok(RouteRule {
            name: self.name.unwrap_or_else(|| self.id.clone()),
            id: self.id,
            destination,
            gateway,
            priority: self.priority.unwrap_or(DEFAULT_ROUTE_PRIORITY),
            protocol,
            enabled: self.enabled.unwrap_or(true),
            description: self.description.unwrap_or_default(),
            vpn_instance,
            is_automatic: self.is_automatic,
            applied: false,
            created_at: now,
            updated_at: now,
            scope,
        })
    }
}

/// Partial update. `None` leaves the field as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RoutePatch {
    pub name: Option<String>,
    pub destination: Option<String>,
    pub gateway: Option<String>,
    #[serde(alias = "metric")]
    pub priority: Option<u32>,
    pub protocol: Option<String>,
    pub enabled: Option<bool>,
    pub description: Option<String>,
    pub vpn_instance: Option<String>,
}

impl RoutePatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl RouteRule {
    /// Merge `patch` into a copy of this rule.
    ///
    /// Validates everything before producing the copy, so a bad field
    /// leaves the caller's rule untouched.
    pub fn patched(&self, patch: RoutePatch) -> Result<Self, RegistryError> {
        let destination = patch
            .destination
            .as_deref()
            .map(normalize_destination)
            .transpose()?;
        let protocol = patch.protocol.as_deref().map(str::parse::<RouteProtocol>).transpose()?;
        if let Some(instance) = patch.vpn_instance.as_deref().filter(|v| !v.is_empty()) {
            validate_identifier("vpn_instance", instance)?;
        }

        let mut rule = self.clone();
        if let Some(name) = patch.name {
            rule.name = name;
        }
        if let Some(destination) = destination {
            if destination != rule.destination {
                rule.applied = false;
            }
            rule.destination = destination;
        }
        if let Some(gateway) = patch.gateway {
            rule.gateway = gateway;
        }
        if let Some(priority) = patch.priority {
            rule.priority = priority;
        }
        if let Some(protocol) = protocol {
            rule.protocol = protocol;
        }
        if let Some(enabled) = patch.enabled {
            rule.enabled = enabled;
        }
        if let Some(description) = patch.description {
            rule.description = description;
        }
        if let (RouteScope::Global, Some(instance)) = (&rule.scope, patch.vpn_instance) {
            rule.vpn_instance = Some(instance).filter(|v| !v.is_empty());
        }
        rule.updated_at = Utc::now();
        Ok(rule)
    }
}
