//! # Value Objects
//!
//! Validated scalars: identifiers, tunnel types, route destinations and
//! route protocols.

use super::errors::RegistryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// Longest accepted instance name or route id.
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Check an instance name or route id.
///
/// Non-empty, at most [`MAX_IDENTIFIER_LEN`] bytes, ASCII alphanumerics
/// plus `-`, `_` and `.`. Comparison elsewhere is case-sensitive.
pub fn validate_identifier(field: &'static str, value: &str) -> Result<(), RegistryError> {
    if value.is_empty() {
        return Err(RegistryError::MissingField { field });
    }
    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(RegistryError::invalid(
            field,
            format!("longer than {MAX_IDENTIFIER_LEN} characters"),
        ));
    }
    if let Some(c) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(RegistryError::invalid(
            field,
            format!("character {c:?} not allowed"),
        ));
    }
    Ok(())
}

/// Tunnel implementation behind an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VpnType {
    #[serde(rename = "openvpn")]
    OpenVpn,
    #[serde(rename = "wireguard")]
    WireGuard,
}

impl VpnType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenVpn => "openvpn",
            Self::WireGuard => "wireguard",
        }
    }

    /// Name as shown to people ("OpenVPN", "WireGuard").
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::OpenVpn => "OpenVPN",
            Self::WireGuard => "WireGuard",
        }
    }
}

impl fmt::Display for VpnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VpnType {
    type Err = RegistryError;

    /// Accepts either spelling, any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openvpn" => Ok(Self::OpenVpn),
            "wireguard" => Ok(Self::WireGuard),
            _ => Err(RegistryError::invalid(
                "vpn_type",
                format!("unsupported type '{s}' (expected openvpn or wireguard)"),
            )),
        }
    }
}

/// Traffic a route applies to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteProtocol {
    Tcp,
    Udp,
    #[default]
    Both,
}

impl FromStr for RouteProtocol {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            "both" | "any" | "all" => Ok(Self::Both),
            _ => Err(RegistryError::invalid(
                "protocol",
                format!("unsupported protocol '{s}' (expected tcp, udp or both)"),
            )),
        }
    }
}

/// Normalize a route destination to `addr/len`.
///
/// Accepts IPv4 `a.b.c.d/len` (0-32), IPv6 `addr/len` (0-128), or a bare
/// address, which becomes a host route.
pub fn normalize_destination(raw: &str) -> Result<String, RegistryError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(RegistryError::MissingField {
            field: "destination",
        });
    }

    let (addr, prefix) = match raw.split_once('/') {
        Some((addr, prefix)) => (addr, Some(prefix)),
        None => (raw, None),
    };

    let addr: IpAddr = addr
        .parse()
        .map_err(|_| RegistryError::invalid("destination", format!("'{raw}' is not an IP network")))?;
    let max = if addr.is_ipv4() { 32 } else { 128 };

    let len = match prefix {
        None => max,
        Some(p) => p
            .parse::<u8>()
            .ok()
            .filter(|len| *len <= max)
            .ok_or_else(|| {
                RegistryError::invalid("destination", format!("prefix length '{p}' out of range 0-{max}"))
            })?,
    };

    Ok(format!("{addr}/{len}"))
}

/// Prefix length of a dotted IPv4 netmask (`255.255.255.0` → 24).
///
/// `None` for non-contiguous masks.
pub fn netmask_prefix_len(mask: &str) -> Option<u8> {
    let mask: std::net::Ipv4Addr = mask.parse().ok()?;
    let bits = u32::from(mask);
    let len = bits.leading_ones();
    (bits.checked_shl(len).unwrap_or(0) == 0).then_some(len as u8)
}
