//! # Tunnel Configuration Profiles
//!
//! Detects whether a configuration is OpenVPN or WireGuard and extracts a
//! summary (server, port, transport protocol, device) plus the routes the
//! configuration itself pushes: OpenVPN `route`/`route-ipv6` directives and
//! WireGuard `AllowedIPs`.
//!
//! Parsing is lenient. Unknown directives are ignored, and a destination
//! that does not normalize is skipped rather than failing the whole config.

use super::errors::RegistryError;
use super::value_objects::{netmask_prefix_len, normalize_destination, VpnType};
use serde::{Deserialize, Serialize};

/// Summary of a tunnel configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigProfile {
    pub server: Option<String>,
    pub port: Option<u16>,
    /// Transport protocol (`udp`, `tcp`), OpenVPN only.
    pub protocol: Option<String>,
    /// Tunnel device (`tun`, `tap`), OpenVPN only.
    pub device: Option<String>,
    pub encryption: Option<String>,
    pub auth_method: Option<String>,
    /// Interface address, WireGuard only.
    pub address: Option<String>,
    /// Destinations routed through the tunnel by the config itself.
    pub routes: Vec<String>,
    /// The config sends all traffic through the tunnel.
    pub full_tunnel: bool,
}

/// Result of parsing a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedConfig {
    pub vpn_type: VpnType,
    pub profile: ConfigProfile,
}

/// Guess the tunnel type from config text.
pub fn detect_vpn_type(content: &str) -> Option<VpnType> {
    let lower = content.to_ascii_lowercase();

    if lower.contains("[interface]")
        || lower.contains("[peer]")
        || (lower.contains("privatekey") && lower.contains("publickey"))
    {
        return Some(VpnType::WireGuard);
    }

    let openvpn_directive = lower.lines().map(str::trim).any(|line| {
        ["remote ", "ca ", "cert ", "dev ", "proto "]
            .iter()
            .any(|d| line.starts_with(d))
    });
    if lower.lines().any(|l| l.trim() == "client") || openvpn_directive {
        return Some(VpnType::OpenVpn);
    }

    None
}

/// Parse `content` as `vpn_type`, or as the detected type when none is given.
pub fn parse_config(content: &str, vpn_type: Option<VpnType>) -> Result<ParsedConfig, RegistryError> {
    if content.trim().is_empty() {
        return Err(RegistryError::MissingField {
            field: "config_content",
        });
    }

    let vpn_type = match vpn_type {
        Some(t) => t,
        None => detect_vpn_type(content).ok_or_else(|| {
            RegistryError::invalid("config_content", "unsupported or unknown VPN protocol")
        })?,
    };

    let profile = match vpn_type {
        VpnType::OpenVpn => parse_openvpn(content),
        VpnType::WireGuard => parse_wireguard(content),
    };
    Ok(ParsedConfig { vpn_type, profile })
}

fn significant_lines(content: &str) -> impl Iterator<Item = &str> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with(';'))
}

fn parse_openvpn(content: &str) -> ConfigProfile {
    let mut profile = ConfigProfile::default();

    for line in significant_lines(content) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            ["remote", server, rest @ ..] => {
                profile.server = Some((*server).to_string());
                if let Some(port) = rest.first().and_then(|p| p.parse().ok()) {
                    profile.port = Some(port);
                }
                if let Some(proto) = rest.get(1) {
                    profile.protocol = Some((*proto).to_string());
                }
            }
            ["proto", proto, ..] => profile.protocol = Some((*proto).to_string()),
            ["port", port, ..] => profile.port = port.parse().ok().or(profile.port),
            ["dev", device, ..] => profile.device = Some((*device).to_string()),
            ["cipher", cipher, ..] | ["data-ciphers", cipher, ..] => {
                profile.encryption = Some((*cipher).to_string());
            }
            ["auth-user-pass", ..] => profile.auth_method = Some("user-pass".into()),
            ["tls-auth", ..] | ["tls-crypt", ..] => profile.auth_method = Some("TLS".into()),
            ["redirect-gateway", ..] => profile.full_tunnel = true,
            ["route", network, rest @ ..] => {
                let mask = rest.first().copied().filter(|m| *m != "default");
                let destination = match mask {
                    Some(mask) => netmask_prefix_len(mask).map(|len| format!("{network}/{len}")),
                    None => Some((*network).to_string()),
                };
                push_route(&mut profile, destination.as_deref());
            }
            ["route-ipv6", network, ..] => push_route(&mut profile, Some(*network)),
            _ => {}
        }
    }

    profile
}

fn parse_wireguard(content: &str) -> ConfigProfile {
    let mut profile = ConfigProfile {
        encryption: Some("ChaCha20-Poly1305".into()),
        ..ConfigProfile::default()
    };
    let mut section = String::new();

    for line in significant_lines(content) {
        if line.starts_with('[') && line.ends_with(']') {
            section = line[1..line.len() - 1].trim().to_ascii_lowercase();
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();

        match (section.as_str(), key.as_str()) {
            ("interface", "address") => profile.address = Some(value.to_string()),
            ("peer", "endpoint") => match value.rsplit_once(':') {
                Some((host, port)) if port.parse::<u16>().is_ok() => {
                    profile.server = Some(host.trim_matches(['[', ']']).to_string());
                    profile.port = port.parse().ok();
                }
                _ => profile.server = Some(value.to_string()),
            },
            ("peer", "allowedips") => {
                for ip in value.split(',').map(str::trim).filter(|ip| !ip.is_empty()) {
                    push_route(&mut profile, Some(ip));
                }
            }
            ("peer", "presharedkey") => profile.auth_method = Some("PSK".into()),
            _ => {}
        }
    }

    profile
}

fn push_route(profile: &mut ConfigProfile, destination: Option<&str>) {
    let Some(destination) = destination.and_then(|d| normalize_destination(d).ok()) else {
        return;
    };
    if destination == "0.0.0.0/0" || destination == "::/0" {
        profile.full_tunnel = true;
    }
    if !profile.routes.contains(&destination) {
        profile.routes.push(destination);
    }
}
