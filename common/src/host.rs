//! # Host Model
//!
//! Normalized representation of anything the scope engine can match on.
//!
//! This module handles parsing and normalizing hosts, which can be:
//! * A DNS name (e.g., `www.Example.COM.` → `www.example.com`).
//! * A single IP address, stored as a full-prefix network (`/32` or `/128`).
//! * A CIDR block (e.g., `10.0.0.1/8` → `10.0.0.0/8`, host bits masked off).
//!
//! It also extracts the host part from composite identifiers such as URLs,
//! email addresses, and `host:port` pairs.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use ipnetwork::{IpNetwork, Ipv4Network, Ipv6Network};

use crate::error::{Result, ScopeError};

/// A normalized host: either a DNS name or an IP network.
///
/// Single IP addresses are represented as full-prefix networks so that
/// address and CIDR matching share one code path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Host {
    Dns(String),
    Ip(IpNetwork),
}

impl Host {
    /// Parses a bare host string: IP address, CIDR block, or DNS name.
    ///
    /// Composite identifiers (URLs, emails) must be reduced to their host
    /// part first; see [`extract_host`].
    pub fn parse(s: &str) -> Result<Host> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ScopeError::validation(s, "empty host"));
        }

        if let Ok(addr) = s.parse::<IpAddr>() {
            return single_ip(addr);
        }

        if s.contains('/') {
            return parse_cidr(s);
        }

        parse_dns(s).map(Host::Dns)
    }

    pub fn is_dns(&self) -> bool {
        matches!(self, Host::Dns(_))
    }

    /// The network, if this host is an IP or CIDR.
    pub fn network(&self) -> Option<IpNetwork> {
        match self {
            Host::Dns(_) => None,
            Host::Ip(net) => Some(*net),
        }
    }

    /// True for networks that cover exactly one address.
    pub fn is_single_address(&self) -> bool {
        match self {
            Host::Dns(_) => false,
            Host::Ip(net) => net.prefix() == max_prefix(net),
        }
    }

    /// Ordering key for address-space breadth.
    ///
    /// Networks sort before DNS names; broader networks (more free host
    /// bits, IPv6 space counted at its real size) before narrower ones;
    /// shorter DNS names before longer. Used to insert the most general
    /// targets first so trie shape is independent of input order.
    pub fn size_key(&self) -> HostSizeKey {
        match self {
            Host::Ip(net) => {
                let free_bits = u16::from(max_prefix(net) - net.prefix());
                HostSizeKey {
                    family: 0,
                    specificity: 128 - free_bits,
                    tiebreak: self.to_string(),
                }
            }
            Host::Dns(name) => HostSizeKey {
                family: 1,
                specificity: name.len() as u16,
                tiebreak: name.clone(),
            },
        }
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Host::Dns(name) => write!(f, "{name}"),
            Host::Ip(net) if self.is_single_address() => write!(f, "{}", net.ip()),
            Host::Ip(net) => write!(f, "{net}"),
        }
    }
}

impl FromStr for Host {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self> {
        Host::parse(s)
    }
}

/// Comparison key returned by [`Host::size_key`]. Total order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct HostSizeKey {
    family: u8,
    specificity: u16,
    tiebreak: String,
}

fn max_prefix(net: &IpNetwork) -> u8 {
    match net {
        IpNetwork::V4(_) => 32,
        IpNetwork::V6(_) => 128,
    }
}

fn single_ip(addr: IpAddr) -> Result<Host> {
    let net = match addr {
        IpAddr::V4(v4) => IpNetwork::V4(
            Ipv4Network::new(v4, 32)
                .map_err(|e| ScopeError::validation(v4.to_string(), e.to_string()))?,
        ),
        IpAddr::V6(v6) => IpNetwork::V6(
            Ipv6Network::new(v6, 128)
                .map_err(|e| ScopeError::validation(v6.to_string(), e.to_string()))?,
        ),
    };
    Ok(Host::Ip(net))
}

/// Parses CIDR notation and masks the host bits off, so `10.0.0.1/8`
/// and `10.0.0.0/8` normalize to the same network.
fn parse_cidr(s: &str) -> Result<Host> {
    let net = s
        .parse::<IpNetwork>()
        .map_err(|e| ScopeError::validation(s, e.to_string()))?;

    let masked = match net {
        IpNetwork::V4(v4) => IpNetwork::V4(
            Ipv4Network::new(v4.network(), v4.prefix())
                .map_err(|e| ScopeError::validation(s, e.to_string()))?,
        ),
        IpNetwork::V6(v6) => IpNetwork::V6(
            Ipv6Network::new(v6.network(), v6.prefix())
                .map_err(|e| ScopeError::validation(s, e.to_string()))?,
        ),
    };
    Ok(Host::Ip(masked))
}

/// Validates and normalizes a DNS name: lowercase, trailing dot stripped.
///
/// Labels are 1-63 characters of `[a-z0-9_-]`; a leading wildcard label
/// (`*`) is tolerated as a literal since recon data sources emit them.
fn parse_dns(s: &str) -> Result<String> {
    let name = s.trim_end_matches('.').to_ascii_lowercase();
    if name.is_empty() {
        return Err(ScopeError::validation(s, "empty DNS name"));
    }
    if name.len() > 253 {
        return Err(ScopeError::validation(s, "DNS name longer than 253 characters"));
    }
    for label in name.split('.') {
        if label.is_empty() {
            return Err(ScopeError::validation(s, "empty DNS label"));
        }
        if label.len() > 63 {
            return Err(ScopeError::validation(s, "DNS label longer than 63 characters"));
        }
        let valid = label == "*"
            || label
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(ScopeError::validation(
                s,
                format!("invalid character in DNS label {label:?}"),
            ));
        }
    }
    Ok(name)
}

/// The shape of a raw identifier, decided during host extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierShape {
    /// A bare host, possibly with a port.
    Plain,
    /// `scheme://[user@]host[:port][/path]`.
    Url,
    /// `user@host`.
    Email,
}

/// Reduces a composite identifier to its host part.
///
/// Returns the substring that should be fed to [`Host::parse`] plus the
/// detected shape. Never fails by itself; an identifier with no usable
/// host fails later, in host parsing.
pub fn extract_host(raw: &str) -> (&str, IdentifierShape) {
    if let Some((scheme, rest)) = raw.split_once("://") {
        if !scheme.is_empty() && scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+') {
            let authority = rest
                .split(['/', '?', '#'])
                .next()
                .unwrap_or(rest);
            let host = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
            return (strip_port(host), IdentifierShape::Url);
        }
    }

    if raw.contains('@') && !raw.contains('/') {
        let host = raw.rsplit_once('@').map_or(raw, |(_, h)| h);
        return (strip_port(host), IdentifierShape::Email);
    }

    (strip_port(raw), IdentifierShape::Plain)
}

/// Strips a trailing `:port` and IPv6 brackets.
///
/// `::1` stays intact: a port is only recognized when the remainder
/// contains no further colon.
fn strip_port(s: &str) -> &str {
    if let Some(rest) = s.strip_prefix('[') {
        if let Some((inner, _)) = rest.split_once(']') {
            return inner;
        }
    }
    if let Some((host, port)) = s.rsplit_once(':') {
        if !host.is_empty()
            && !host.contains(':')
            && !port.is_empty()
            && port.bytes().all(|b| b.is_ascii_digit())
        {
            return host;
        }
    }
    s
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
