//! # Host Index
//!
//! Prefix/suffix-matching tries over normalized hosts.
//!
//! DNS names are matched by domain suffix (labels walked from the TLD
//! inward), IP networks by prefix bits. The three tries (DNS, IPv4, IPv6)
//! are arenas of nodes addressed by index, so there are no reference
//! cycles and no per-node allocation beyond the arena `Vec`s.
//!
//! Invariant: a node holds `Some(entries)` iff at least one entry was
//! registered exactly there. "Node present with an empty payload set" is
//! unrepresentable, so `lookup` returning `None` always means a miss.

use std::collections::{HashMap, HashSet};

use ipnetwork::IpNetwork;
use perimeter_common::entry::Entry;
use perimeter_common::host::Host;

pub type EntrySet = HashSet<Entry>;

#[derive(Debug, Default)]
struct DnsNode {
    children: HashMap<String, usize>,
    entries: Option<EntrySet>,
}

#[derive(Debug, Default)]
struct BitNode {
    // children[0] / children[1] follow the next prefix bit
    children: [Option<usize>; 2],
    entries: Option<EntrySet>,
}

/// Trie mapping registered hosts to the entries registered on them.
///
/// Insertion and lookup cost is proportional to label count (DNS) or
/// prefix length (IP), independent of how many hosts are registered.
#[derive(Debug)]
pub struct HostIndex {
    dns: Vec<DnsNode>,
    v4: Vec<BitNode>,
    v6: Vec<BitNode>,
}

impl HostIndex {
    pub fn new() -> Self {
        // index 0 is the root of each arena
        HostIndex {
            dns: vec![DnsNode::default()],
            v4: vec![BitNode::default()],
            v6: vec![BitNode::default()],
        }
    }

    /// Registers `entry` under `host`.
    ///
    /// If the node already exists its entry set is extended, never
    /// replaced: multiple distinct payloads may share a host.
    pub fn insert(&mut self, host: &Host, entry: Entry) {
        match host {
            Host::Dns(name) => {
                let mut node = 0;
                for label in name.split('.').rev() {
                    node = match self.dns[node].children.get(label).copied() {
                        Some(child) => child,
                        None => {
                            let child = self.dns.len();
                            self.dns.push(DnsNode::default());
                            self.dns[node].children.insert(label.to_string(), child);
                            child
                        }
                    };
                }
                self.dns[node]
                    .entries
                    .get_or_insert_with(EntrySet::new)
                    .insert(entry);
            }
            Host::Ip(net) => {
                let (bits, prefix) = network_path(net);
                let arena = match net {
                    IpNetwork::V4(_) => &mut self.v4,
                    IpNetwork::V6(_) => &mut self.v6,
                };
                let mut node = 0;
                for bit in prefix_bits(bits, prefix) {
                    node = match arena[node].children[bit] {
                        Some(child) => child,
                        None => {
                            let child = arena.len();
                            arena.push(BitNode::default());
                            arena[node].children[bit] = Some(child);
                            child
                        }
                    };
                }
                arena[node]
                    .entries
                    .get_or_insert_with(EntrySet::new)
                    .insert(entry);
            }
        }
    }

    /// Walks the path for `host`.
    ///
    /// Non-strict mode returns the deepest registered ancestor along the
    /// path (the most specific superdomain or supernet, the host itself
    /// included). Strict mode only matches the exact node.
    pub fn lookup(&self, host: &Host, strict: bool) -> Option<&EntrySet> {
        match host {
            Host::Dns(name) => {
                dns_ancestor(&self.dns, name, strict).and_then(|node| self.dns[node].entries.as_ref())
            }
            Host::Ip(net) => {
                let (bits, prefix) = network_path(net);
                let arena = match net {
                    IpNetwork::V4(_) => &self.v4,
                    IpNetwork::V6(_) => &self.v6,
                };
                bit_ancestor(arena, bits, prefix, strict)
                    .and_then(|node| arena[node].entries.as_ref())
            }
        }
    }

    /// ACL-style insert: when a registered entry already covers `host`
    /// (under the given strictness), `entry` joins that covering node's
    /// set instead of establishing a narrower node of its own. The entry
    /// stays reachable through iteration and ancestor lookups either
    /// way.
    ///
    /// Returns true when the entry was attached to a covering node.
    pub fn insert_covered(&mut self, host: &Host, entry: Entry, strict: bool) -> bool {
        match host {
            Host::Dns(name) => {
                if let Some(node) = dns_ancestor(&self.dns, name, strict) {
                    self.dns[node]
                        .entries
                        .get_or_insert_with(EntrySet::new)
                        .insert(entry);
                    return true;
                }
            }
            Host::Ip(net) => {
                let (bits, prefix) = network_path(net);
                let found = match net {
                    IpNetwork::V4(_) => bit_ancestor(&self.v4, bits, prefix, strict),
                    IpNetwork::V6(_) => bit_ancestor(&self.v6, bits, prefix, strict),
                };
                if let Some(node) = found {
                    let arena = match net {
                        IpNetwork::V4(_) => &mut self.v4,
                        IpNetwork::V6(_) => &mut self.v6,
                    };
                    arena[node]
                        .entries
                        .get_or_insert_with(EntrySet::new)
                        .insert(entry);
                    return true;
                }
            }
        }
        self.insert(host, entry);
        false
    }

    /// Iterates every registered entry, in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        let dns = self.dns.iter().filter_map(|n| n.entries.as_ref());
        let v4 = self.v4.iter().filter_map(|n| n.entries.as_ref());
        let v6 = self.v6.iter().filter_map(|n| n.entries.as_ref());
        dns.chain(v4).chain(v6).flatten()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

impl Default for HostIndex {
    fn default() -> Self {
        HostIndex::new()
    }
}

/// Walks `name` from the TLD inward and returns the deepest node that
/// carries entries. Strict mode only accepts the exact node.
fn dns_ancestor(arena: &[DnsNode], name: &str, strict: bool) -> Option<usize> {
    let mut node = 0;
    let mut best: Option<usize> = None;
    for label in name.split('.').rev() {
        match arena[node].children.get(label).copied() {
            Some(child) => {
                node = child;
                if arena[node].entries.is_some() {
                    best = Some(node);
                }
            }
            None => return if strict { None } else { best },
        }
    }
    if strict {
        arena[node].entries.is_some().then_some(node)
    } else {
        best
    }
}

/// Bit-trie counterpart of [`dns_ancestor`].
fn bit_ancestor(arena: &[BitNode], bits: u128, prefix: u8, strict: bool) -> Option<usize> {
    let mut node = 0;
    // a registered 0.0.0.0/0 or ::/0 lives on the root itself
    let mut best = arena[0].entries.is_some().then_some(0);
    for bit in prefix_bits(bits, prefix) {
        match arena[node].children[bit] {
            Some(child) => {
                node = child;
                if arena[node].entries.is_some() {
                    best = Some(node);
                }
            }
            None => return if strict { None } else { best },
        }
    }
    if strict {
        arena[node].entries.is_some().then_some(node)
    } else {
        best
    }
}

/// The network's address bits (left-aligned in a `u128`) and prefix length.
fn network_path(net: &IpNetwork) -> (u128, u8) {
    match net {
        IpNetwork::V4(v4) => {
            let bits = (u32::from(v4.network()) as u128) << 96;
            (bits, v4.prefix())
        }
        IpNetwork::V6(v6) => (u128::from(v6.network()), v6.prefix()),
    }
}

fn prefix_bits(bits: u128, prefix: u8) -> impl Iterator<Item = usize> {
    (0..prefix).map(move |i| ((bits >> (127 - u32::from(i))) & 1) as usize)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
