//! IP match lists backed by binary prefix tries.
//!
//! Supports both individual IPs and CIDR ranges:
//! - Individual IP: "192.168.1.1" (treated as /32 for IPv4, /128 for IPv6)
//! - CIDR range: "192.168.1.0/24", "10.0.0.0/8", "2001:db8::/32"
//!
//! Lookups walk at most 32 (IPv4) or 128 (IPv6) nodes regardless of how many
//! entries the list holds.

use std::net::IpAddr;
use std::str::FromStr;

use ipnet::IpNet;
use thiserror::Error;

/// Errors raised while building a match list.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IpListError {
    #[error("Invalid IP address or CIDR notation: {0}")]
    InvalidEntry(String),
}

#[derive(Debug, Clone, Default)]
struct TrieNode {
    children: [Option<u32>; 2],
    terminal: bool,
}

/// Binary trie over the leading bits of an address.
#[derive(Debug, Clone)]
struct PrefixTrie {
    width: u8,
    nodes: Vec<TrieNode>,
}

impl PrefixTrie {
    fn new(width: u8) -> Self {
        Self {
            width,
            nodes: vec![TrieNode::default()],
        }
    }

    fn bit(&self, addr: u128, index: u8) -> usize {
        ((addr >> (self.width - 1 - index)) & 1) as usize
    }

    fn insert(&mut self, addr: u128, prefix_len: u8) {
        let mut node = 0usize;
        for index in 0..prefix_len.min(self.width) {
            if self.nodes[node].terminal {
                // A shorter prefix already covers this range.
                return;
            }
            let bit = self.bit(addr, index);
            node = match self.nodes[node].children[bit] {
                Some(child) => child as usize,
                None => {
                    self.nodes.push(TrieNode::default());
                    let child = self.nodes.len() - 1;
                    self.nodes[node].children[bit] = Some(child as u32);
                    child
                }
            };
        }
        self.nodes[node].terminal = true;
        self.nodes[node].children = [None, None];
    }

    fn contains(&self, addr: u128) -> bool {
        let mut node = 0usize;
        for index in 0..self.width {
            if self.nodes[node].terminal {
                return true;
            }
            match self.nodes[node].children[self.bit(addr, index)] {
                Some(child) => node = child as usize,
                None => return false,
            }
        }
        self.nodes[node].terminal
    }
}

/// A set of IPv4 and IPv6 networks.
#[derive(Debug, Clone)]
pub struct MatchList {
    v4: PrefixTrie,
    v6: PrefixTrie,
    entries: usize,
}

impl Default for MatchList {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self {
            v4: PrefixTrie::new(32),
            v6: PrefixTrie::new(128),
            entries: 0,
        }
    }

    /// Build a list from IP/CIDR strings. Invalid entries are logged and skipped.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Self::new();
        for entry in entries {
            if let Err(e) = list.add(entry.as_ref()) {
                tracing::warn!(error = %e, "Skipping IP list entry");
            }
        }
        list
    }

    /// Add an IP or CIDR range.
    pub fn add(&mut self, ip_or_cidr: &str) -> Result<(), IpListError> {
        let network = parse_ip_or_cidr(ip_or_cidr.trim())?;
        match network {
            IpNet::V4(net) => self
                .v4
                .insert(u32::from(net.network()) as u128, net.prefix_len()),
            IpNet::V6(net) => self.v6.insert(u128::from(net.network()), net.prefix_len()),
        }
        self.entries += 1;
        Ok(())
    }

    /// Check whether `ip` falls inside any network of the list.
    ///
    /// IPv4-mapped IPv6 addresses (`::ffff:a.b.c.d`) are matched against the
    /// IPv4 entries as well.
    pub fn matches(&self, ip: IpAddr) -> bool {
        match ip {
            IpAddr::V4(v4) => self.v4.contains(u32::from(v4) as u128),
            IpAddr::V6(v6) => {
                if self.v6.contains(u128::from(v6)) {
                    return true;
                }
                match v6.to_ipv4_mapped() {
                    Some(v4) => self.v4.contains(u32::from(v4) as u128),
                    None => false,
                }
            }
        }
    }

    /// Like [`MatchList::matches`] for a textual address. Unparseable input
    /// never matches.
    pub fn matches_str(&self, ip: &str) -> bool {
        parse_ip(ip).map(|addr| self.matches(addr)).unwrap_or(false)
    }

    /// Number of entries added.
    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }
}

/// Parse a textual IP, tolerating IPv6 brackets.
pub fn parse_ip(ip: &str) -> Option<IpAddr> {
    let trimmed = ip.trim();
    let unbracketed = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(trimmed);
    IpAddr::from_str(unbracketed).ok()
}

fn parse_ip_or_cidr(input: &str) -> Result<IpNet, IpListError> {
    if let Ok(network) = IpNet::from_str(input) {
        return Ok(network.trunc());
    }

    match parse_ip(input) {
        Some(ip) => Ok(IpNet::from(ip)),
        None => Err(IpListError::InvalidEntry(input.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_ip() {
        let list = MatchList::from_entries(["192.168.1.1"]);
        assert!(list.matches_str("192.168.1.1"));
        assert!(!list.matches_str("192.168.1.2"));
    }

    #[test]
    fn test_cidr_range() {
        let list = MatchList::from_entries(["192.168.1.0/24"]);
        assert!(list.matches_str("192.168.1.1"));
        assert!(list.matches_str("192.168.1.255"));
        assert!(!list.matches_str("192.168.2.1"));
        assert!(!list.matches_str("10.0.0.1"));
    }

    #[test]
    fn test_unaligned_cidr_is_truncated() {
        let list = MatchList::from_entries(["10.1.2.3/8"]);
        assert!(list.matches_str("10.200.0.1"));
    }

    #[test]
    fn test_shorter_prefix_covers_longer() {
        let list = MatchList::from_entries(["10.0.0.5", "10.0.0.0/8"]);
        assert!(list.matches_str("10.9.9.9"));

        let list = MatchList::from_entries(["10.0.0.0/8", "10.0.0.5"]);
        assert!(list.matches_str("10.0.0.5"));
        assert!(list.matches_str("10.3.0.5"));
    }

    #[test]
    fn test_ipv6() {
        let list = MatchList::from_entries(["2001:db8::/32", "::1"]);
        assert!(list.matches_str("2001:db8::1"));
        assert!(list.matches_str("[::1]"));
        assert!(!list.matches_str("2001:db9::1"));
    }

    #[test]
    fn test_ipv4_mapped_ipv6() {
        let list = MatchList::from_entries(["203.0.113.0/24"]);
        assert!(list.matches_str("::ffff:203.0.113.7"));
    }

    #[test]
    fn test_match_all() {
        let list = MatchList::from_entries(["0.0.0.0/0"]);
        assert!(list.matches_str("8.8.8.8"));
        assert!(!list.matches_str("2001:db8::1"));
    }

    #[test]
    fn test_invalid_entries() {
        let mut list = MatchList::new();
        assert!(list.add("invalid").is_err());
        assert!(list.add("192.168.1.0/33").is_err());
        assert!(list.is_empty());

        let list = MatchList::from_entries(["bogus", "1.2.3.4"]);
        assert_eq!(list.len(), 1);
        assert!(!list.matches_str("not an ip"));
    }
}
