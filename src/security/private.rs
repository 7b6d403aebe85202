//! Private, loopback, link-local and documentation address ranges.
//!
//! These ranges are never treated as blocked, whatever the configured lists
//! contain.

use std::net::IpAddr;
use std::sync::OnceLock;

use super::ip_list::{parse_ip, MatchList};

const PRIVATE_IPV4_RANGES: &[&str] = &[
    "0.0.0.0/8",
    "10.0.0.0/8",
    "100.64.0.0/10",
    "127.0.0.0/8",
    "169.254.0.0/16",
    "172.16.0.0/12",
    "192.0.0.0/24",
    "192.0.2.0/24",
    "192.31.196.0/24",
    "192.52.193.0/24",
    "192.88.99.0/24",
    "192.168.0.0/16",
    "192.175.48.0/24",
    "198.18.0.0/15",
    "198.51.100.0/24",
    "203.0.113.0/24",
    "224.0.0.0/4",
    "240.0.0.0/4",
    "255.255.255.255/32",
];

const PRIVATE_IPV6_RANGES: &[&str] = &[
    "::/128",
    "::1/128",
    "fc00::/7",
    "fe80::/10",
    "2001:db8::/32",
];

fn private_ranges() -> &'static MatchList {
    static RANGES: OnceLock<MatchList> = OnceLock::new();
    RANGES.get_or_init(|| {
        MatchList::from_entries(PRIVATE_IPV4_RANGES.iter().chain(PRIVATE_IPV6_RANGES))
    })
}

/// Whether `ip` is a private or otherwise non-routable address.
pub fn is_private_ip(ip: IpAddr) -> bool {
    private_ranges().matches(ip)
}

/// Textual variant of [`is_private_ip`]. Unparseable input is not private.
pub fn is_private_ip_str(ip: &str) -> bool {
    parse_ip(ip).map(is_private_ip).unwrap_or(false)
}
