//! Client IP resolution.

use std::net::SocketAddr;

use crate::security::{is_private_ip, parse_ip};

/// Resolve the client address of a request.
///
/// With `trust_proxy` enabled the first valid, public address in
/// `X-Forwarded-For` wins. Otherwise, or when the header holds nothing
/// usable, the socket's remote address is used. Ports and IPv6 brackets
/// are stripped in both cases.
pub fn resolve_client_ip(
    remote_address: Option<&str>,
    forwarded_for: Option<&str>,
    trust_proxy: bool,
) -> Option<String> {
    if trust_proxy {
        if let Some(header) = forwarded_for {
            let forwarded = header
                .split(',')
                .filter_map(normalize_ip)
                .find(|ip| parse_ip(ip).map(|addr| !is_private_ip(addr)).unwrap_or(false));
            if forwarded.is_some() {
                return forwarded;
            }
        }
    }

    remote_address.and_then(normalize_ip)
}

/// Strip whitespace, brackets and ports. Returns `None` for anything that
/// is not an IP address.
fn normalize_ip(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Some(ip) = parse_ip(raw) {
        return Some(ip.to_string());
    }
    raw.parse::<SocketAddr>().ok().map(|addr| addr.ip().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_address_only() {
        assert_eq!(resolve_client_ip(Some("1.2.3.4"), None, true), Some("1.2.3.4".into()));
        assert_eq!(resolve_client_ip(Some("1.2.3.4:5050"), None, false), Some("1.2.3.4".into()));
        assert_eq!(resolve_client_ip(Some("[::1]:80"), None, false), Some("::1".into()));
        assert_eq!(resolve_client_ip(Some("garbage"), None, false), None);
        assert_eq!(resolve_client_ip(None, None, true), None);
    }

    #[test]
    fn test_forwarded_for_skips_private_and_invalid() {
        let header = "unknown, 10.0.0.1, 9.9.9.9:1234, 8.8.8.8";
        assert_eq!(
            resolve_client_ip(Some("127.0.0.1"), Some(header), true),
            Some("9.9.9.9".into())
        );
    }

    #[test]
    fn test_forwarded_for_ignored_without_trust() {
        assert_eq!(
            resolve_client_ip(Some("127.0.0.1"), Some("9.9.9.9"), false),
            Some("127.0.0.1".into())
        );
    }

    #[test]
    fn test_all_private_forwarded_falls_back_to_remote() {
        assert_eq!(
            resolve_client_ip(Some("5.5.5.5"), Some("10.0.0.1, 192.168.1.1"), true),
            Some("5.5.5.5".into())
        );
    }
}
