//! Control-plane wire types.
//!
//! All payloads are camelCase JSON. Every field has a default so a partial
//! or older response still decodes.

use serde::{Deserialize, Serialize};

/// Full runtime configuration returned by the config endpoint and by
/// event acknowledgements.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CloudConfig {
    pub success: bool,
    pub service_id: u64,
    /// Version of the configuration, in milliseconds since the epoch.
    pub config_updated_at: i64,
    #[serde(rename = "heartbeatIntervalInMS")]
    pub heartbeat_interval_in_ms: u64,
    pub endpoints: Vec<EndpointConfig>,
    #[serde(rename = "blockedUserIds")]
    pub blocked_user_ids: Vec<String>,
    /// Addresses that bypass every check.
    #[serde(rename = "allowedIPAddresses")]
    pub allowed_ip_addresses: Vec<String>,
    pub received_any_stats: bool,
    pub block: Option<bool>,
}

/// Response of the lightweight version endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigVersion {
    pub config_updated_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EndpointConfig {
    pub method: String,
    pub route: String,
    pub force_protection_off: bool,
    #[serde(rename = "allowedIPAddresses")]
    pub allowed_ip_addresses: Vec<String>,
    pub rate_limiting: RateLimitingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RateLimitingConfig {
    pub enabled: bool,
    pub max_requests: u64,
    #[serde(rename = "windowSizeInMS")]
    pub window_size_in_ms: u64,
}

/// Blocklists served by the firewall endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FirewallLists {
    #[serde(rename = "blockedIPAddresses")]
    pub blocked_ip_addresses: Vec<IpBlocklist>,
    /// Regex alternation of bot user agents; empty means none.
    pub blocked_user_agents: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct IpBlocklist {
    pub source: String,
    pub description: String,
    pub ips: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_config() {
        let json = r#"{
            "success": true,
            "serviceId": 7,
            "configUpdatedAt": 1700000000000,
            "heartbeatIntervalInMS": 600000,
            "endpoints": [{
                "method": "POST",
                "route": "/login",
                "forceProtectionOff": false,
                "allowedIPAddresses": [],
                "rateLimiting": { "enabled": true, "maxRequests": 10, "windowSizeInMS": 60000 }
            }],
            "blockedUserIds": ["u1"],
            "allowedIPAddresses": ["5.6.7.8"],
            "receivedAnyStats": true,
            "block": true
        }"#;

        let config: CloudConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.config_updated_at, 1_700_000_000_000);
        assert_eq!(config.endpoints.len(), 1);
        assert_eq!(config.endpoints[0].rate_limiting.max_requests, 10);
        assert_eq!(config.endpoints[0].rate_limiting.window_size_in_ms, 60_000);
        assert_eq!(config.blocked_user_ids, vec!["u1".to_string()]);
        assert_eq!(config.allowed_ip_addresses, vec!["5.6.7.8".to_string()]);
        assert_eq!(config.block, Some(true));
        assert!(config.received_any_stats);
    }

    #[test]
    fn test_partial_payload_uses_defaults() {
        let config: CloudConfig = serde_json::from_str(r#"{"configUpdatedAt": 5}"#).unwrap();
        assert_eq!(config.config_updated_at, 5);
        assert!(config.endpoints.is_empty());
        assert_eq!(config.block, None);
    }

    #[test]
    fn test_decode_firewall_lists() {
        let json = r#"{
            "blockedIPAddresses": [
                { "source": "geoip", "description": "geo restrictions", "ips": ["1.2.3.0/24"] }
            ],
            "blockedUserAgents": "AI2Bot|Bytespider"
        }"#;

        let lists: FirewallLists = serde_json::from_str(json).unwrap();
        assert_eq!(lists.blocked_ip_addresses[0].description, "geo restrictions");
        assert_eq!(lists.blocked_user_agents, "AI2Bot|Bytespider");
    }
}
