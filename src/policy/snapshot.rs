//! Immutable policy snapshot.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use regex::{Regex, RegexBuilder};

use crate::cloud::types::{CloudConfig, FirewallLists};
use crate::policy::EndpointPolicy;
use crate::routing::match_endpoints;
use crate::security::{is_private_ip_str, MatchList};

/// A blocklist together with where it came from.
#[derive(Debug, Clone)]
pub struct NamedMatchList {
    pub source: String,
    pub description: String,
    pub list: MatchList,
}

/// One complete, versioned view of the protection policy.
///
/// Snapshots are never mutated after installation. Readers hold an `Arc`
/// to a whole snapshot, so they never observe a mix of two versions.
#[derive(Debug, Clone, Default)]
pub struct PolicySnapshot {
    /// `configUpdatedAt` of the control-plane configuration.
    pub version: i64,
    pub endpoints: Vec<EndpointPolicy>,
    pub blocked_user_ids: HashSet<String>,
    pub bypassed_ips: MatchList,
    pub blocked_ip_lists: Arc<Vec<NamedMatchList>>,
    pub blocked_user_agents: Option<Regex>,
    /// Global blocking mode. `false` means detect and report only.
    pub block: bool,
    /// Heartbeat interval suggested by the control plane.
    pub heartbeat_interval: Option<Duration>,
    pub received_any_stats: bool,
}

impl PolicySnapshot {
    /// The snapshot in force before any configuration arrives.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a snapshot from a control-plane configuration.
    ///
    /// When `lists` is `None` (the firewall list fetch failed) the blocklists
    /// and user-agent pattern of `previous` are carried over.
    pub fn from_cloud(
        config: &CloudConfig,
        lists: Option<&FirewallLists>,
        previous: &PolicySnapshot,
    ) -> Self {
        let (blocked_ip_lists, blocked_user_agents) = match lists {
            Some(lists) => {
                let named = lists
                    .blocked_ip_addresses
                    .iter()
                    .map(|entry| NamedMatchList {
                        source: entry.source.clone(),
                        description: entry.description.clone(),
                        list: MatchList::from_entries(&entry.ips),
                    })
                    .collect::<Vec<_>>();
                (
                    Arc::new(named),
                    compile_user_agent_pattern(&lists.blocked_user_agents),
                )
            }
            None => (
                Arc::clone(&previous.blocked_ip_lists),
                previous.blocked_user_agents.clone(),
            ),
        };

        let heartbeat_interval = match config.heartbeat_interval_in_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };

        Self {
            version: config.config_updated_at,
            endpoints: config.endpoints.iter().map(EndpointPolicy::from_config).collect(),
            blocked_user_ids: config.blocked_user_ids.iter().cloned().collect(),
            bypassed_ips: MatchList::from_entries(&config.allowed_ip_addresses),
            blocked_ip_lists,
            blocked_user_agents,
            block: config.block.unwrap_or(false),
            heartbeat_interval,
            received_any_stats: config.received_any_stats,
        }
    }

    /// Description of the first blocklist containing `ip`.
    ///
    /// Private and loopback addresses are never blocked.
    pub fn ip_block_reason(&self, ip: &str) -> Option<&str> {
        if is_private_ip_str(ip) {
            return None;
        }
        self.blocked_ip_lists
            .iter()
            .find(|named| named.list.matches_str(ip))
            .map(|named| named.description.as_str())
    }

    pub fn is_ip_blocked(&self, ip: &str) -> bool {
        self.ip_block_reason(ip).is_some()
    }

    pub fn is_ip_bypassed(&self, ip: &str) -> bool {
        self.bypassed_ips.matches_str(ip)
    }

    pub fn is_user_agent_blocked(&self, user_agent: &str) -> bool {
        if user_agent.is_empty() {
            return false;
        }
        self.blocked_user_agents
            .as_ref()
            .map(|pattern| pattern.is_match(user_agent))
            .unwrap_or(false)
    }

    pub fn is_user_blocked(&self, user_id: &str) -> bool {
        self.blocked_user_ids.contains(user_id)
    }

    /// Endpoint policies matching the request, most specific first.
    pub fn matching_endpoints(&self, method: &str, route: &str) -> Vec<&EndpointPolicy> {
        match_endpoints(&self.endpoints, method, route)
    }

    /// Whether any matching endpoint turns protection off.
    pub fn protection_forced_off(&self, method: &str, route: &str) -> bool {
        self.matching_endpoints(method, route)
            .iter()
            .any(|endpoint| endpoint.force_protection_off())
    }
}

fn compile_user_agent_pattern(pattern: &str) -> Option<Regex> {
    if pattern.trim().is_empty() {
        return None;
    }
    match RegexBuilder::new(pattern).case_insensitive(true).build() {
        Ok(regex) => Some(regex),
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring invalid blocked user agent pattern");
            None
        }
    }
}
