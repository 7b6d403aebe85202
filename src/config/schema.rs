//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the agent.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::input::ExtractLimits;

/// Root configuration for the protection agent.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    /// Control-plane connection.
    pub cloud: ControlPlaneConfig,

    /// Request protection behavior.
    pub protection: ProtectionConfig,

    /// Limits on what is collected and reported.
    pub reporting: ReportingConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Control-plane connection settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ControlPlaneConfig {
    /// API token. Without it the agent runs locally and reports nothing.
    pub token: Option<String>,

    /// Base URL of the API (config, firewall lists, events).
    pub endpoint: String,

    /// Base URL of the lightweight config-version endpoint.
    pub realtime_endpoint: String,

    /// How often to ask whether a newer configuration exists.
    pub poll_interval_secs: u64,

    /// Heartbeat interval until stats have been sent once.
    pub initial_heartbeat_secs: u64,

    /// Smallest heartbeat interval accepted from the control plane.
    pub heartbeat_floor_secs: u64,

    /// Per-request timeout for control-plane calls.
    pub timeout_secs: u64,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            token: None,
            endpoint: "http://localhost:8787".to_string(),
            realtime_endpoint: "http://localhost:8787".to_string(),
            poll_interval_secs: 60,
            initial_heartbeat_secs: 60,
            heartbeat_floor_secs: 120,
            timeout_secs: 10,
        }
    }
}

/// Periods are at least one second; a zero would spin the timers.
fn seconds(secs: u64) -> Duration {
    Duration::from_secs(secs.max(1))
}

impl ControlPlaneConfig {
    pub fn poll_interval(&self) -> Duration {
        seconds(self.poll_interval_secs)
    }

    pub fn initial_heartbeat(&self) -> Duration {
        seconds(self.initial_heartbeat_secs)
    }

    pub fn heartbeat_floor(&self) -> Duration {
        seconds(self.heartbeat_floor_secs)
    }

    pub fn timeout(&self) -> Duration {
        seconds(self.timeout_secs)
    }
}

/// Request protection settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ProtectionConfig {
    /// Turn the agent off entirely.
    pub disable: bool,

    /// Force blocking on or off. `None` follows the control plane.
    pub block: Option<bool>,

    /// Honor `X-Forwarded-For` when resolving the client IP.
    pub trust_proxy: bool,

    /// Deepest nesting level visited when extracting user input.
    pub max_extract_depth: usize,

    /// Maximum strings extracted per request source.
    pub max_extract_entries: usize,

    /// Period of the rate limiter window advance.
    pub rate_limit_tick_secs: u64,
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self {
            disable: false,
            block: None,
            trust_proxy: true,
            max_extract_depth: 20,
            max_extract_entries: 5_000,
            rate_limit_tick_secs: 60,
        }
    }
}

impl ProtectionConfig {
    pub fn extract_limits(&self) -> ExtractLimits {
        ExtractLimits {
            max_depth: self.max_extract_depth,
            max_entries: self.max_extract_entries,
        }
    }

    pub fn rate_limit_tick(&self) -> Duration {
        seconds(self.rate_limit_tick_secs)
    }
}

/// Reporting limits.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ReportingConfig {
    /// Attack events sent per window; further events are dropped.
    pub max_attack_events: usize,

    /// Length of the attack event window.
    pub attack_window_secs: u64,

    /// Users tracked between heartbeats.
    pub max_users: usize,

    /// Outbound hostnames tracked between heartbeats.
    pub max_hostnames: usize,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            max_attack_events: 100,
            attack_window_secs: 3600,
            max_users: 1000,
            max_hostnames: 2000,
        }
    }
}

impl ReportingConfig {
    pub fn attack_window(&self) -> Duration {
        seconds(self.attack_window_secs)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level used when `RUST_LOG` is not set.
    pub log_level: String,

    /// Record counters through the metrics facade.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: AgentConfig = toml::from_str("").unwrap();
        assert_eq!(config, AgentConfig::default());
        assert_eq!(config.cloud.poll_interval(), Duration::from_secs(60));
        assert_eq!(config.reporting.max_attack_events, 100);
        assert!(config.protection.trust_proxy);
        assert_eq!(config.protection.block, None);
    }

    #[test]
    fn test_partial_sections() {
        let config: AgentConfig = toml::from_str(
            r#"
            [cloud]
            token = "secret"
            heartbeat_floor_secs = 300

            [protection]
            block = true
            max_extract_depth = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.cloud.token.as_deref(), Some("secret"));
        assert_eq!(config.cloud.heartbeat_floor(), Duration::from_secs(300));
        assert_eq!(config.cloud.timeout_secs, 10);
        assert_eq!(config.protection.block, Some(true));
        assert_eq!(config.protection.extract_limits().max_depth, 8);
        assert_eq!(config.protection.extract_limits().max_entries, 5_000);
    }

    #[test]
    fn test_zero_periods_are_clamped() {
        let config: AgentConfig = toml::from_str(
            r#"
            [cloud]
            poll_interval_secs = 0
            initial_heartbeat_secs = 0
            heartbeat_floor_secs = 0

            [protection]
            rate_limit_tick_secs = 0

            [reporting]
            attack_window_secs = 0
            "#,
        )
        .unwrap();

        let one = Duration::from_secs(1);
        assert_eq!(config.cloud.poll_interval(), one);
        assert_eq!(config.cloud.initial_heartbeat(), one);
        assert_eq!(config.cloud.heartbeat_floor(), one);
        assert_eq!(config.protection.rate_limit_tick(), one);
        assert_eq!(config.reporting.attack_window(), one);
    }
}
