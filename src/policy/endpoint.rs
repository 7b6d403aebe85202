//! Per-endpoint protection policy.

use regex::{Regex, RegexBuilder};

use crate::cloud::types::EndpointConfig;
use crate::security::MatchList;

/// Rate limiting settings of an endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub enabled: bool,
    pub max_requests: u64,
    /// Window length in whole minutes (at least 1).
    pub window_size_minutes: usize,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            max_requests: 0,
            window_size_minutes: 1,
        }
    }
}

/// A compiled endpoint policy, immutable once part of a snapshot.
#[derive(Debug, Clone)]
pub struct EndpointPolicy {
    method: String,
    route: String,
    force_protection_off: bool,
    allowed_ips: MatchList,
    rate_limiting: RateLimitPolicy,
    wildcard: Option<Regex>,
}

impl EndpointPolicy {
    /// Create a policy for `method` (or `*`) and `route` with every
    /// protection setting at its default.
    pub fn new(method: impl Into<String>, route: impl Into<String>) -> Self {
        let route = route.into();
        let wildcard = compile_wildcard(&route);
        Self {
            method: method.into(),
            route,
            force_protection_off: false,
            allowed_ips: MatchList::new(),
            rate_limiting: RateLimitPolicy::default(),
            wildcard,
        }
    }

    /// Build from the control-plane representation.
    pub fn from_config(config: &EndpointConfig) -> Self {
        let window_ms = config.rate_limiting.window_size_in_ms;
        let window_minutes = ((window_ms / 60_000) as usize).max(1);

        Self::new(config.method.clone(), config.route.clone())
            .with_force_protection_off(config.force_protection_off)
            .with_allowed_ips(&config.allowed_ip_addresses)
            .with_rate_limiting(RateLimitPolicy {
                enabled: config.rate_limiting.enabled,
                max_requests: config.rate_limiting.max_requests,
                window_size_minutes: window_minutes,
            })
    }

    pub fn with_force_protection_off(mut self, off: bool) -> Self {
        self.force_protection_off = off;
        self
    }

    pub fn with_allowed_ips<I, S>(mut self, ips: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_ips = MatchList::from_entries(ips);
        self
    }

    pub fn with_rate_limiting(mut self, mut rate_limiting: RateLimitPolicy) -> Self {
        rate_limiting.window_size_minutes = rate_limiting.window_size_minutes.max(1);
        self.rate_limiting = rate_limiting;
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn is_any_method(&self) -> bool {
        self.method == "*"
    }

    pub fn force_protection_off(&self) -> bool {
        self.force_protection_off
    }

    pub fn allowed_ips(&self) -> &MatchList {
        &self.allowed_ips
    }

    pub fn rate_limiting(&self) -> &RateLimitPolicy {
        &self.rate_limiting
    }

    /// Number of `*` segments in the route.
    pub fn wildcard_count(&self) -> usize {
        self.route.matches('*').count()
    }

    pub(crate) fn wildcard_pattern(&self) -> Option<&Regex> {
        self.wildcard.as_ref()
    }
}

/// Compile `/api/*/items` into `^/api/(.*)/items/?$`, case-insensitive.
fn compile_wildcard(route: &str) -> Option<Regex> {
    if !route.contains('*') {
        return None;
    }

    let body = route
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join("(.*)");
    let pattern = format!("^{}/?$", body);

    match RegexBuilder::new(&pattern).case_insensitive(true).build() {
        Ok(regex) => Some(regex),
        Err(e) => {
            tracing::warn!(route = %route, error = %e, "Failed to compile wildcard route");
            None
        }
    }
}
