//! Sliding-window request counters per endpoint and entity.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time;

use crate::policy::EndpointPolicy;

/// Which entity tripped a rate limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitTrigger {
    User,
    Ip,
    Group,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RateLimitStatus {
    pub block: bool,
    pub trigger: Option<RateLimitTrigger>,
}

/// Request count over the last `window` minutes.
#[derive(Debug, Clone)]
struct Counts {
    total: u64,
    buckets: VecDeque<u64>,
}

impl Counts {
    fn new() -> Self {
        let mut buckets = VecDeque::new();
        buckets.push_back(0);
        Self { total: 0, buckets }
    }

    fn increment(&mut self) {
        self.total += 1;
        match self.buckets.back_mut() {
            Some(current) => *current += 1,
            None => self.buckets.push_back(1),
        }
    }

    fn advance(&mut self, window: usize) {
        if self.buckets.len() >= window {
            if let Some(oldest) = self.buckets.pop_front() {
                self.total = self.total.saturating_sub(oldest);
            }
        }
        self.buckets.push_back(0);
    }
}

struct RouteCounters {
    max_requests: u64,
    window_minutes: usize,
    users: DashMap<String, Counts>,
    ips: DashMap<String, Counts>,
}

impl RouteCounters {
    fn exceeded(&self, counts: Option<u64>) -> bool {
        counts.map(|total| total >= self.max_requests).unwrap_or(false)
    }
}

type RouteKey = (String, String);

/// Rate limiter keyed by `(method, route)` of the configured endpoint,
/// then by user id or client IP.
///
/// Every request is counted under both its user (or group) key and its IP.
/// Only the check gives the user key precedence: when a user key is given
/// the IP counter is not consulted.
pub struct RateLimiter {
    routes: RwLock<HashMap<RouteKey, RouteCounters>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            routes: RwLock::new(HashMap::new()),
        }
    }

    /// Replace every counter with fresh ones for the rate-limited endpoints.
    pub fn rebuild(&self, endpoints: &[EndpointPolicy]) {
        let mut fresh = HashMap::new();
        for endpoint in endpoints {
            let policy = endpoint.rate_limiting();
            if !policy.enabled {
                continue;
            }
            fresh.insert(
                (endpoint.method().to_string(), endpoint.route().to_string()),
                RouteCounters {
                    max_requests: policy.max_requests,
                    window_minutes: policy.window_size_minutes.max(1),
                    users: DashMap::new(),
                    ips: DashMap::new(),
                },
            );
        }

        let mut routes = self.routes.write().expect("rate limiter lock poisoned");
        tracing::debug!(endpoints = fresh.len(), "Rebuilt rate limiter");
        *routes = fresh;
    }

    /// Count one request for the user and the IP, each when present.
    pub fn update_counts(&self, method: &str, route: &str, user: Option<&str>, ip: Option<&str>) {
        let routes = self.routes.read().expect("rate limiter lock poisoned");
        let Some(counters) = routes.get(&route_key(method, route)) else {
            return;
        };

        if let Some(user) = non_empty(user) {
            counters
                .users
                .entry(user.to_string())
                .or_insert_with(Counts::new)
                .increment();
        }
        if let Some(ip) = non_empty(ip) {
            counters
                .ips
                .entry(ip.to_string())
                .or_insert_with(Counts::new)
                .increment();
        }
    }

    /// Whether the entity already reached the limit of the window.
    pub fn get_status(
        &self,
        method: &str,
        route: &str,
        user: Option<&str>,
        ip: Option<&str>,
    ) -> RateLimitStatus {
        let routes = self.routes.read().expect("rate limiter lock poisoned");
        let Some(counters) = routes.get(&route_key(method, route)) else {
            return RateLimitStatus::default();
        };

        match (non_empty(user), non_empty(ip)) {
            (Some(user), _) => {
                let total = counters.users.get(user).map(|c| c.total);
                if counters.exceeded(total) {
                    return RateLimitStatus {
                        block: true,
                        trigger: Some(RateLimitTrigger::User),
                    };
                }
            }
            (None, Some(ip)) => {
                let total = counters.ips.get(ip).map(|c| c.total);
                if counters.exceeded(total) {
                    return RateLimitStatus {
                        block: true,
                        trigger: Some(RateLimitTrigger::Ip),
                    };
                }
            }
            (None, None) => {}
        }

        RateLimitStatus::default()
    }

    /// Move every window forward by one minute.
    ///
    /// Holds the write lock for the whole pass so no request is counted
    /// against a half-advanced window.
    pub fn advance_window(&self) {
        let routes = self.routes.write().expect("rate limiter lock poisoned");
        for counters in routes.values() {
            let window = counters.window_minutes;
            for mut counts in counters.users.iter_mut() {
                counts.advance(window);
            }
            for mut counts in counters.ips.iter_mut() {
                counts.advance(window);
            }
        }
    }

    /// Advance the windows every `period` until shutdown.
    pub async fn run(self: Arc<Self>, period: Duration, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = time::interval_at(time::Instant::now() + period, period);
        tracing::debug!(period_secs = period.as_secs(), "Rate limiter ticker starting");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.advance_window();
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Rate limiter ticker received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

fn route_key(method: &str, route: &str) -> RouteKey {
    (method.to_string(), route.to_string())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::RateLimitPolicy;

    fn limiter(max_requests: u64, window_size_minutes: usize) -> RateLimiter {
        let endpoint = EndpointPolicy::new("POST", "/login").with_rate_limiting(RateLimitPolicy {
            enabled: true,
            max_requests,
            window_size_minutes,
        });
        let limiter = RateLimiter::new();
        limiter.rebuild(&[endpoint]);
        limiter
    }

    #[test]
    fn test_user_hits_limit() {
        let limiter = limiter(3, 1);
        for _ in 0..3 {
            limiter.update_counts("POST", "/login", Some("alice"), Some("1.1.1.1"));
        }

        let status = limiter.get_status("POST", "/login", Some("alice"), Some("1.1.1.1"));
        assert!(status.block);
        assert_eq!(status.trigger, Some(RateLimitTrigger::User));

        let other = limiter.get_status("POST", "/login", Some("bob"), Some("1.1.1.1"));
        assert!(!other.block);
        assert_eq!(other.trigger, None);
    }

    #[test]
    fn test_ip_counted_alongside_user() {
        let limiter = limiter(3, 1);
        for _ in 0..3 {
            limiter.update_counts("POST", "/login", Some("alice"), Some("1.1.1.1"));
        }

        // Dropping the session does not escape the IP limit.
        let status = limiter.get_status("POST", "/login", None, Some("1.1.1.1"));
        assert!(status.block);
        assert_eq!(status.trigger, Some(RateLimitTrigger::Ip));

        // A fresh user from the same address is checked on its own key.
        assert!(!limiter.get_status("POST", "/login", Some("bob"), Some("1.1.1.1")).block);
    }

    #[test]
    fn test_ip_used_without_user() {
        let limiter = limiter(2, 1);
        limiter.update_counts("POST", "/login", None, Some("1.1.1.1"));
        assert!(!limiter.get_status("POST", "/login", None, Some("1.1.1.1")).block);

        limiter.update_counts("POST", "/login", Some(""), Some("1.1.1.1"));
        let status = limiter.get_status("POST", "/login", None, Some("1.1.1.1"));
        assert!(status.block);
        assert_eq!(status.trigger, Some(RateLimitTrigger::Ip));
    }

    #[test]
    fn test_unknown_route_is_never_limited() {
        let limiter = limiter(1, 1);
        limiter.update_counts("GET", "/login", Some("alice"), None);
        limiter.update_counts("GET", "/login", Some("alice"), None);
        assert!(!limiter.get_status("GET", "/login", Some("alice"), None).block);
    }

    #[test]
    fn test_window_advance_expires_counts() {
        let limiter = limiter(2, 2);
        limiter.update_counts("POST", "/login", Some("alice"), None);
        limiter.advance_window();
        limiter.update_counts("POST", "/login", Some("alice"), None);
        assert!(limiter.get_status("POST", "/login", Some("alice"), None).block);

        // The first minute falls out of the two-minute window.
        limiter.advance_window();
        assert!(!limiter.get_status("POST", "/login", Some("alice"), None).block);

        limiter.advance_window();
        limiter.advance_window();
        let routes = limiter.routes.read().unwrap();
        let counters = routes.get(&route_key("POST", "/login")).unwrap();
        let counts = counters.users.get("alice").unwrap();
        assert_eq!(counts.total, 0);
        assert!(counts.buckets.len() <= 2);
    }

    #[test]
    fn test_rebuild_resets_counters() {
        let limiter = limiter(1, 1);
        limiter.update_counts("POST", "/login", Some("alice"), None);
        assert!(limiter.get_status("POST", "/login", Some("alice"), None).block);

        limiter.rebuild(&[EndpointPolicy::new("POST", "/login").with_rate_limiting(RateLimitPolicy {
            enabled: true,
            max_requests: 1,
            window_size_minutes: 1,
        })]);
        assert!(!limiter.get_status("POST", "/login", Some("alice"), None).block);
    }

    #[test]
    fn test_disabled_endpoints_are_skipped() {
        let limiter = RateLimiter::new();
        limiter.rebuild(&[EndpointPolicy::new("POST", "/login")]);
        limiter.update_counts("POST", "/login", Some("alice"), None);
        assert!(!limiter.get_status("POST", "/login", Some("alice"), None).block);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_advances_until_shutdown() {
        let limiter = Arc::new(limiter(1, 1));
        limiter.update_counts("POST", "/login", Some("alice"), None);

        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(Arc::clone(&limiter).run(Duration::from_secs(60), rx));

        time::sleep(Duration::from_secs(61)).await;
        assert!(!limiter.get_status("POST", "/login", Some("alice"), None).block);

        tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
