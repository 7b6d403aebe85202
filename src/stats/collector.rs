//! Aggregated agent statistics, flushed with every heartbeat.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use serde::Serialize;

use crate::context::User;
use crate::vulnerabilities::AttackKind;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AttacksDetected {
    pub total: u64,
    pub blocked: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestStats {
    pub total: u64,
    pub aborted: u64,
    pub rate_limited: u64,
    pub attacks_detected: AttacksDetected,
}

/// Per-sink statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationStats {
    pub kind: AttackKind,
    pub total: u64,
    pub without_context: u64,
    pub detector_errors: u64,
    pub attacks_detected: AttacksDetected,
}

impl OperationStats {
    fn new(kind: AttackKind) -> Self {
        Self {
            kind,
            total: 0,
            without_context: 0,
            detector_errors: 0,
            attacks_detected: AttacksDetected::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteHit {
    pub method: String,
    pub path: String,
    pub hits: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostnameHit {
    pub hostname: String,
    pub port: u16,
    pub hits: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub id: String,
    pub name: String,
    pub last_ip_address: Option<String>,
    pub first_seen_at: u64,
    pub last_seen_at: u64,
}

/// Everything collected since the previous snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub started_at: u64,
    pub ended_at: u64,
    pub requests: RequestStats,
    pub operations: BTreeMap<String, OperationStats>,
    pub routes: Vec<RouteHit>,
    pub hostnames: Vec<HostnameHit>,
    pub users: Vec<UserStats>,
}

#[derive(Debug)]
struct Counters {
    started_at: u64,
    requests: RequestStats,
    operations: HashMap<String, OperationStats>,
}

impl Counters {
    fn new() -> Self {
        Self {
            started_at: unix_millis(),
            requests: RequestStats::default(),
            operations: HashMap::new(),
        }
    }

    fn operation(&mut self, operation: &str, kind: AttackKind) -> &mut OperationStats {
        self.operations
            .entry(operation.to_string())
            .or_insert_with(|| OperationStats::new(kind))
    }
}

/// Thread-safe statistics owned by one agent.
pub struct StatsCollector {
    counters: Mutex<Counters>,
    routes: DashMap<(String, String), u64>,
    hostnames: DashMap<(String, u16), u64>,
    users: DashMap<String, UserStats>,
    max_users: usize,
    max_hostnames: usize,
}

impl StatsCollector {
    pub fn new(max_users: usize, max_hostnames: usize) -> Self {
        Self {
            counters: Mutex::new(Counters::new()),
            routes: DashMap::new(),
            hostnames: DashMap::new(),
            users: DashMap::new(),
            max_users,
            max_hostnames,
        }
    }

    fn counters(&self) -> std::sync::MutexGuard<'_, Counters> {
        self.counters.lock().expect("stats mutex poisoned")
    }

    pub fn on_request(&self) {
        self.counters().requests.total += 1;
    }

    pub fn on_aborted_request(&self) {
        self.counters().requests.aborted += 1;
    }

    pub fn on_rate_limited_request(&self) {
        self.counters().requests.rate_limited += 1;
    }

    pub fn on_operation_call(&self, operation: &str, kind: AttackKind, with_context: bool) {
        let mut counters = self.counters();
        let stats = counters.operation(operation, kind);
        stats.total += 1;
        if !with_context {
            stats.without_context += 1;
        }
    }

    pub fn on_detector_error(&self, operation: &str, kind: AttackKind) {
        self.counters().operation(operation, kind).detector_errors += 1;
    }

    pub fn on_attack(&self, operation: &str, kind: AttackKind, blocked: bool) {
        let mut counters = self.counters();
        counters.requests.attacks_detected.total += 1;
        if blocked {
            counters.requests.attacks_detected.blocked += 1;
        }

        let stats = counters.operation(operation, kind);
        stats.attacks_detected.total += 1;
        if blocked {
            stats.attacks_detected.blocked += 1;
        }
    }

    pub fn on_route(&self, method: &str, route: &str) {
        *self
            .routes
            .entry((method.to_string(), route.to_string()))
            .or_insert(0) += 1;
    }

    pub fn on_hostname(&self, hostname: &str, port: u16) {
        if hostname.is_empty() {
            return;
        }
        let key = (hostname.to_string(), port);
        if !self.hostnames.contains_key(&key) && self.hostnames.len() >= self.max_hostnames {
            tracing::debug!(hostname = %hostname, "Hostname table full, not tracking");
            return;
        }
        *self.hostnames.entry(key).or_insert(0) += 1;
    }

    pub fn on_user(&self, user: &User, ip: Option<&str>) {
        let now = unix_millis();
        if let Some(mut existing) = self.users.get_mut(&user.id) {
            existing.name = user.name.clone();
            existing.last_seen_at = now;
            if ip.is_some() {
                existing.last_ip_address = ip.map(str::to_string);
            }
            return;
        }

        if self.users.len() >= self.max_users {
            tracing::debug!(user_id = %user.id, "User table full, not tracking");
            return;
        }
        self.users.insert(
            user.id.clone(),
            UserStats {
                id: user.id.clone(),
                name: user.name.clone(),
                last_ip_address: ip.map(str::to_string),
                first_seen_at: now,
                last_seen_at: now,
            },
        );
    }

    /// Number of requests counted since the last snapshot.
    pub fn request_count(&self) -> u64 {
        self.counters().requests.total
    }

    /// Return everything collected so far and start over.
    pub fn take_snapshot(&self) -> StatsSnapshot {
        let previous = std::mem::replace(&mut *self.counters(), Counters::new());

        let mut routes: Vec<RouteHit> = drain(&self.routes)
            .into_iter()
            .map(|((method, path), hits)| RouteHit { method, path, hits })
            .collect();
        routes.sort_by(|a, b| (&a.path, &a.method).cmp(&(&b.path, &b.method)));

        let mut hostnames: Vec<HostnameHit> = drain(&self.hostnames)
            .into_iter()
            .map(|((hostname, port), hits)| HostnameHit { hostname, port, hits })
            .collect();
        hostnames.sort_by(|a, b| (&a.hostname, a.port).cmp(&(&b.hostname, b.port)));

        let mut users: Vec<UserStats> = drain(&self.users).into_iter().map(|(_, u)| u).collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));

        StatsSnapshot {
            started_at: previous.started_at,
            ended_at: unix_millis(),
            requests: previous.requests,
            operations: previous.operations.into_iter().collect(),
            routes,
            hostnames,
            users,
        }
    }
}

fn drain<K, V>(map: &DashMap<K, V>) -> Vec<(K, V)>
where
    K: Eq + std::hash::Hash + Clone,
{
    let keys: Vec<K> = map.iter().map(|entry| entry.key().clone()).collect();
    keys.into_iter().filter_map(|key| map.remove(&key)).collect()
}

/// Milliseconds since the Unix epoch.
pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
