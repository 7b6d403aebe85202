//! Metrics recording.
//!
//! # Responsibilities
//! - Define the agent's counters
//! - Record through the `metrics` facade; the host installs the exporter
//!
//! # Metrics
//! - `shield_requests_total` (counter): requests seen by the agent
//! - `shield_requests_blocked_total` (counter): blocked requests by reason
//! - `shield_attacks_detected_total` (counter): attacks by kind, blocked flag
//! - `shield_attack_events_dropped_total` (counter): events over the hourly cap
//! - `shield_control_plane_errors_total` (counter): failed calls by operation
//! - `shield_policy_updates_total` (counter): installed snapshots by origin
//!
//! # Design Decisions
//! - Without an installed recorder every call is a no-op
//! - Labels are low-cardinality (no routes, IPs or user ids)

use crate::vulnerabilities::AttackKind;

pub fn record_request() {
    metrics::counter!("shield_requests_total").increment(1);
}

pub fn record_blocked_request(reason: &'static str) {
    metrics::counter!("shield_requests_blocked_total", "reason" => reason).increment(1);
}

pub fn record_attack(kind: AttackKind, blocked: bool) {
    metrics::counter!(
        "shield_attacks_detected_total",
        "kind" => kind.as_str(),
        "blocked" => if blocked { "true" } else { "false" }
    )
    .increment(1);
}

pub fn record_dropped_attack_event() {
    metrics::counter!("shield_attack_events_dropped_total").increment(1);
}

pub fn record_control_plane_error(operation: &'static str) {
    metrics::counter!("shield_control_plane_errors_total", "operation" => operation).increment(1);
}

pub fn record_policy_update(origin: &'static str) {
    metrics::counter!("shield_policy_updates_total", "origin" => origin).increment(1);
}
