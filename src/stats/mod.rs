//! Statistics subsystem.
//!
//! # Data Flow
//! ```text
//! Request path (requests, attacks, sinks, users, routes, hostnames)
//!     → collector.rs (mutex counters + DashMap tables)
//!     → heartbeat: take_snapshot() → control plane → counters reset
//! ```
//!
//! # Design Decisions
//! - Tables are capped so a noisy application cannot grow them unbounded
//! - A snapshot covers exactly the interval since the previous one

pub mod collector;

pub use collector::{
    AttacksDetected, HostnameHit, OperationStats, RequestStats, RouteHit, StatsCollector,
    StatsSnapshot, UserStats,
};
pub(crate) use collector::unix_millis;
