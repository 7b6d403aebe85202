//! Control-plane subsystem.
//!
//! # Data Flow
//! ```text
//! synchronizer.rs (background)
//!     started  → POST /api/runtime/events → CloudConfig
//!     poll     → GET {realtime}/config → newer? → GET /api/runtime/config
//!     heartbeat→ POST /api/runtime/events (stats) → CloudConfig
//!         → GET /api/runtime/firewall/lists
//!         → PolicySnapshot::from_cloud → Agent::install_policy
//!
//! reporter.rs (background)
//!     event channel → POST /api/runtime/events (detected_attack)
//! ```
//!
//! # Design Decisions
//! - All I/O happens on background tasks, never on the request path
//! - `ControlPlane` is a trait so tests can stand in for the HTTP client
//! - Failures are logged and counted; the last good policy stays in force

pub mod client;
pub mod events;
pub mod reporter;
pub mod synchronizer;
pub mod types;

pub use client::{CloudClient, CloudError, ControlPlane};
pub use events::{AgentInfo, DetectedAttackEvent, Event, HeartbeatEvent, StartedEvent};
pub use reporter::EventReporter;
pub use synchronizer::{HeartbeatSchedule, Synchronizer};
pub use types::{CloudConfig, ConfigVersion, EndpointConfig, FirewallLists, IpBlocklist};
