//! Policy subsystem.
//!
//! # Data Flow
//! ```text
//! Control plane (CloudConfig + FirewallLists)
//!     → snapshot.rs (compile endpoints, tries, UA pattern)
//!     → store.rs (install if strictly newer, atomic swap)
//!     → readers: security::decision, vulnerabilities::scan, ratelimit
//! ```
//!
//! # Design Decisions
//! - Snapshots are immutable; updates replace the whole snapshot
//! - Installation is linearized by version under a writer lock
//! - Wildcard routes and regexes are compiled once per snapshot

pub mod endpoint;
pub mod snapshot;
pub mod store;

pub use endpoint::{EndpointPolicy, RateLimitPolicy};
pub use snapshot::{NamedMatchList, PolicySnapshot};
pub use store::PolicyStore;
