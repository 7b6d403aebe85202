//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Concrete URL ("/posts/42?draft=1")
//!     → route.rs (normalize to template "/posts/:number")
//!
//! (method, route) + snapshot endpoints
//!     → matcher.rs (exact + wildcard matches, most specific first)
//!     → Consumers:
//!         force-protection-off  (any match)
//!         IP allow-lists        (any match)
//!         rate limiting         (first match only)
//! ```
//!
//! # Design Decisions
//! - Wildcard patterns compiled once per snapshot, never on the hot path
//! - Deterministic: same input always produces the same ordering

pub mod matcher;
pub mod route;

pub use matcher::match_endpoints;
pub use route::{build_route_from_url, should_discover_route};
