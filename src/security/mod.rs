//! Request-level protection decisions.
//!
//! # Data Flow
//! ```text
//! RequestContext (client IP, user agent, user, group)
//!     → private.rs (non-routable addresses are always allowed)
//!     → PolicySnapshot bypass list (allowed, nothing else checked)
//!     → ip_list.rs (named blocklists, tries per address family)
//!     → blocked user agents, blocked users
//!     → endpoint IP allow-lists (routing::matcher)
//!     → ratelimit (first matching endpoint only)
//!     → decision.rs (BlockDecision or allow)
//! ```
//!
//! # Design Decisions
//! - The decision runs at most once per request
//! - Missing data (no IP, no user agent) never causes a block
//! - Lookups are read-only against an immutable snapshot

pub mod decision;
pub mod ip_list;
pub mod private;

pub use decision::{evaluate_request, BlockDecision};
pub use ip_list::{parse_ip, IpListError, MatchList};
pub use private::{is_private_ip, is_private_ip_str};
