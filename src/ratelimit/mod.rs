//! Rate limiting subsystem.
//!
//! # Data Flow
//! ```text
//! PolicySnapshot installed
//!     → limiter.rs rebuild (fresh counters per rate-limited endpoint)
//!
//! Request decision (first matching endpoint only)
//!     → get_status (user/group key, else client IP)
//!     → update_counts when not blocked
//!
//! Background ticker (every minute)
//!     → advance_window (drop the oldest minute, open a new one)
//! ```
//!
//! # Design Decisions
//! - Per-minute buckets in a bounded queue; totals never go negative
//! - Counters are lost on policy change rather than migrated

pub mod limiter;

pub use limiter::{RateLimitStatus, RateLimitTrigger, RateLimiter};
