//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Attack detected on the request path:
//!     → sliding_window.rs (room left in the last hour?)
//!         yes → event channel → cloud::EventReporter
//!         no  → dropped, counted in metrics
//! ```
//!
//! # Design Decisions
//! - Throttling never blocks the request path; a full window drops events
//! - Control-plane failures are absorbed by the synchronizer (fail-open)

pub mod sliding_window;

pub use sliding_window::SlidingWindow;
