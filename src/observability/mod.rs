//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters through the metrics facade)
//!
//! Consumers (installed by the host application):
//!     → tracing subscriber (stdout by default via init_logging)
//!     → metrics recorder/exporter
//! ```
//!
//! # Design Decisions
//! - Structured fields, never interpolated payloads or secrets
//! - Metrics are cheap and safe to call without a recorder

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogOnce};
