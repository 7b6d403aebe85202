//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Agent::start(client) → spawn poll, heartbeat, ticker, reporter
//!
//! Shutdown (shutdown.rs):
//!     shutdown() → broadcast signal → tasks leave their loops → joined
//! ```
//!
//! # Design Decisions
//! - Every background task is owned by one Shutdown coordinator
//! - Shutdown waits for the tasks and may be called repeatedly

pub mod shutdown;
pub mod startup;

pub use shutdown::Shutdown;
