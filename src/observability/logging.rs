//! Structured logging.
//!
//! # Responsibilities
//! - Install the process-wide `tracing` subscriber for hosts that do not
//!   bring their own
//! - Provide a one-shot logger for conditions that would otherwise repeat
//!   on every request or poll
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the configured level when set
//! - Installing twice is not an error; the first subscriber stays

use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install a fmt subscriber filtered by `RUST_LOG`, falling back to
/// `runtime_shield=<level>`.
///
/// Returns `false` when a global subscriber was already set.
pub fn init_logging(level: &str) -> bool {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("runtime_shield={}", level).into());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}

/// Lets a message through once per instance.
#[derive(Debug, Default)]
pub struct LogOnce {
    fired: AtomicBool,
}

impl LogOnce {
    pub const fn new() -> Self {
        Self {
            fired: AtomicBool::new(false),
        }
    }

    /// Returns `true` the first time it is called, `false` afterwards.
    pub fn first(&self) -> bool {
        !self.fired.swap(true, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_once() {
        let once = LogOnce::new();
        assert!(once.first());
        assert!(!once.first());
        assert!(!once.first());
    }

    #[test]
    fn test_init_twice() {
        init_logging("debug");
        assert!(!init_logging("debug"));
    }
}
