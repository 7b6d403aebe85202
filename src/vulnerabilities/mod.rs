//! Vulnerability scanning subsystem.
//!
//! # Data Flow
//! ```text
//! Sink call (sql query, file path, shell command, outbound url)
//!     → scan.rs Agent::scan(ctx, operation, detector, args)
//!         → force-protection-off? (any matching endpoint)
//!         → deferred attack of the same kind? (report once, replay error)
//!         → input extraction per source, in fixed order
//!         → Detector::scan(payload, args) until the first hit
//!     → attack.rs (Attack record, AttackBlocked error)
//!     → report now, or store as deferred on the context
//! ```
//!
//! # Design Decisions
//! - Detectors are synchronous, do no I/O and are owned by the caller
//! - A detector error skips that check only; scanning continues
//! - Blocking is decided by the global mode, detection always happens

pub mod attack;
pub mod scan;

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

pub use attack::{Attack, AttackBlocked, DeferredAttack};
pub use scan::ScanOptions;

/// Vulnerability classes the agent reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackKind {
    SqlInjection,
    NosqlInjection,
    ShellInjection,
    PathTraversal,
    Ssrf,
    CodeInjection,
}

impl AttackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttackKind::SqlInjection => "sql_injection",
            AttackKind::NosqlInjection => "nosql_injection",
            AttackKind::ShellInjection => "shell_injection",
            AttackKind::PathTraversal => "path_traversal",
            AttackKind::Ssrf => "ssrf",
            AttackKind::CodeInjection => "code_injection",
        }
    }

    /// Phrase used in error messages, article included.
    pub fn human_name(&self) -> &'static str {
        match self {
            AttackKind::SqlInjection => "an SQL injection",
            AttackKind::NosqlInjection => "a NoSQL injection",
            AttackKind::ShellInjection => "a shell injection",
            AttackKind::PathTraversal => "a path traversal attack",
            AttackKind::Ssrf => "a server-side request forgery",
            AttackKind::CodeInjection => "a code injection",
        }
    }
}

impl fmt::Display for AttackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A positive finding of a detector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Detection {
    /// Detector-specific details (e.g. the SQL dialect or the file name).
    pub metadata: BTreeMap<String, String>,
}

impl Detection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A detector failed to evaluate one payload.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("detector failed: {0}")]
pub struct DetectorError(pub String);

/// Decides whether one user-controlled string turns the sink arguments
/// `A` into an attack.
///
/// Implementations must be pure and fast: they run on the request path for
/// every extracted string until the first detection.
pub trait Detector<A: ?Sized>: Send + Sync {
    fn kind(&self) -> AttackKind;

    fn scan(&self, user_input: &str, args: &A) -> Result<Option<Detection>, DetectorError>;
}
