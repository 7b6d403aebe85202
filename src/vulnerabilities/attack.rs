//! Attack records and the blocking error.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::input::Source;
use crate::vulnerabilities::AttackKind;

/// A detected attack, as reported to the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attack {
    pub kind: AttackKind,
    /// Sink operation, e.g. `std::fs::File::open`.
    pub operation: String,
    pub source: Source,
    /// Path of the payload inside the source, e.g. `.user.name`.
    pub path: String,
    pub payload: String,
    pub metadata: BTreeMap<String, String>,
    /// Whether the operation was (or will be) blocked.
    pub blocked: bool,
}

/// Returned to the host application when an attack is blocked.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error(
    "Runtime Shield has blocked {}: {}(...) originating from {}{}",
    .kind.human_name(),
    .operation,
    .origin,
    .path
)]
pub struct AttackBlocked {
    pub kind: AttackKind,
    pub operation: String,
    /// Where the payload came from. Not named `source`, which `thiserror`
    /// reserves for a wrapped error.
    pub origin: Source,
    pub path: String,
}

impl From<&Attack> for AttackBlocked {
    fn from(attack: &Attack) -> Self {
        Self {
            kind: attack.kind,
            operation: attack.operation.clone(),
            origin: attack.source,
            path: attack.path.clone(),
        }
    }
}

/// A detection whose outcome is settled by a later sink call.
///
/// At most one exists per request. Once reported it stays on the context so
/// later calls keep returning the same error, but it is never reported again.
#[derive(Debug, Clone)]
pub struct DeferredAttack {
    pub attack: Attack,
    pub error: Option<AttackBlocked>,
    pub reported: bool,
}
