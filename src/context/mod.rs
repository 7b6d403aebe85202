//! Request context subsystem.
//!
//! # Data Flow
//! ```text
//! Adapter (method, url, headers, body, remote address)
//!     → request.rs builder (query + cookies parsed, route normalized)
//!         → ip.rs (client IP, optional X-Forwarded-For trust)
//!     → RequestContext passed by reference to every agent call
//! ```
//!
//! # Design Decisions
//! - The context is an explicit value, never looked up from global state
//! - Request inputs are immutable; decision state sits behind one mutex so
//!   tasks sharing a request observe each transition exactly once
//! - Extracted user input is computed lazily, once per source

pub mod ip;
pub mod request;

use serde::Serialize;
use thiserror::Error;

pub use ip::resolve_client_ip;
pub use request::{RequestContext, RequestContextBuilder, RequestState};

/// The authenticated user of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: String,
    pub name: String,
}

/// Misuse of the request context API.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("empty id or name")]
    EmptyUser,

    #[error("empty rate limit group id")]
    EmptyGroup,
}
