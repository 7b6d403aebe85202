//! In-process runtime protection agent.
//!
//! # Architecture Overview
//!
//! ```text
//!     Inbound request (adapter)
//!         → context (RequestContext built once per request)
//!         → agent.should_block_request()
//!               → security (private ranges, bypass, blocklists, UA, users)
//!               → routing (endpoint matcher)
//!               → ratelimit (sliding window counters)
//!
//!     Sink call (sql, fs, shell, outbound)
//!         → agent.scan(ctx, operation, detector, args)
//!               → input (user-input extraction per source)
//!               → vulnerabilities (dispatch, deferred attacks)
//!               → resilience::SlidingWindow → event channel
//!
//!     Background (lifecycle::startup)
//!         cloud::Synchronizer  ── poll / heartbeat ──→ policy::PolicyStore
//!         cloud::EventReporter ── detected_attack ───→ control plane
//!         ratelimit::RateLimiter ── minute tick
//! ```

pub mod agent;
pub mod cloud;
pub mod config;
pub mod context;
pub mod input;
pub mod lifecycle;
pub mod observability;
pub mod policy;
pub mod ratelimit;
pub mod resilience;
pub mod routing;
pub mod security;
pub mod stats;
pub mod vulnerabilities;

pub use agent::Agent;
pub use config::AgentConfig;
pub use context::{ContextError, RequestContext, User};
pub use lifecycle::Shutdown;
pub use security::BlockDecision;
pub use vulnerabilities::{AttackBlocked, AttackKind, Detection, Detector, DetectorError, ScanOptions};
