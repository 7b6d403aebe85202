//! User-input extraction subsystem.
//!
//! # Data Flow
//! ```text
//! RequestContext source (query, headers, cookies, routeParams, body)
//!     → source.rs (fixed scan order, JSON view of each source)
//!     → extract.rs (walk the tree, collect every string + path)
//!         → jwt.rs (decode JWT-shaped strings, walk their claims)
//!     → map payload → path, fed to every detector
//! ```
//!
//! # Design Decisions
//! - Pure functions, no I/O, safe to call on the request path
//! - Traversal is bounded by depth and by number of collected entries
//! - Object keys are user input too and are collected

pub mod extract;
pub mod jwt;
pub mod source;

pub use extract::{extract_strings, extract_strings_with_limits, ExtractLimits, UserInput};
pub use source::Source;
