//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → SHIELD_* environment overrides
//!     → validation.rs (semantic checks)
//!     → AgentConfig (validated, immutable)
//!     → owned by the Agent, shared with background tasks
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the control plane changes policy,
//!   not configuration
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{apply_env_overrides, apply_env_overrides_from, load_config, ConfigError};
pub use schema::{
    AgentConfig, ControlPlaneConfig, ObservabilityConfig, ProtectionConfig, ReportingConfig,
};
pub use validation::{validate_config, ValidationError};
