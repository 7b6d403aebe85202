//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, limits > 0)
//! - Check that control-plane endpoints are absolute URLs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AgentConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use crate::config::schema::AgentConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &AgentConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (field, value) in [
        ("cloud.endpoint", &config.cloud.endpoint),
        ("cloud.realtime_endpoint", &config.cloud.realtime_endpoint),
    ] {
        match url::Url::parse(value) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            Ok(parsed) => errors.push(ValidationError::new(
                field,
                format!("unsupported scheme '{}'", parsed.scheme()),
            )),
            Err(e) => errors.push(ValidationError::new(field, format!("invalid URL: {}", e))),
        }
    }

    if matches!(config.cloud.token.as_deref(), Some(token) if token.trim().is_empty()) {
        errors.push(ValidationError::new("cloud.token", "must not be blank"));
    }

    let positive = [
        ("cloud.poll_interval_secs", config.cloud.poll_interval_secs),
        ("cloud.initial_heartbeat_secs", config.cloud.initial_heartbeat_secs),
        ("cloud.heartbeat_floor_secs", config.cloud.heartbeat_floor_secs),
        ("cloud.timeout_secs", config.cloud.timeout_secs),
        ("protection.rate_limit_tick_secs", config.protection.rate_limit_tick_secs),
        ("protection.max_extract_depth", config.protection.max_extract_depth as u64),
        ("protection.max_extract_entries", config.protection.max_extract_entries as u64),
        ("reporting.attack_window_secs", config.reporting.attack_window_secs),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than zero"));
        }
    }

    if tracing_subscriber::EnvFilter::try_new(&config.observability.log_level).is_err() {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("invalid filter '{}'", config.observability.log_level),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
