//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::AgentConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load a TOML file, apply environment overrides and validate.
pub fn load_config(path: &Path) -> Result<AgentConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: AgentConfig = toml::from_str(&content)?;

    apply_env_overrides(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

impl AgentConfig {
    /// Defaults plus environment overrides, validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = AgentConfig::default();
        apply_env_overrides(&mut config);
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

/// Apply `SHIELD_*` variables from the process environment.
pub fn apply_env_overrides(config: &mut AgentConfig) {
    apply_env_overrides_from(config, |key| std::env::var(key).ok());
}

/// Apply `SHIELD_*` overrides read through `lookup`.
pub fn apply_env_overrides_from<F>(config: &mut AgentConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(token) = lookup("SHIELD_TOKEN").filter(|t| !t.trim().is_empty()) {
        config.cloud.token = Some(token.trim().to_string());
    }
    if let Some(endpoint) = lookup("SHIELD_ENDPOINT") {
        config.cloud.endpoint = endpoint;
    }
    if let Some(endpoint) = lookup("SHIELD_REALTIME_ENDPOINT") {
        config.cloud.realtime_endpoint = endpoint;
    }
    if let Some(disable) = lookup("SHIELD_DISABLE").and_then(|v| parse_flag(&v)) {
        config.protection.disable = disable;
    }
    if let Some(block) = lookup("SHIELD_BLOCK").and_then(|v| parse_flag(&v)) {
        config.protection.block = Some(block);
    }
    if let Some(trust) = lookup("SHIELD_TRUST_PROXY").and_then(|v| parse_flag(&v)) {
        config.protection.trust_proxy = trust;
    }
    if let Some(level) = lookup("SHIELD_LOG_LEVEL") {
        config.observability.log_level = level;
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        other => {
            tracing::warn!(value = %other, "Ignoring unrecognized boolean environment value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AgentConfig::default();
        apply_env_overrides_from(
            &mut config,
            env(&[
                ("SHIELD_TOKEN", "tok"),
                ("SHIELD_DISABLE", "true"),
                ("SHIELD_BLOCK", "0"),
                ("SHIELD_ENDPOINT", "https://api.example.com"),
                ("SHIELD_TRUST_PROXY", "off"),
                ("SHIELD_LOG_LEVEL", "debug"),
            ]),
        );

        assert_eq!(config.cloud.token.as_deref(), Some("tok"));
        assert_eq!(config.cloud.endpoint, "https://api.example.com");
        assert!(config.protection.disable);
        assert_eq!(config.protection.block, Some(false));
        assert!(!config.protection.trust_proxy);
        assert_eq!(config.observability.log_level, "debug");
    }

    #[test]
    fn test_unrecognized_flag_is_ignored() {
        let mut config = AgentConfig::default();
        apply_env_overrides_from(&mut config, env(&[("SHIELD_BLOCK", "maybe"), ("SHIELD_TOKEN", " ")]));
        assert_eq!(config.protection.block, None);
        assert_eq!(config.cloud.token, None);
    }

    #[test]
    fn test_load_config_file() {
        let path = std::env::temp_dir().join(format!("shield-config-{}.toml", uuid::Uuid::new_v4()));
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "[cloud]\npoll_interval_secs = 30\n[reporting]\nmax_attack_events = 5").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.cloud.poll_interval_secs, 30);
        assert_eq!(config.reporting.max_attack_events, 5);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_config_errors() {
        let missing = load_config(Path::new("/definitely/not/here.toml"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));

        let path = std::env::temp_dir().join(format!("shield-config-{}.toml", uuid::Uuid::new_v4()));
        fs::write(&path, "[cloud]\ntimeout_secs = 0\n").unwrap();
        let invalid = load_config(&path);
        fs::remove_file(&path).unwrap();

        match invalid {
            Err(ConfigError::Validation(errors)) => assert_eq!(errors[0].field, "cloud.timeout_secs"),
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
