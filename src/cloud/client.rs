//! HTTP client for the control plane.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::cloud::events::Event;
use crate::cloud::types::{CloudConfig, ConfigVersion, FirewallLists};
use crate::config::ControlPlaneConfig;
use crate::observability::LogOnce;

#[derive(Debug, Error)]
pub enum CloudError {
    #[error("no control-plane token configured")]
    MissingToken,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("control plane returned status {0}")]
    Status(u16),

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Operations the agent needs from the control plane.
///
/// The agent only talks to this trait so tests and alternative transports
/// can stand in for the HTTP client.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Version of the newest configuration, from the realtime endpoint.
    async fn fetch_config_version(&self) -> Result<ConfigVersion, CloudError>;

    async fn fetch_config(&self) -> Result<CloudConfig, CloudError>;

    async fn fetch_firewall_lists(&self) -> Result<FirewallLists, CloudError>;

    /// Post an event. Some events are acknowledged with a fresh
    /// configuration, which is returned.
    async fn send_event(&self, event: &Event) -> Result<Option<CloudConfig>, CloudError>;
}

/// `reqwest`-based [`ControlPlane`] implementation.
pub struct CloudClient {
    http: reqwest::Client,
    token: Option<String>,
    endpoint: String,
    realtime_endpoint: String,
    missing_token: LogOnce,
}

impl CloudClient {
    pub fn new(config: &ControlPlaneConfig) -> Result<Self, CloudError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            token: config.token.clone().filter(|t| !t.is_empty()),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            realtime_endpoint: config.realtime_endpoint.trim_end_matches('/').to_string(),
            missing_token: LogOnce::new(),
        })
    }

    fn token(&self) -> Result<&str, CloudError> {
        match self.token.as_deref() {
            Some(token) => Ok(token),
            None => {
                if self.missing_token.first() {
                    tracing::warn!("No control-plane token configured, policies will not be synchronized");
                }
                Err(CloudError::MissingToken)
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T, CloudError> {
        let token = self.token()?;
        let response = self.http.get(&url).bearer_auth(token).send().await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(CloudError::Status(status.as_u16()));
        }

        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl ControlPlane for CloudClient {
    async fn fetch_config_version(&self) -> Result<ConfigVersion, CloudError> {
        self.get_json(format!("{}/config", self.realtime_endpoint)).await
    }

    async fn fetch_config(&self) -> Result<CloudConfig, CloudError> {
        self.get_json(format!("{}/api/runtime/config", self.endpoint)).await
    }

    async fn fetch_firewall_lists(&self) -> Result<FirewallLists, CloudError> {
        self.get_json(format!("{}/api/runtime/firewall/lists", self.endpoint))
            .await
    }

    async fn send_event(&self, event: &Event) -> Result<Option<CloudConfig>, CloudError> {
        let token = self.token()?;
        let response = self
            .http
            .post(format!("{}/api/runtime/events", self.endpoint))
            .bearer_auth(token)
            .json(event)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(CloudError::Status(status.as_u16()));
        }
        if text.trim().is_empty() {
            return Ok(None);
        }

        let config: CloudConfig = serde_json::from_str(&text)?;
        if config.config_updated_at > 0 {
            Ok(Some(config))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_token() {
        let client = CloudClient::new(&ControlPlaneConfig::default()).unwrap();
        assert!(matches!(
            client.fetch_config().await,
            Err(CloudError::MissingToken)
        ));
        assert!(matches!(
            client.fetch_config_version().await,
            Err(CloudError::MissingToken)
        ));
    }

    #[test]
    fn test_endpoints_are_normalized() {
        let config = ControlPlaneConfig {
            token: Some("t".into()),
            endpoint: "https://api.example.com/".into(),
            realtime_endpoint: "https://rt.example.com//".into(),
            ..Default::default()
        };
        let client = CloudClient::new(&config).unwrap();
        assert_eq!(client.endpoint, "https://api.example.com");
        assert_eq!(client.realtime_endpoint, "https://rt.example.com");
    }
}
