//! Background control-plane synchronization.
//!
//! # Responsibilities
//! - Announce the agent once at startup and install the returned policy
//! - Poll the realtime endpoint and pull a full configuration when newer
//! - Send heartbeats with aggregated stats and adopt suggested intervals
//!
//! # Design Decisions
//! - Fail-open: every network or decode error keeps the installed snapshot
//! - The heartbeat interval starts short and only widens once the control
//!   plane reports it has received stats, never below the configured floor

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::agent::Agent;
use crate::cloud::client::{CloudError, ControlPlane};
use crate::cloud::events::{Event, HeartbeatEvent, StartedEvent};
use crate::cloud::types::CloudConfig;
use crate::observability::metrics;
use crate::policy::PolicySnapshot;

/// Heartbeat interval state.
///
/// Stays on the initial interval until the control plane confirms it has
/// received stats (`receivedAnyStats`), then follows suggested intervals
/// that are at least the floor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatSchedule {
    interval: Duration,
    floor: Duration,
    stats_received: bool,
}

impl HeartbeatSchedule {
    pub fn new(initial: Duration, floor: Duration) -> Self {
        Self {
            interval: initial,
            floor,
            stats_received: false,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether the control plane has confirmed receiving stats.
    pub fn stats_received(&self) -> bool {
        self.stats_received
    }

    /// Record a delivered heartbeat and consider the suggested interval.
    ///
    /// `received_any_stats` is the control plane's latest view. Once true it
    /// stays true. Returns whether the interval changed.
    pub fn on_heartbeat_sent(&mut self, suggested: Option<Duration>, received_any_stats: bool) -> bool {
        self.stats_received |= received_any_stats;
        if !self.stats_received {
            return false;
        }

        match suggested {
            Some(next) if next >= self.floor && next != self.interval => {
                tracing::info!(
                    previous_secs = self.interval.as_secs(),
                    interval_secs = next.as_secs(),
                    "Adopting heartbeat interval"
                );
                self.interval = next;
                true
            }
            Some(next) if next < self.floor => {
                tracing::debug!(
                    suggested_secs = next.as_secs(),
                    floor_secs = self.floor.as_secs(),
                    "Ignoring heartbeat interval below floor"
                );
                false
            }
            _ => false,
        }
    }
}

/// Keeps an agent's policy store in step with the control plane.
pub struct Synchronizer {
    agent: Agent,
    client: Arc<dyn ControlPlane>,
}

impl Synchronizer {
    pub fn new(agent: Agent, client: Arc<dyn ControlPlane>) -> Self {
        Self { agent, client }
    }

    /// Send the `started` event and install the configuration it returns.
    pub async fn report_started(&self) -> bool {
        let event = Event::Started(StartedEvent::new(self.agent.info().clone()));
        match self.client.send_event(&event).await {
            Ok(Some(config)) => self.apply_config(config, "started").await,
            Ok(None) => false,
            Err(e) => {
                self.log_failure("started", &e);
                false
            }
        }
    }

    /// Ask for the newest version and pull the configuration when it is
    /// newer than the installed snapshot. Returns whether a snapshot was
    /// installed.
    pub async fn poll_once(&self) -> bool {
        let version = match self.client.fetch_config_version().await {
            Ok(version) => version,
            Err(e) => {
                self.log_failure("fetch_config_version", &e);
                return false;
            }
        };

        if version.config_updated_at <= self.agent.policy().version() {
            return false;
        }

        match self.client.fetch_config().await {
            Ok(config) => self.apply_config(config, "poll").await,
            Err(e) => {
                self.log_failure("fetch_config", &e);
                false
            }
        }
    }

    /// Send one heartbeat with the stats collected since the previous one.
    pub async fn heartbeat_once(&self, schedule: &mut HeartbeatSchedule) -> bool {
        let stats = self.agent.stats().take_snapshot();
        let event = Event::Heartbeat(HeartbeatEvent::new(self.agent.info().clone(), stats));

        match self.client.send_event(&event).await {
            Ok(response) => {
                let suggested = response
                    .as_ref()
                    .map(|config| config.heartbeat_interval_in_ms)
                    .filter(|ms| *ms > 0)
                    .map(Duration::from_millis);
                let received_any_stats = match &response {
                    Some(config) => config.received_any_stats,
                    None => self.agent.policy().current().received_any_stats,
                };
                schedule.on_heartbeat_sent(suggested, received_any_stats);

                match response {
                    Some(config) => self.apply_config(config, "heartbeat").await,
                    None => false,
                }
            }
            Err(e) => {
                self.log_failure("heartbeat", &e);
                false
            }
        }
    }

    async fn apply_config(&self, config: CloudConfig, origin: &'static str) -> bool {
        let current = self.agent.policy().current();
        if config.config_updated_at <= current.version {
            return false;
        }

        let lists = match self.client.fetch_firewall_lists().await {
            Ok(lists) => Some(lists),
            Err(e) => {
                self.log_failure("fetch_firewall_lists", &e);
                None
            }
        };

        let snapshot = PolicySnapshot::from_cloud(&config, lists.as_ref(), &current);
        let installed = self.agent.install_policy(snapshot);
        if installed && self.agent.metrics_enabled() {
            metrics::record_policy_update(origin);
        }
        installed
    }

    /// Report `started`, then poll for newer configurations until shutdown.
    pub async fn run_config_poll(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        tokio::select! {
            _ = self.report_started() => {}
            _ = shutdown.recv() => return,
        }

        let period = self.agent.config().cloud.poll_interval();
        let mut ticker = time::interval_at(time::Instant::now() + period, period);
        tracing::debug!(interval_secs = period.as_secs(), "Config poller starting");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Config poller received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Send heartbeats until shutdown, re-reading the interval each round.
    pub async fn run_heartbeat(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let cloud = &self.agent.config().cloud;
        let mut schedule = HeartbeatSchedule::new(cloud.initial_heartbeat(), cloud.heartbeat_floor());

        loop {
            tokio::select! {
                _ = time::sleep(schedule.interval()) => {
                    self.heartbeat_once(&mut schedule).await;
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Heartbeat received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    fn log_failure(&self, operation: &'static str, error: &CloudError) {
        match error {
            // Logged once by the client.
            CloudError::MissingToken => {}
            _ => {
                tracing::warn!(operation, error = %error, "Control-plane call failed, keeping current policy");
                if self.agent.metrics_enabled() {
                    metrics::record_control_plane_error(operation);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_starts_at_initial_interval() {
        let schedule = HeartbeatSchedule::new(Duration::from_secs(60), Duration::from_secs(120));
        assert_eq!(schedule.interval(), Duration::from_secs(60));
        assert!(!schedule.stats_received());
    }

    #[test]
    fn test_schedule_adopts_suggestion_above_floor() {
        let mut schedule = HeartbeatSchedule::new(Duration::from_secs(60), Duration::from_secs(120));
        assert!(schedule.on_heartbeat_sent(Some(Duration::from_secs(600)), true));
        assert_eq!(schedule.interval(), Duration::from_secs(600));
        assert!(schedule.stats_received());
    }

    #[test]
    fn test_schedule_waits_for_stats_confirmation() {
        let mut schedule = HeartbeatSchedule::new(Duration::from_secs(60), Duration::from_secs(120));
        assert!(!schedule.on_heartbeat_sent(Some(Duration::from_secs(600)), false));
        assert_eq!(schedule.interval(), Duration::from_secs(60));
        assert!(!schedule.stats_received());

        assert!(schedule.on_heartbeat_sent(Some(Duration::from_secs(600)), true));
        // A later response without the flag does not reset the phase.
        assert!(schedule.on_heartbeat_sent(Some(Duration::from_secs(300)), false));
        assert_eq!(schedule.interval(), Duration::from_secs(300));
    }

    #[test]
    fn test_schedule_ignores_suggestion_below_floor() {
        let mut schedule = HeartbeatSchedule::new(Duration::from_secs(60), Duration::from_secs(120));
        assert!(!schedule.on_heartbeat_sent(Some(Duration::from_secs(30)), true));
        assert_eq!(schedule.interval(), Duration::from_secs(60));

        assert!(!schedule.on_heartbeat_sent(None, true));
        assert_eq!(schedule.interval(), Duration::from_secs(60));
    }
}
