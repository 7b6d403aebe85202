//! Startup orchestration.
//!
//! # Responsibilities
//! - Take the event channel receiver from the agent
//! - Start background tasks (config poll, heartbeat, rate limiter ticker,
//!   event reporter) under one shutdown coordinator
//!
//! # Design Decisions
//! - Starting is synchronous; the first control-plane call happens on the
//!   poll task, so the host's startup never waits on the network
//! - Without an event receiver (already started) only the ticker and the
//!   synchronizer loops are spawned

use std::sync::Arc;

use crate::agent::Agent;
use crate::cloud::{CloudClient, CloudError, ControlPlane, EventReporter, Synchronizer};
use crate::lifecycle::Shutdown;

impl Agent {
    /// Spawn the background tasks talking to `client`.
    ///
    /// Must be called from within a Tokio runtime. The returned coordinator
    /// stops the tasks; the agent keeps serving requests either way.
    pub fn start(&self, client: Arc<dyn ControlPlane>) -> Shutdown {
        let shutdown = Shutdown::new();
        let config = self.config();

        if self.is_disabled() {
            tracing::info!("Agent disabled, no background tasks started");
            return shutdown;
        }

        let synchronizer = Arc::new(Synchronizer::new(self.clone(), Arc::clone(&client)));

        let poller = Arc::clone(&synchronizer);
        shutdown.spawn(move |rx| poller.run_config_poll(rx));

        let heartbeat = Arc::clone(&synchronizer);
        shutdown.spawn(move |rx| heartbeat.run_heartbeat(rx));

        let limiter = Arc::clone(self.rate_limiter());
        let tick = config.protection.rate_limit_tick();
        shutdown.spawn(move |rx| limiter.run(tick, rx));

        match self.take_event_receiver() {
            Some(events) => {
                let reporter = EventReporter::new(client, events, self.metrics_enabled());
                shutdown.spawn(move |rx| reporter.run(rx));
            }
            None => tracing::warn!("Event receiver already taken, attack events will not be reported"),
        }

        tracing::info!(
            agent_id = %self.info().id,
            tasks = shutdown.receiver_count(),
            "Agent started"
        );
        shutdown
    }

    /// Start against the HTTP control plane described by the configuration.
    pub fn start_with_cloud(&self) -> Result<Shutdown, CloudError> {
        let client = CloudClient::new(&self.config().cloud)?;
        Ok(self.start(Arc::new(client)))
    }
}
