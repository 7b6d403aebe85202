//! Background delivery of attack events.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};

use crate::cloud::client::{CloudError, ControlPlane};
use crate::cloud::events::Event;
use crate::observability::metrics;

/// Drains the agent's event channel and posts each event.
///
/// The request path only ever does a non-blocking send into the channel.
pub struct EventReporter {
    client: Arc<dyn ControlPlane>,
    events: mpsc::UnboundedReceiver<Event>,
    metrics_enabled: bool,
}

impl EventReporter {
    pub fn new(
        client: Arc<dyn ControlPlane>,
        events: mpsc::UnboundedReceiver<Event>,
        metrics_enabled: bool,
    ) -> Self {
        Self {
            client,
            events,
            metrics_enabled,
        }
    }

    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => self.deliver(event).await,
                    None => break,
                },
                _ = shutdown.recv() => {
                    // Flush what was queued before the signal.
                    while let Ok(event) = self.events.try_recv() {
                        self.deliver(event).await;
                    }
                    tracing::debug!("Event reporter received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    async fn deliver(&self, event: Event) {
        match self.client.send_event(&event).await {
            Ok(_) => tracing::debug!(event = event.name(), "Delivered event"),
            Err(CloudError::MissingToken) => {}
            Err(e) => {
                tracing::warn!(event = event.name(), error = %e, "Failed to deliver event");
                if self.metrics_enabled {
                    metrics::record_control_plane_error("send_event");
                }
            }
        }
    }
}
