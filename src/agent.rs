//! The protection agent.
//!
//! # Responsibilities
//! - Own configuration, policy store, rate limiter, stats and the attack
//!   event throttle for one application
//! - Expose the request-path API used by framework adapters and sinks
//! - Hand attack events to the background reporter without blocking
//!
//! # Design Decisions
//! - Cheap to clone; every clone shares the same state
//! - Independent instances never share state, so tests can build as many
//!   agents as they need
//! - The disable switch is read from configuration at construction and can
//!   be overridden at runtime

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::mpsc;

use crate::cloud::events::{AgentInfo, DetectedAttackEvent, Event};
use crate::config::{AgentConfig, ConfigError};
use crate::context::{ContextError, RequestContext, User};
use crate::observability::metrics;
use crate::policy::{PolicySnapshot, PolicyStore};
use crate::ratelimit::RateLimiter;
use crate::resilience::SlidingWindow;
use crate::routing::should_discover_route;
use crate::security::{evaluate_request, BlockDecision};
use crate::stats::StatsCollector;
use crate::vulnerabilities::Attack;

/// Handle to one protection agent.
#[derive(Clone)]
pub struct Agent {
    inner: Arc<AgentInner>,
}

struct AgentInner {
    config: AgentConfig,
    info: AgentInfo,
    disabled: AtomicBool,
    policy: PolicyStore,
    rate_limiter: Arc<RateLimiter>,
    stats: StatsCollector,
    attack_events: SlidingWindow,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<Event>>>,
}

impl Agent {
    pub fn new(config: AgentConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let dry_mode = config.protection.block != Some(true);

        let inner = AgentInner {
            info: AgentInfo::new(dry_mode),
            disabled: AtomicBool::new(config.protection.disable),
            policy: PolicyStore::new(),
            rate_limiter: Arc::new(RateLimiter::new()),
            stats: StatsCollector::new(config.reporting.max_users, config.reporting.max_hostnames),
            attack_events: SlidingWindow::new(
                config.reporting.attack_window(),
                config.reporting.max_attack_events,
            ),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            config,
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Build an agent from defaults and `SHIELD_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::new(AgentConfig::from_env()?))
    }

    pub fn config(&self) -> &AgentConfig {
        &self.inner.config
    }

    pub fn info(&self) -> &AgentInfo {
        &self.inner.info
    }

    pub fn policy(&self) -> &PolicyStore {
        &self.inner.policy
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.inner.rate_limiter
    }

    pub fn stats(&self) -> &StatsCollector {
        &self.inner.stats
    }

    pub fn is_disabled(&self) -> bool {
        self.inner.disabled.load(Ordering::Relaxed)
    }

    pub(crate) fn metrics_enabled(&self) -> bool {
        self.inner.config.observability.metrics_enabled
    }

    /// Runtime override of the disable switch.
    pub fn set_disabled(&self, disabled: bool) {
        self.inner.disabled.store(disabled, Ordering::Relaxed);
    }

    /// Whether detected attacks are blocked. A local override wins over
    /// the control plane's global mode.
    pub fn is_blocking(&self) -> bool {
        match self.inner.config.protection.block {
            Some(block) => block,
            None => self.inner.policy.current().block,
        }
    }

    /// Take the receiving end of the attack event channel. Only the first
    /// call gets it.
    pub fn take_event_receiver(&self) -> Option<mpsc::UnboundedReceiver<Event>> {
        self.inner
            .events_rx
            .lock()
            .expect("event receiver mutex poisoned")
            .take()
    }

    /// Install a policy snapshot if it is newer than the current one and
    /// rebuild the rate limiter for it.
    pub fn install_policy(&self, snapshot: PolicySnapshot) -> bool {
        let limiter = &self.inner.rate_limiter;
        self.inner
            .policy
            .install(snapshot, |installed| limiter.rebuild(&installed.endpoints))
    }

    /// Attach the authenticated user to the request.
    ///
    /// Ignored (with a warning) once the block decision ran for the request.
    pub fn set_user(
        &self,
        ctx: &RequestContext,
        id: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<(), ContextError> {
        let user = User {
            id: id.into().trim().to_string(),
            name: name.into().trim().to_string(),
        };
        if user.id.is_empty() || user.name.is_empty() {
            return Err(ContextError::EmptyUser);
        }

        {
            let mut state = ctx.state();
            if state.middleware_executed {
                drop(state);
                tracing::warn!(
                    route = %ctx.route(),
                    "set_user called after the block decision ran, ignoring"
                );
                return Ok(());
            }
            state.user = Some(user.clone());
        }

        if !self.is_disabled() {
            self.inner.stats.on_user(&user, ctx.remote_address());
        }
        Ok(())
    }

    /// Rate-limit the request under a group id instead of the user or IP.
    pub fn set_rate_limit_group(
        &self,
        ctx: &RequestContext,
        group: impl Into<String>,
    ) -> Result<(), ContextError> {
        let group = group.into().trim().to_string();
        if group.is_empty() {
            return Err(ContextError::EmptyGroup);
        }

        let mut state = ctx.state();
        if state.middleware_executed {
            drop(state);
            tracing::warn!(
                route = %ctx.route(),
                "set_rate_limit_group called after the block decision ran, ignoring"
            );
            return Ok(());
        }
        state.rate_limit_group = Some(group);
        Ok(())
    }

    /// Decide whether the request must be refused.
    ///
    /// Evaluated once per request; later calls return the same outcome
    /// without counting the request again.
    pub fn should_block_request(&self, ctx: &RequestContext) -> Option<BlockDecision> {
        if self.is_disabled() {
            return None;
        }

        let mut state = ctx.state();
        if state.middleware_executed {
            return state.block_decision.clone();
        }
        state.middleware_executed = true;

        let snapshot = self.inner.policy.current();
        let decision = evaluate_request(
            &snapshot,
            &self.inner.rate_limiter,
            ctx,
            state.user.as_ref(),
            state.rate_limit_group.as_deref(),
        );
        state.block_decision = decision.clone();
        drop(state);

        self.inner.stats.on_request();
        if self.metrics_enabled() {
            metrics::record_request();
        }

        if let Some(decision) = &decision {
            self.inner.stats.on_aborted_request();
            if matches!(decision, BlockDecision::RateLimited { .. }) {
                self.inner.stats.on_rate_limited_request();
            }
            if self.metrics_enabled() {
                metrics::record_blocked_request(decision.reason());
            }
            tracing::info!(
                reason = decision.reason(),
                method = %ctx.method(),
                route = %ctx.route(),
                ip = ctx.remote_address().unwrap_or("unknown"),
                "Blocked request"
            );
        }

        decision
    }

    /// Adapter hand-back once the response status is known.
    pub fn on_request_completed(&self, method: &str, route: &str, status: u16) {
        if self.is_disabled() {
            return;
        }
        if should_discover_route(status, route, method) {
            self.inner.stats.on_route(method, route);
        }
    }

    /// Record an outbound connection to `hostname:port`.
    pub fn on_domain(&self, hostname: &str, port: u16) {
        if self.is_disabled() {
            return;
        }
        self.inner.stats.on_hostname(hostname, port);
    }

    /// Count an attack and queue its event, subject to the hourly cap.
    pub(crate) fn report_attack(&self, ctx: Option<&RequestContext>, attack: &Attack) {
        self.inner
            .stats
            .on_attack(&attack.operation, attack.kind, attack.blocked);
        if self.metrics_enabled() {
            metrics::record_attack(attack.kind, attack.blocked);
        }

        tracing::warn!(
            kind = %attack.kind,
            operation = %attack.operation,
            source = %attack.source,
            path = %attack.path,
            blocked = attack.blocked,
            "Attack detected"
        );

        if !self.inner.attack_events.try_record(Instant::now()) {
            tracing::debug!(kind = %attack.kind, "Attack event cap reached, event dropped");
            if self.metrics_enabled() {
                metrics::record_dropped_attack_event();
            }
            return;
        }

        let event = Event::DetectedAttack(DetectedAttackEvent::new(self.inner.info.clone(), attack, ctx));
        if self.inner.events_tx.send(event).is_err() {
            tracing::debug!("Event reporter stopped, attack event not delivered");
        }
    }
}
