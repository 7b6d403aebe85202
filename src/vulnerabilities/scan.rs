//! Vulnerability scan dispatcher.
//!
//! # Responsibilities
//! - Feed every extracted user input of a request to a detector
//! - Honor force-protection-off endpoints
//! - Implement "detect now, decide later" through deferred attacks
//! - Report detections and decide whether the operation is blocked
//!
//! # Design Decisions
//! - Force-protection-off is checked before the deferred attack, so an
//!   exempt endpoint never replays a stored error
//! - A deferred attack is reported by the first call of the same kind and
//!   replayed on every later one
//! - Only the first deferred detection of a request is kept

use crate::agent::Agent;
use crate::context::RequestContext;
use crate::input::Source;
use crate::vulnerabilities::{Attack, AttackBlocked, AttackKind, DeferredAttack, Detector};

/// Per-call scan options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanOptions {
    /// Store a detection on the context instead of reporting it now. The
    /// next scan of the same kind reports it and returns its error.
    pub defer_reporting: bool,
}

impl ScanOptions {
    pub fn deferred() -> Self {
        Self {
            defer_reporting: true,
        }
    }
}

impl Agent {
    /// Scan the user input of `ctx` against one sink call.
    ///
    /// Returns `Err` only when an attack is found and blocking is enabled.
    pub fn scan<A, D>(
        &self,
        ctx: Option<&RequestContext>,
        operation: &str,
        detector: &D,
        args: &A,
    ) -> Result<(), AttackBlocked>
    where
        A: ?Sized,
        D: Detector<A> + ?Sized,
    {
        self.scan_with_options(ctx, operation, detector, args, ScanOptions::default())
    }

    pub fn scan_with_options<A, D>(
        &self,
        ctx: Option<&RequestContext>,
        operation: &str,
        detector: &D,
        args: &A,
        options: ScanOptions,
    ) -> Result<(), AttackBlocked>
    where
        A: ?Sized,
        D: Detector<A> + ?Sized,
    {
        if self.is_disabled() {
            return Ok(());
        }

        let kind = detector.kind();
        self.stats().on_operation_call(operation, kind, ctx.is_some());

        let Some(ctx) = ctx else {
            return Ok(());
        };

        if self
            .policy()
            .current()
            .protection_forced_off(ctx.method(), ctx.route())
        {
            return Ok(());
        }

        if let Some(outcome) = self.replay_deferred(ctx, kind) {
            return outcome;
        }

        let limits = self.config().protection.extract_limits();
        let mut found = None;
        'sources: for source in Source::ALL {
            for (payload, path) in ctx.user_input(source, &limits) {
                match detector.scan(payload, args) {
                    Ok(Some(detection)) => {
                        found = Some((source, payload.clone(), path.clone(), detection));
                        break 'sources;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(
                            operation = %operation,
                            kind = %kind,
                            error = %e,
                            "Detector failed, skipping input"
                        );
                        self.stats().on_detector_error(operation, kind);
                    }
                }
            }
        }

        let Some((source, payload, path, detection)) = found else {
            return Ok(());
        };

        let blocking = self.is_blocking();
        let attack = Attack {
            kind,
            operation: operation.to_string(),
            source,
            path,
            payload,
            metadata: detection.metadata,
            blocked: blocking,
        };
        let error = blocking.then(|| AttackBlocked::from(&attack));

        if options.defer_reporting {
            let mut state = ctx.state();
            if state.deferred_attack.is_none() {
                state.deferred_attack = Some(DeferredAttack {
                    attack,
                    error,
                    reported: false,
                });
            }
            return Ok(());
        }

        self.report_attack(Some(ctx), &attack);
        match error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Report a stored attack of the same kind at most once and return its
    /// stored outcome. `None` when there is nothing to replay.
    fn replay_deferred(
        &self,
        ctx: &RequestContext,
        kind: AttackKind,
    ) -> Option<Result<(), AttackBlocked>> {
        let (attack, error, first) = {
            let mut state = ctx.state();
            let deferred = state.deferred_attack.as_mut()?;
            if deferred.attack.kind != kind {
                return None;
            }
            let first = !deferred.reported;
            deferred.reported = true;
            (deferred.attack.clone(), deferred.error.clone(), first)
        };

        if first {
            self.report_attack(Some(ctx), &attack);
        }
        Some(match error {
            Some(error) => Err(error),
            None => Ok(()),
        })
    }
}
