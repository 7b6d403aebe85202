//! Per-request block decision.
//!
//! # Responsibilities
//! - Combine the policy snapshot, endpoint matcher and rate limiter into a
//!   single allow/block outcome
//! - Describe a block in a form an adapter can turn into a response
//!
//! # Design Decisions
//! - Checks run in a fixed order and the first block wins
//! - Private and bypassed addresses skip every later check
//! - The rate limiter is consulted before counting, so a blocked request
//!   does not extend its own penalty

use std::fmt;

use crate::context::{RequestContext, User};
use crate::policy::PolicySnapshot;
use crate::ratelimit::{RateLimitTrigger, RateLimiter};
use crate::security::is_private_ip_str;

/// Why a request is refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockDecision {
    /// The client IP is on a named blocklist.
    BlockedIp { ip: String, reason: String },
    BlockedUserAgent { user_agent: String },
    BlockedUser { user_id: String },
    /// An endpoint allow-list exists and the client IP is not on it.
    IpNotAllowed { ip: String },
    RateLimited {
        trigger: RateLimitTrigger,
        ip: Option<String>,
    },
}

impl BlockDecision {
    /// HTTP status an adapter should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            BlockDecision::RateLimited { .. } => 429,
            _ => 403,
        }
    }

    /// Short label for logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            BlockDecision::BlockedIp { .. } => "blocked_ip",
            BlockDecision::BlockedUserAgent { .. } => "blocked_user_agent",
            BlockDecision::BlockedUser { .. } => "blocked_user",
            BlockDecision::IpNotAllowed { .. } => "ip_not_allowed",
            BlockDecision::RateLimited { .. } => "rate_limited",
        }
    }

    /// Response body shown to the client.
    pub fn message(&self) -> String {
        match self {
            BlockDecision::BlockedIp { ip, reason } => {
                format!("Your IP address is blocked due to {} (Your IP: {})", reason, ip)
            }
            BlockDecision::BlockedUserAgent { .. } => {
                "You are not allowed to access this resource because you have been identified as a bot."
                    .to_string()
            }
            BlockDecision::BlockedUser { .. } => "You are blocked by Runtime Shield.".to_string(),
            BlockDecision::IpNotAllowed { ip } => format!(
                "Your IP address is not allowed to access this resource. (Your IP: {})",
                ip
            ),
            BlockDecision::RateLimited { trigger, ip } => match (trigger, ip) {
                (RateLimitTrigger::Ip, Some(ip)) => format!(
                    "You are rate limited by Runtime Shield. (Your IP: {})",
                    ip
                ),
                _ => "You are rate limited by Runtime Shield.".to_string(),
            },
        }
    }
}

impl fmt::Display for BlockDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// Decide whether a request is refused.
///
/// `user` and `group` are passed in rather than read from `ctx` so the
/// caller may hold the context's state lock for the whole evaluation.
/// Counts the request against the rate limit of the first matching
/// endpoint when it is not blocked.
pub fn evaluate_request(
    snapshot: &PolicySnapshot,
    limiter: &RateLimiter,
    ctx: &RequestContext,
    user: Option<&User>,
    group: Option<&str>,
) -> Option<BlockDecision> {
    let ip = ctx.remote_address();

    if let Some(ip) = ip {
        if is_private_ip_str(ip) || snapshot.is_ip_bypassed(ip) {
            return None;
        }
        if let Some(reason) = snapshot.ip_block_reason(ip) {
            return Some(BlockDecision::BlockedIp {
                ip: ip.to_string(),
                reason: reason.to_string(),
            });
        }
    }

    if let Some(user_agent) = ctx.user_agent() {
        if snapshot.is_user_agent_blocked(user_agent) {
            return Some(BlockDecision::BlockedUserAgent {
                user_agent: user_agent.to_string(),
            });
        }
    }

    if let Some(user) = user {
        if snapshot.is_user_blocked(&user.id) {
            return Some(BlockDecision::BlockedUser {
                user_id: user.id.clone(),
            });
        }
    }

    let endpoints = snapshot.matching_endpoints(ctx.method(), ctx.route());

    if let Some(ip) = ip {
        let refused = endpoints.iter().any(|endpoint| {
            let allowed = endpoint.allowed_ips();
            !allowed.is_empty() && !allowed.matches_str(ip)
        });
        if refused {
            return Some(BlockDecision::IpNotAllowed { ip: ip.to_string() });
        }
    }

    let endpoint = endpoints.first()?;
    if !endpoint.rate_limiting().enabled {
        return None;
    }

    let (key, is_group) = match (group, user) {
        (Some(group), _) => (Some(format!("group:{}", group)), true),
        (None, Some(user)) => (Some(user.id.clone()), false),
        (None, None) => (None, false),
    };

    let status = limiter.get_status(endpoint.method(), endpoint.route(), key.as_deref(), ip);
    if status.block {
        let trigger = match (is_group, status.trigger) {
            (true, _) => RateLimitTrigger::Group,
            (false, Some(trigger)) => trigger,
            (false, None) => RateLimitTrigger::Ip,
        };
        return Some(BlockDecision::RateLimited {
            trigger,
            ip: ip.map(str::to_string),
        });
    }

    limiter.update_counts(endpoint.method(), endpoint.route(), key.as_deref(), ip);
    None
}
