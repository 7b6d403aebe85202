//! Events sent to the control plane.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::context::{RequestContext, User};
use crate::input::Source;
use crate::stats::{unix_millis, StatsSnapshot};
use crate::vulnerabilities::{Attack, AttackKind};

/// Longest payload sent with an attack event, in characters.
pub const MAX_PAYLOAD_CHARS: usize = 4096;

/// Headers never forwarded with an attack event.
const REDACTED_HEADERS: &[&str] = &["authorization", "cookie", "proxy-authorization"];

/// Identity of this agent instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInfo {
    /// Random per-process id.
    pub id: String,
    pub library: String,
    pub version: String,
    pub hostname: String,
    pub platform: PlatformInfo,
    /// Detect-only mode: attacks are reported but never blocked.
    pub dry_mode: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformInfo {
    pub os: String,
    pub arch: String,
}

impl AgentInfo {
    pub fn new(dry_mode: bool) -> Self {
        let hostname = std::env::var("HOSTNAME")
            .or_else(|_| std::env::var("COMPUTERNAME"))
            .unwrap_or_else(|_| "unknown".to_string());

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            library: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            hostname,
            platform: PlatformInfo {
                os: std::env::consts::OS.to_string(),
                arch: std::env::consts::ARCH.to_string(),
            },
            dry_mode,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Started(StartedEvent),
    Heartbeat(HeartbeatEvent),
    DetectedAttack(DetectedAttackEvent),
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Started(_) => "started",
            Event::Heartbeat(_) => "heartbeat",
            Event::DetectedAttack(_) => "detected_attack",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StartedEvent {
    pub agent: AgentInfo,
    pub time: u64,
}

impl StartedEvent {
    pub fn new(agent: AgentInfo) -> Self {
        Self {
            agent,
            time: unix_millis(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HeartbeatEvent {
    pub agent: AgentInfo,
    pub stats: StatsSnapshot,
    pub time: u64,
}

impl HeartbeatEvent {
    pub fn new(agent: AgentInfo, stats: StatsSnapshot) -> Self {
        Self {
            agent,
            stats,
            time: unix_millis(),
        }
    }
}

/// The request an attack was found in, as far as it is safe to share.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackRequest {
    pub method: String,
    pub url: String,
    pub route: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub headers: BTreeMap<String, Vec<String>>,
    /// Framework adapter that built the request context.
    pub source: String,
}

impl AttackRequest {
    pub fn from_context(ctx: &RequestContext) -> Self {
        let headers = ctx
            .headers()
            .iter()
            .filter(|(name, _)| !REDACTED_HEADERS.contains(&name.as_str()))
            .map(|(name, values)| (name.clone(), values.clone()))
            .collect();

        Self {
            method: ctx.method().to_string(),
            url: ctx.url().to_string(),
            route: ctx.route().to_string(),
            ip_address: ctx.remote_address().map(str::to_string),
            user_agent: ctx.user_agent().map(str::to_string),
            headers,
            source: ctx.source().to_string(),
        }
    }
}

/// Attack details as sent over the wire.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportedAttack {
    pub kind: AttackKind,
    pub operation: String,
    pub source: Source,
    pub path: String,
    pub payload: String,
    pub metadata: BTreeMap<String, String>,
    pub blocked: bool,
    pub user: Option<User>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetectedAttackEvent {
    pub agent: AgentInfo,
    pub attack: ReportedAttack,
    pub request: Option<AttackRequest>,
    pub time: u64,
}

impl DetectedAttackEvent {
    pub fn new(agent: AgentInfo, attack: &Attack, ctx: Option<&RequestContext>) -> Self {
        Self {
            agent,
            attack: ReportedAttack {
                kind: attack.kind,
                operation: attack.operation.clone(),
                source: attack.source,
                path: attack.path.clone(),
                payload: truncate_chars(&attack.payload, MAX_PAYLOAD_CHARS),
                metadata: attack.metadata.clone(),
                blocked: attack.blocked,
                user: ctx.and_then(RequestContext::user),
            },
            request: ctx.map(AttackRequest::from_context),
            time: unix_millis(),
        }
    }
}

fn truncate_chars(value: &str, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((end, _)) => value[..end].to_string(),
        None => value.to_string(),
    }
}
