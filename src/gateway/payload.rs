use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cache::CacheEntry;
use crate::query::TaskType;
use crate::tier::Tier;

use super::error::GatewayError;

/// Body of `POST /v1/route`.
#[derive(Debug, Deserialize)]
pub struct RouteRequest {
    pub text: String,
    /// Cache scope, e.g. a project or session key. Required; lookups never
    /// cross scopes, so there is no implicit global scope to fall back to.
    pub scope: String,
    #[serde(default)]
    pub task_type: TaskType,
    pub token_estimate: Option<u32>,
    pub session_id: Option<String>,
    /// Explicit tier override, lowest-precedence escalation source.
    pub tier_override: Option<Tier>,
    pub context_ref: Option<String>,
}

impl RouteRequest {
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.scope.trim().is_empty() {
            return Err(GatewayError::InvalidRequest(
                "scope must be a non-empty string".to_string(),
            ));
        }
        Ok(())
    }
}

/// Body of a successful `POST /v1/route`.
#[derive(Debug, Serialize)]
pub struct RouteResponse {
    pub query_id: Uuid,
    pub response: String,
    pub tier: Tier,
    pub cache_hit: bool,
    pub cost: f64,
    pub routing_reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_entry_id: Option<u64>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum EscalateAction {
    Pin,
    Clear,
}

/// Body of `POST /v1/escalate`.
#[derive(Debug, Deserialize)]
pub struct EscalateRequest {
    pub session_id: String,
    pub action: EscalateAction,
    /// Required for `pin`, ignored for `clear`.
    pub tier: Option<Tier>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EscalateResponse {
    pub session_id: String,
    /// Tier now pinned for the session, if any.
    pub pinned: Option<Tier>,
}

/// Query string of `GET /v1/cost/summary`.
#[derive(Debug, Deserialize)]
pub struct CostSummaryQuery {
    /// Trailing window in seconds; defaults to 24 hours.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

fn default_window_secs() -> u64 {
    86_400
}

/// Body of `POST /v1/cache/admin`, one operation per call.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum CacheAdminRequest {
    /// Drop every entry.
    Clear,
    /// Drop entries whose scope matches; a trailing `*` is a prefix match.
    ClearPattern { pattern: String },
    /// Entry count, hit rate, average age.
    Stats,
    /// Dump all entries for backup or migration.
    Export,
    /// Restore a previous export.
    Import { entries: Vec<CacheEntry> },
    /// Update one entry's quality score.
    Feedback { entry_id: u64, quality_score: f32 },
    /// Run a full eviction pass now.
    Evict,
}

/// Body of `POST /v1/config/reload`.
#[derive(Debug, Serialize)]
pub struct ConfigReloadResponse {
    /// Version of the now-active config.
    pub version: u64,
}
