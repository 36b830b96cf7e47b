//! Tier routing: an ordered, pluggable rule set.
//!
//! Rules are pure and synchronous; the engine never performs I/O and never
//! fails. A rule that cannot decide returns `None` and the next rule (by
//! ascending priority number, then registration order) gets a look. When no
//! rule fires the engine falls back to Premium: fail toward quality, not
//! cost.

pub mod engine;
pub mod rules;


pub use engine::RoutingEngine;
pub use rules::{ComplexityRule, LengthRule, RoutingRule, TaskTypeRule};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use crate::tier::Tier;

/// Reason recorded when an escalation override preempts the rule set.
pub const REASON_MANUAL_PREFIX: &str = "manual";

/// Reason recorded when no rule fires.
pub const REASON_FALLBACK: &str = "fallback_premium";

/// Reason recorded for the empty-text fast path.
pub const REASON_EMPTY_QUERY: &str = "empty_query";

/// The outcome of routing one query.
#[derive(Debug, Clone, Serialize)]
pub struct RoutingDecision {
    pub tier: Tier,
    /// Name of the rule that matched, or one of the `REASON_*` constants.
    pub rule_name: String,
    pub decided_at: DateTime<Utc>,
    /// Wall-clock time spent inside the engine.
    pub latency: Duration,
}

impl RoutingDecision {
    /// Returns `true` if this decision came from a manual override rather
    /// than the rule set.
    pub fn is_manual(&self) -> bool {
        self.rule_name.starts_with(REASON_MANUAL_PREFIX)
    }
}
