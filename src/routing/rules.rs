//! Built-in routing rules.

use crate::config::{ComplexityRuleConfig, LengthRuleConfig, TaskTypeRuleConfig};
use crate::query::{Query, TaskType};
use crate::tier::Tier;
use std::collections::HashMap;

/// A single routing heuristic.
///
/// Implementations must be pure: no I/O, no interior mutation observable
/// across calls. A future learned scorer is just another implementation
/// registered with a priority; the engine needs no changes.
pub trait RoutingRule: Send + Sync {
    /// Stable rule name, recorded in the routing decision and the ledger.
    fn name(&self) -> &'static str;

    /// Ascending evaluation order; lower runs first.
    fn priority(&self) -> u32;

    /// Returns the tier this rule selects, or `None` to pass.
    fn evaluate(&self, query: &Query) -> Option<Tier>;
}

/// Escalates on indicator substrings in the query text.
///
/// Runs before the length heuristic by default: a short "refactor the auth
/// module" query is premium work regardless of its size.
pub struct ComplexityRule {
    priority: u32,
    premium_markers: Vec<String>,
    mid_markers: Vec<String>,
}

impl ComplexityRule {
    pub fn new(config: &ComplexityRuleConfig) -> Self {
        Self {
            priority: config.priority,
            premium_markers: config
                .premium_markers
                .iter()
                .map(|m| m.to_lowercase())
                .collect(),
            mid_markers: config.mid_markers.iter().map(|m| m.to_lowercase()).collect(),
        }
    }
}

impl RoutingRule for ComplexityRule {
    fn name(&self) -> &'static str {
        "complexity_based"
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    fn evaluate(&self, query: &Query) -> Option<Tier> {
        let text = query.text.to_lowercase();

        if self.premium_markers.iter().any(|m| text.contains(m)) {
            return Some(Tier::Premium);
        }
        if self.mid_markers.iter().any(|m| text.contains(m)) {
            return Some(Tier::Mid);
        }
        None
    }
}

/// Direct task-type to tier mapping. Unmapped task types pass.
pub struct TaskTypeRule {
    priority: u32,
    map: HashMap<TaskType, Tier>,
}

impl TaskTypeRule {
    pub fn new(config: &TaskTypeRuleConfig) -> Self {
        Self {
            priority: config.priority,
            map: config.map.clone(),
        }
    }
}

impl RoutingRule for TaskTypeRule {
    fn name(&self) -> &'static str {
        "task_type"
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    fn evaluate(&self, query: &Query) -> Option<Tier> {
        self.map.get(&query.task_type).copied()
    }
}

/// Estimated-token thresholds per tier. Always decides, so it terminates the
/// default chain; longer queries never map to a lower tier than shorter ones.
pub struct LengthRule {
    priority: u32,
    cheap_max_tokens: u32,
    mid_max_tokens: u32,
}

impl LengthRule {
    pub fn new(config: &LengthRuleConfig) -> Self {
        Self {
            priority: config.priority,
            cheap_max_tokens: config.cheap_max_tokens,
            mid_max_tokens: config.mid_max_tokens,
        }
    }
}

impl RoutingRule for LengthRule {
    fn name(&self) -> &'static str {
        "length_based"
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    fn evaluate(&self, query: &Query) -> Option<Tier> {
        let tokens = query.estimated_tokens();

        if tokens <= self.cheap_max_tokens {
            Some(Tier::Cheap)
        } else if tokens <= self.mid_max_tokens {
            Some(Tier::Mid)
        } else {
            Some(Tier::Premium)
        }
    }
}
