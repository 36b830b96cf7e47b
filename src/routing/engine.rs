//! Rule evaluation engine.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, instrument, warn};

use super::rules::{ComplexityRule, LengthRule, RoutingRule, TaskTypeRule};
use super::{REASON_EMPTY_QUERY, REASON_FALLBACK, REASON_MANUAL_PREFIX, RoutingDecision};
use crate::config::RoutingConfig;
use crate::escalation::Override;
use crate::query::Query;
use crate::tier::Tier;

/// Evaluates registered rules in priority order and picks a tier.
///
/// Stateless between calls; safe to share across request tasks without any
/// lock.
pub struct RoutingEngine {
    rules: Vec<Box<dyn RoutingRule>>,
}

impl RoutingEngine {
    /// Builds an engine with the enabled built-in rules from config.
    pub fn from_config(config: &RoutingConfig) -> Self {
        let mut engine = Self::empty();

        if config.rules.complexity.enabled {
            engine.register(Box::new(ComplexityRule::new(&config.rules.complexity)));
        }
        if config.rules.task_type.enabled {
            engine.register(Box::new(TaskTypeRule::new(&config.rules.task_type)));
        }
        if config.rules.length.enabled {
            engine.register(Box::new(LengthRule::new(&config.rules.length)));
        }

        engine
    }

    /// An engine with no rules; every query falls back to Premium.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Registers a rule. Rules are re-sorted by priority; among equal
    /// priorities, earlier registration wins (stable sort).
    pub fn register(&mut self, rule: Box<dyn RoutingRule>) {
        self.rules.push(rule);
        self.rules.sort_by_key(|r| r.priority());
    }

    /// Returns the registered rule names in evaluation order.
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Routes a query with an already-resolved escalation override.
    ///
    /// An override short-circuits the rule set entirely; the decision records
    /// a `manual/<source>` reason.
    pub fn route_with_override(
        &self,
        query: &Query,
        escalation: Option<&Override>,
    ) -> RoutingDecision {
        let started = Instant::now();

        if let Some(escalation) = escalation {
            return RoutingDecision {
                tier: escalation.tier,
                rule_name: format!("{}/{}", REASON_MANUAL_PREFIX, escalation.source.as_str()),
                decided_at: Utc::now(),
                latency: started.elapsed(),
            };
        }

        self.route_automatic(query, started)
    }

    /// Routes a query through the rule set alone.
    #[instrument(skip(self, query), fields(query_id = %query.id, task_type = ?query.task_type))]
    pub fn route(&self, query: &Query) -> RoutingDecision {
        self.route_automatic(query, Instant::now())
    }

    fn route_automatic(&self, query: &Query, started: Instant) -> RoutingDecision {
        if query.is_empty_text() {
            return RoutingDecision {
                tier: Tier::Cheap,
                rule_name: REASON_EMPTY_QUERY.to_string(),
                decided_at: Utc::now(),
                latency: started.elapsed(),
            };
        }

        for rule in &self.rules {
            // A panicking rule is skipped, never allowed to abort routing.
            let verdict = match catch_unwind(AssertUnwindSafe(|| rule.evaluate(query))) {
                Ok(verdict) => verdict,
                Err(_) => {
                    warn!(rule = rule.name(), "routing rule panicked, skipping");
                    continue;
                }
            };

            if let Some(tier) = verdict {
                debug!(rule = rule.name(), tier = %tier, "rule matched");
                return RoutingDecision {
                    tier,
                    rule_name: rule.name().to_string(),
                    decided_at: Utc::now(),
                    latency: started.elapsed(),
                };
            }
        }

        debug!("no rule fired, falling back to premium");
        RoutingDecision {
            tier: Tier::Premium,
            rule_name: REASON_FALLBACK.to_string(),
            decided_at: Utc::now(),
            latency: started.elapsed(),
        }
    }
}

impl std::fmt::Debug for RoutingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutingEngine")
            .field("rules", &self.rule_names())
            .finish()
    }
}
