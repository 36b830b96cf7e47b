use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::tier::Tier;

/// One usage event, before the ledger stamps it.
///
/// Costs are computed by the caller from the pricing table active for that
/// request, so a concurrent config reload never reprices an in-flight event.
#[derive(Debug, Clone)]
pub struct UsageDraft {
    pub tier: Tier,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Actual spend for this event; zero for cache hits and failed attempts.
    pub cost: f64,
    /// What the event would have cost without this system: the Premium price
    /// for the same tokens, or for a cache hit, the price of the tier that
    /// would otherwise have been invoked.
    pub counterfactual_cost: f64,
    pub cache_hit: bool,
    pub routing_reason: String,
    pub latency_ms: u64,
}

/// An immutable ledger row. Never mutated after the writer appends it;
/// removed only by retention purges.
#[derive(Debug, Clone, Serialize)]
pub struct UsageRecord {
    pub recorded_at: DateTime<Utc>,
    pub tier: Tier,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
    pub counterfactual_cost: f64,
    pub cache_hit: bool,
    pub routing_reason: String,
    pub latency_ms: u64,
}

impl UsageDraft {
    pub(super) fn into_record(self, recorded_at: DateTime<Utc>) -> UsageRecord {
        UsageRecord {
            recorded_at,
            tier: self.tier,
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
            cost: self.cost,
            counterfactual_cost: self.counterfactual_cost,
            cache_hit: self.cache_hit,
            routing_reason: self.routing_reason,
            latency_ms: self.latency_ms,
        }
    }
}

/// Per-tier slice of a [`CostSummary`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct TierUsage {
    pub requests: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
}

/// One hour of activity inside a summary window.
#[derive(Debug, Clone, Serialize)]
pub struct HourlyBucket {
    pub hour_start: DateTime<Utc>,
    pub requests: u64,
    pub cost: f64,
    pub savings: f64,
}

/// Aggregated view of the ledger over a time window.
///
/// `cache_savings` and `routing_savings` are disjoint and additive:
/// `total_savings = cache_savings + routing_savings`.
#[derive(Debug, Clone, Serialize)]
pub struct CostSummary {
    pub window_secs: u64,
    pub total_requests: u64,
    pub cache_hits: u64,
    pub total_cost: f64,
    pub total_counterfactual_cost: f64,
    /// Savings from answers served out of the cache (no tokens spent).
    pub cache_savings: f64,
    /// Savings from routing paid calls below Premium.
    pub routing_savings: f64,
    pub total_savings: f64,
    pub per_tier: BTreeMap<Tier, TierUsage>,
    pub hourly: Vec<HourlyBucket>,
}

impl CostSummary {
    /// Builds a summary from the records inside the window. `records` must
    /// already be filtered to the window.
    pub(super) fn from_records(records: &[UsageRecord], window_secs: u64) -> Self {
        let mut summary = Self {
            window_secs,
            total_requests: 0,
            cache_hits: 0,
            total_cost: 0.0,
            total_counterfactual_cost: 0.0,
            cache_savings: 0.0,
            routing_savings: 0.0,
            total_savings: 0.0,
            per_tier: BTreeMap::new(),
            hourly: Vec::new(),
        };

        let mut hourly: BTreeMap<DateTime<Utc>, HourlyBucket> = BTreeMap::new();

        for record in records {
            summary.total_requests += 1;
            summary.total_cost += record.cost;
            summary.total_counterfactual_cost += record.counterfactual_cost;

            let saved = record.counterfactual_cost - record.cost;
            if record.cache_hit {
                summary.cache_hits += 1;
                summary.cache_savings += saved;
            } else {
                summary.routing_savings += saved;
            }

            let tier = summary.per_tier.entry(record.tier).or_default();
            tier.requests += 1;
            tier.input_tokens += record.input_tokens;
            tier.output_tokens += record.output_tokens;
            tier.cost += record.cost;

            let hour_start = record
                .recorded_at
                .duration_trunc(TimeDelta::hours(1))
                .unwrap_or(record.recorded_at);
            let bucket = hourly.entry(hour_start).or_insert(HourlyBucket {
                hour_start,
                requests: 0,
                cost: 0.0,
                savings: 0.0,
            });
            bucket.requests += 1;
            bucket.cost += record.cost;
            bucket.savings += saved;
        }

        summary.total_savings = summary.cache_savings + summary.routing_savings;
        summary.hourly = hourly.into_values().collect();
        summary
    }
}
