use chrono::{TimeDelta, Utc};
use std::time::Duration;

use super::*;
use crate::config::TiersConfig;
use crate::tier::Tier;

const WINDOW: Duration = Duration::from_secs(3600);

fn draft(tier: Tier, cost: f64, counterfactual: f64, cache_hit: bool, reason: &str) -> UsageDraft {
    UsageDraft {
        tier,
        input_tokens: 1_000,
        output_tokens: 1_000,
        cost,
        counterfactual_cost: counterfactual,
        cache_hit,
        routing_reason: reason.to_string(),
        latency_ms: 42,
    }
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[tokio::test]
async fn test_record_is_nonblocking_and_appends() {
    let tracker = CostTracker::new();

    tracker.record(draft(Tier::Cheap, 0.001, 0.01, false, "length_based"));
    tracker.flush().await;

    assert_eq!(tracker.len(), 1);
    assert_eq!(tracker.anomaly_count(), 0);
}

#[tokio::test]
async fn test_scripted_sequence_totals_check_out() {
    let tiers = TiersConfig::default();
    let tracker = CostTracker::new();

    // Two paid Cheap calls and one cache hit that would have gone to Mid,
    // each at 1k input and 1k output tokens.
    let cheap_cost = tiers.cost(Tier::Cheap, 1_000, 1_000);
    let mid_cost = tiers.cost(Tier::Mid, 1_000, 1_000);
    let premium_cost = tiers.cost(Tier::Premium, 1_000, 1_000);

    tracker.record(draft(Tier::Cheap, cheap_cost, premium_cost, false, "length_based"));
    tracker.record(draft(Tier::Cheap, cheap_cost, premium_cost, false, "length_based"));
    tracker.record(draft(Tier::Mid, 0.0, mid_cost, true, "cache_hit"));
    tracker.flush().await;

    let summary = tracker.summarize(WINDOW);

    assert_eq!(summary.total_requests, 3);
    assert_eq!(summary.cache_hits, 1);

    // Hand-checked against the default pricing table:
    // cheap 1k/1k = 0.00015 + 0.0006, mid = 0.0025 + 0.01,
    // premium = 0.003 + 0.015.
    assert!(approx(summary.total_cost, 0.0015));
    assert!(approx(summary.cache_savings, 0.0125));
    assert!(approx(summary.routing_savings, 2.0 * (0.018 - 0.000_75)));
    assert!(approx(
        summary.total_savings,
        summary.cache_savings + summary.routing_savings
    ));
    assert!(approx(
        summary.total_counterfactual_cost,
        summary.total_cost + summary.total_savings
    ));
}

#[tokio::test]
async fn test_summary_per_tier_distribution() {
    let tracker = CostTracker::new();

    tracker.record(draft(Tier::Cheap, 0.001, 0.018, false, "length_based"));
    tracker.record(draft(Tier::Premium, 0.018, 0.018, false, "fallback_premium"));
    tracker.record(draft(Tier::Premium, 0.018, 0.018, false, "manual/session"));
    tracker.flush().await;

    let summary = tracker.summarize(WINDOW);

    assert_eq!(summary.per_tier[&Tier::Cheap].requests, 1);
    assert_eq!(summary.per_tier[&Tier::Premium].requests, 2);
    assert_eq!(summary.per_tier[&Tier::Premium].input_tokens, 2_000);
    assert!(approx(summary.per_tier[&Tier::Premium].cost, 0.036));
    assert!(!summary.per_tier.contains_key(&Tier::Mid));
    // Premium-routed calls save nothing.
    assert!(approx(summary.routing_savings, 0.017));
}

#[tokio::test]
async fn test_failed_attempt_recorded_at_zero_cost() {
    let tracker = CostTracker::new();

    tracker.record(UsageDraft {
        tier: Tier::Mid,
        input_tokens: 0,
        output_tokens: 0,
        cost: 0.0,
        counterfactual_cost: 0.0,
        cache_hit: false,
        routing_reason: "task_type".to_string(),
        latency_ms: 17,
    });
    tracker.flush().await;

    let summary = tracker.summarize(WINDOW);
    assert_eq!(summary.total_requests, 1);
    assert!(approx(summary.total_cost, 0.0));
    assert!(approx(summary.total_savings, 0.0));
}

#[tokio::test]
async fn test_summarize_excludes_records_outside_window() {
    let tracker = CostTracker::new();

    tracker.record(draft(Tier::Cheap, 0.001, 0.018, false, "length_based"));
    tracker.flush().await;

    // Records land stamped with "now", so a zero-width window excludes them
    // and the default window includes them.
    let empty = tracker.summarize(Duration::ZERO);
    let full = tracker.summarize(WINDOW);

    assert_eq!(empty.total_requests, 0);
    assert_eq!(full.total_requests, 1);
}

#[tokio::test]
async fn test_hourly_buckets_cover_all_records() {
    let tracker = CostTracker::new();

    for _ in 0..5 {
        tracker.record(draft(Tier::Cheap, 0.001, 0.018, false, "length_based"));
    }
    tracker.flush().await;

    let summary = tracker.summarize(WINDOW);
    let bucketed: u64 = summary.hourly.iter().map(|b| b.requests).sum();

    assert_eq!(bucketed, summary.total_requests);
    assert!(!summary.hourly.is_empty());
    assert!(summary.hourly.len() <= 2);
}

#[tokio::test]
async fn test_purge_drops_only_expired_rows() {
    let tracker = CostTracker::new();

    tracker.record(draft(Tier::Cheap, 0.001, 0.018, false, "length_based"));
    tracker.flush().await;

    assert_eq!(tracker.purge_older_than(Utc::now() - TimeDelta::days(30)), 0);
    assert_eq!(tracker.len(), 1);

    assert_eq!(tracker.purge_older_than(Utc::now() + TimeDelta::seconds(1)), 1);
    assert!(tracker.is_empty());
}
