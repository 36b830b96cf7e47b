//! Composite eviction: TTL sweep, then quality, then LRU, then compaction.
//!
//! Planning is pure and works on metadata snapshots, so each step is
//! testable without an index or an embedder. Application (batch deletes,
//! yields, compaction) lives on [`super::SemanticCache`].

use chrono::{DateTime, Utc};
use std::time::Duration;

use super::entry::DEFAULT_QUALITY_SCORE;
use crate::config::CacheSettings;

/// Entries removed per write-lock critical section during eviction.
pub const EVICT_BATCH_SIZE: usize = 128;

/// The eviction-relevant slice of a [`super::CacheEntry`].
#[derive(Debug, Clone)]
pub struct EntryMeta {
    pub id: u64,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub ttl: Duration,
    pub quality_score: f32,
}

impl EntryMeta {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        (now - self.created_at).to_std().unwrap_or(Duration::ZERO) >= self.ttl
    }
}

/// Victim ids per step, in the order the steps selected them.
#[derive(Debug, Default)]
pub struct EvictionPlan {
    pub expired: Vec<u64>,
    pub quality: Vec<u64>,
    pub lru: Vec<u64>,
}

impl EvictionPlan {
    /// All victim ids across the three steps.
    pub fn victims(&self) -> Vec<u64> {
        let mut ids =
            Vec::with_capacity(self.expired.len() + self.quality.len() + self.lru.len());
        ids.extend_from_slice(&self.expired);
        ids.extend_from_slice(&self.quality);
        ids.extend_from_slice(&self.lru);
        ids
    }

    pub fn is_empty(&self) -> bool {
        self.expired.is_empty() && self.quality.is_empty() && self.lru.is_empty()
    }
}

/// Outcome of one full eviction pass.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct EvictionReport {
    pub expired_removed: usize,
    pub quality_removed: usize,
    pub lru_removed: usize,
    pub remaining: usize,
    pub compacted: bool,
}

/// Computes the victims for one eviction pass over a metadata snapshot.
///
/// Step order is fixed. The TTL sweep is unconditional on size; the quality
/// step removes entries rated below neutral, worst first, but only while the
/// cache is over `max_entries`; the LRU step reclaims whatever overflow the
/// quality step left. Disabled steps select nothing and the next step
/// absorbs their share.
pub fn plan(meta: &[EntryMeta], settings: &CacheSettings, now: DateTime<Utc>) -> EvictionPlan {
    let mut plan = EvictionPlan::default();

    let mut live: Vec<&EntryMeta> = if settings.evict_expired {
        let (expired, live): (Vec<&EntryMeta>, Vec<&EntryMeta>) =
            meta.iter().partition(|m| m.is_expired(now));
        plan.expired = expired.into_iter().map(|m| m.id).collect();
        live
    } else {
        meta.iter().collect()
    };

    let mut overflow = live.len().saturating_sub(settings.max_entries);
    if overflow == 0 {
        return plan;
    }

    if settings.evict_by_quality {
        live.sort_by(|a, b| {
            a.quality_score
                .partial_cmp(&b.quality_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });

        let below_neutral = live
            .iter()
            .take_while(|m| m.quality_score < DEFAULT_QUALITY_SCORE)
            .count();
        let take = overflow.min(below_neutral);

        plan.quality = live.drain(..take).map(|m| m.id).collect();
        overflow -= take;
    }

    if overflow > 0 && settings.evict_by_lru {
        live.sort_by(|a, b| {
            a.last_accessed_at
                .cmp(&b.last_accessed_at)
                .then(a.id.cmp(&b.id))
        });

        plan.lru = live.drain(..overflow).map(|m| m.id).collect();
    }

    plan
}
