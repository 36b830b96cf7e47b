use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::tier::Tier;

/// Quality score assigned to entries that have received no feedback yet.
pub const DEFAULT_QUALITY_SCORE: f32 = 0.5;

/// The reusable payload of a cache entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CachedResponse {
    /// Model response text.
    pub text: String,
    /// Prompt tokens consumed when the response was produced.
    pub input_tokens: u64,
    /// Completion tokens consumed when the response was produced.
    pub output_tokens: u64,
}

/// A stored query/response pair plus the metadata eviction runs on.
///
/// Entries serialize losslessly, so `export` and `import` reuse this type
/// directly instead of a separate wire form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Stable id derived from scope and normalized query text.
    pub id: u64,
    /// Embedding of the original query text.
    pub embedding: Vec<f32>,
    /// Cached model response.
    pub response: CachedResponse,
    /// Tier that produced the response.
    pub source_tier: Tier,
    /// Scope the entry belongs to. Lookups never cross scopes.
    pub scope: String,
    /// Creation time; TTL counts from here, not from last access.
    pub created_at: DateTime<Utc>,
    /// Last hit time, used for LRU ordering.
    pub last_accessed_at: DateTime<Utc>,
    /// Time-to-live from `created_at`.
    pub ttl: Duration,
    /// Feedback-adjusted quality in `[0, 1]`.
    pub quality_score: f32,
    /// Number of lookups served by this entry.
    pub hit_count: u64,
}

impl CacheEntry {
    pub fn new(
        id: u64,
        embedding: Vec<f32>,
        response: CachedResponse,
        source_tier: Tier,
        scope: String,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            embedding,
            response,
            source_tier,
            scope,
            created_at: now,
            last_accessed_at: now,
            ttl,
            quality_score: DEFAULT_QUALITY_SCORE,
            hit_count: 0,
        }
    }

    /// True once the TTL measured from creation has lapsed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.age(now) >= self.ttl
    }

    /// Age since creation; zero if the clock moved backwards.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at).to_std().unwrap_or(Duration::ZERO)
    }
}

/// The data a successful lookup hands back to the caller.
#[derive(Debug, Clone)]
pub struct CacheHit {
    /// Id of the matched entry.
    pub entry_id: u64,
    /// Cached response payload.
    pub response: CachedResponse,
    /// Tier that originally produced the response.
    pub source_tier: Tier,
    /// Cosine similarity between the query and the matched entry.
    pub similarity: f32,
}
