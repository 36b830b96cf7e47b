//! Semantic response cache.
//!
//! Stores (query, response) pairs keyed by embedding similarity so repeated
//! or near-duplicate queries are answered without a model call. Misses are
//! always safe: every failure mode in [`SemanticCache::lookup`] degrades to
//! a miss.

pub mod entry;
pub mod error;
pub mod eviction;
pub mod semantic;

#[cfg(test)]
mod tests;

pub use entry::{CacheEntry, CacheHit, CachedResponse, DEFAULT_QUALITY_SCORE};
pub use error::{CacheError, CacheResult};
pub use eviction::{EntryMeta, EvictionPlan, EvictionReport};
pub use semantic::{CacheStats, SemanticCache, start_sweeper};
