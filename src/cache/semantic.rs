use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::entry::{CacheEntry, CacheHit, CachedResponse};
use super::error::{CacheError, CacheResult};
use super::eviction::{self, EVICT_BATCH_SIZE, EntryMeta, EvictionReport};
use crate::config::{CacheSettings, ConfigStore};
use crate::embedding::Embedder;
use crate::hashing::{derive_entry_id, hash_scope};
use crate::tier::Tier;
use crate::vectordb::{VectorDbError, VectorIndex, VectorPoint};

/// Operator-facing cache statistics.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    pub entry_count: usize,
    pub lookups: u64,
    pub hits: u64,
    /// Hits over lookups since startup; 0 before the first lookup.
    pub hit_rate: f64,
    /// Mean entry age in seconds.
    pub avg_age_secs: f64,
}

/// Similarity-indexed store of query/response pairs.
///
/// Entry state lives in process memory behind a [`RwLock`]; the vector index
/// only holds embeddings and ids. Lookup is fail-open: any embedder or index
/// failure, including a deadline expiry, is a miss, never an error. All
/// tunables arrive per call as a [`CacheSettings`] snapshot so one request
/// never observes a torn reload.
pub struct SemanticCache<E, V> {
    embedder: E,
    index: V,
    collection: String,
    entries: RwLock<HashMap<u64, CacheEntry>>,
    lookups: AtomicU64,
    hits: AtomicU64,
    /// Vectors deleted since the last compaction, for the fragmentation ratio.
    tombstones: AtomicU64,
}

impl<E, V> SemanticCache<E, V>
where
    E: Embedder,
    V: VectorIndex,
{
    pub fn new(embedder: E, index: V, collection: impl Into<String>) -> Self {
        Self {
            embedder,
            index,
            collection: collection.into(),
            entries: RwLock::new(HashMap::new()),
            lookups: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            tombstones: AtomicU64::new(0),
        }
    }

    /// Creates the backing collection if it does not exist yet.
    pub async fn ensure_ready(&self) -> CacheResult<()> {
        self.index
            .ensure_collection(&self.collection, self.embedder.dim() as u64)
            .await?;
        Ok(())
    }

    /// Finds the best reusable entry for `text` within `scope`.
    ///
    /// Returns the single highest-similarity entry at or above the threshold
    /// that is still within TTL. Expired entries are skipped here and left
    /// for the sweeper.
    #[instrument(skip(self, settings), fields(scope = %scope))]
    pub async fn lookup(
        &self,
        text: &str,
        scope: &str,
        settings: &CacheSettings,
    ) -> Option<CacheHit> {
        self.lookups.fetch_add(1, Ordering::Relaxed);

        let embed_deadline = Duration::from_millis(settings.embed_timeout_ms);
        let embedding = match tokio::time::timeout(embed_deadline, self.embedder.embed(text)).await
        {
            Ok(Ok(vector)) => vector,
            Ok(Err(e)) => {
                warn!(error = %e, "embedding failed during lookup, treating as miss");
                return None;
            }
            Err(_) => {
                warn!(timeout_ms = settings.embed_timeout_ms, "embedding timed out, treating as miss");
                return None;
            }
        };

        let index_deadline = Duration::from_millis(settings.index_timeout_ms);
        let search = self.index.search(
            &self.collection,
            embedding,
            settings.search_top_k,
            Some(hash_scope(scope)),
        );
        let matches = match tokio::time::timeout(index_deadline, search).await {
            Ok(Ok(matches)) => matches,
            Ok(Err(e)) => {
                warn!(error = %e, "vector search failed during lookup, treating as miss");
                return None;
            }
            Err(_) => {
                warn!(timeout_ms = settings.index_timeout_ms, "vector search timed out, treating as miss");
                return None;
            }
        };

        let now = Utc::now();
        let mut entries = self.entries.write();
        for m in matches {
            if m.score < settings.similarity_threshold {
                break;
            }

            // A vector without a resident entry is a stale index row from a
            // crash or an interrupted delete; skip it.
            let Some(entry) = entries.get_mut(&m.id) else {
                continue;
            };
            if entry.is_expired(now) {
                continue;
            }

            entry.last_accessed_at = now;
            entry.hit_count += 1;
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(entry_id = entry.id, similarity = m.score, "cache hit");

            return Some(CacheHit {
                entry_id: entry.id,
                response: entry.response.clone(),
                source_tier: entry.source_tier,
                similarity: m.score,
            });
        }

        None
    }

    /// Stores a fresh response under `scope`.
    ///
    /// The entry id is derived from scope and text, so re-storing the same
    /// query overwrites in place rather than accumulating duplicates. Runs a
    /// bounded eviction pass when the store pushes the cache over its
    /// ceiling.
    #[instrument(skip(self, response, settings), fields(scope = %scope, tier = %source_tier))]
    pub async fn store(
        &self,
        text: &str,
        response: CachedResponse,
        source_tier: Tier,
        scope: &str,
        settings: &CacheSettings,
    ) -> CacheResult<CacheEntry> {
        let embed_deadline = Duration::from_millis(settings.embed_timeout_ms);
        let embedding = tokio::time::timeout(embed_deadline, self.embedder.embed(text))
            .await
            .map_err(|_| crate::embedding::EmbeddingError::Timeout {
                timeout_ms: settings.embed_timeout_ms,
            })??;

        let id = derive_entry_id(scope, text);
        let point = VectorPoint::new(id, embedding.clone(), hash_scope(scope));

        // One retry: the upsert is the only step whose failure loses the
        // paid response, so it is worth a second attempt before giving up.
        if let Err(first) = self.index.upsert(&self.collection, vec![point.clone()]).await {
            warn!(error = %first, entry_id = id, "index upsert failed, retrying once");
            self.index.upsert(&self.collection, vec![point]).await?;
        }

        let entry = CacheEntry::new(
            id,
            embedding,
            response,
            source_tier,
            scope.to_string(),
            Duration::from_secs(settings.ttl_secs),
            Utc::now(),
        );

        let over_ceiling = {
            let mut entries = self.entries.write();
            entries.insert(id, entry.clone());
            entries.len() > settings.max_entries
        };

        if over_ceiling {
            let report = self.evict(settings).await;
            debug!(?report, "post-store eviction");
        }

        Ok(entry)
    }

    /// Updates an entry's quality score from downstream feedback.
    ///
    /// Scores are clamped to `[0, 1]`. Returns `false` when the entry no
    /// longer exists.
    pub fn record_feedback(&self, entry_id: u64, quality_score: f32) -> bool {
        let mut entries = self.entries.write();
        match entries.get_mut(&entry_id) {
            Some(entry) => {
                entry.quality_score = quality_score.clamp(0.0, 1.0);
                true
            }
            None => false,
        }
    }

    /// Removes every entry. Returns the number removed.
    pub async fn clear_all(&self) -> CacheResult<usize> {
        let ids: Vec<u64> = {
            let mut entries = self.entries.write();
            let ids = entries.keys().copied().collect();
            entries.clear();
            ids
        };

        let removed = ids.len();
        self.delete_from_index(&ids).await?;
        self.tombstones.fetch_add(removed as u64, Ordering::Relaxed);
        info!(removed, "cache cleared");
        Ok(removed)
    }

    /// Removes entries whose scope matches `pattern`.
    ///
    /// A trailing `*` makes the pattern a prefix match; otherwise scopes must
    /// match exactly. Returns the number removed.
    pub async fn clear_scope_pattern(&self, pattern: &str) -> CacheResult<usize> {
        let ids: Vec<u64> = {
            let mut entries = self.entries.write();
            let ids: Vec<u64> = entries
                .values()
                .filter(|e| scope_matches(pattern, &e.scope))
                .map(|e| e.id)
                .collect();
            for id in &ids {
                entries.remove(id);
            }
            ids
        };

        let removed = ids.len();
        self.delete_from_index(&ids).await?;
        self.tombstones.fetch_add(removed as u64, Ordering::Relaxed);
        info!(pattern, removed, "cache scope cleared");
        Ok(removed)
    }

    /// Snapshot of entry count, hit rate, and average age.
    pub fn stats(&self) -> CacheStats {
        let now = Utc::now();
        let (entry_count, total_age_secs) = {
            let entries = self.entries.read();
            let total: f64 = entries.values().map(|e| e.age(now).as_secs_f64()).sum();
            (entries.len(), total)
        };

        let lookups = self.lookups.load(Ordering::Relaxed);
        let hits = self.hits.load(Ordering::Relaxed);

        CacheStats {
            entry_count,
            lookups,
            hits,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
            avg_age_secs: if entry_count == 0 {
                0.0
            } else {
                total_age_secs / entry_count as f64
            },
        }
    }

    /// All resident entries, for backup or migration. Ordered by id so the
    /// output is stable.
    pub fn export(&self) -> Vec<CacheEntry> {
        let entries = self.entries.read();
        let mut all: Vec<CacheEntry> = entries.values().cloned().collect();
        all.sort_by_key(|e| e.id);
        all
    }

    /// Restores previously exported entries, embeddings included.
    ///
    /// Rejects the whole batch if any entry's embedding does not match this
    /// cache's dimensionality. Returns the number imported.
    pub async fn import(&self, imported: Vec<CacheEntry>) -> CacheResult<usize> {
        let dim = self.embedder.dim();
        for entry in &imported {
            if entry.embedding.len() != dim {
                return Err(CacheError::ImportRejected {
                    reason: format!(
                        "entry {} has dimension {}, expected {dim}",
                        entry.id,
                        entry.embedding.len()
                    ),
                });
            }
        }

        let count = imported.len();
        for chunk in imported.chunks(EVICT_BATCH_SIZE) {
            let points: Vec<VectorPoint> = chunk
                .iter()
                .map(|e| VectorPoint::new(e.id, e.embedding.clone(), hash_scope(&e.scope)))
                .collect();
            self.index.upsert(&self.collection, points).await?;

            let mut entries = self.entries.write();
            for entry in chunk {
                entries.insert(entry.id, entry.clone());
            }
        }

        info!(count, "cache import complete");
        Ok(count)
    }

    /// Runs one full eviction pass: TTL sweep, quality, LRU, then index
    /// compaction if fragmentation crossed the configured ratio.
    ///
    /// Victims are removed in bounded batches with a yield between each, so
    /// concurrent lookups are never blocked for long.
    #[instrument(skip(self, settings))]
    pub async fn evict(&self, settings: &CacheSettings) -> EvictionReport {
        let meta: Vec<EntryMeta> = {
            let entries = self.entries.read();
            entries
                .values()
                .map(|e| EntryMeta {
                    id: e.id,
                    created_at: e.created_at,
                    last_accessed_at: e.last_accessed_at,
                    ttl: e.ttl,
                    quality_score: e.quality_score,
                })
                .collect()
        };

        let plan = eviction::plan(&meta, settings, Utc::now());

        let expired_removed = self.apply_removals(&plan.expired).await;
        let quality_removed = self.apply_removals(&plan.quality).await;
        let lru_removed = self.apply_removals(&plan.lru).await;
        let remaining = self.entries.read().len();
        let report = EvictionReport {
            expired_removed,
            quality_removed,
            lru_removed,
            remaining,
            compacted: self.maybe_compact(settings, remaining).await,
        };

        if !plan.is_empty() || report.compacted {
            info!(
                expired = report.expired_removed,
                quality = report.quality_removed,
                lru = report.lru_removed,
                remaining = report.remaining,
                compacted = report.compacted,
                "eviction pass complete"
            );
        }

        report
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// True if the vector index answers a liveness probe.
    pub async fn index_ready(&self) -> bool {
        self.index.is_ready().await
    }

    async fn apply_removals(&self, ids: &[u64]) -> usize {
        let mut removed = 0;
        for chunk in ids.chunks(EVICT_BATCH_SIZE) {
            {
                let mut entries = self.entries.write();
                for id in chunk {
                    if entries.remove(id).is_some() {
                        removed += 1;
                    }
                }
            }

            if let Err(e) = self.index.delete(&self.collection, chunk.to_vec()).await {
                // Entry state is already gone; the stale vectors are skipped
                // by lookup and cleaned up by the next compaction.
                warn!(error = %e, "index delete failed during eviction");
            }
            self.tombstones.fetch_add(chunk.len() as u64, Ordering::Relaxed);

            tokio::task::yield_now().await;
        }
        removed
    }

    /// Rewrites all live vectors when the deleted fraction exceeds the
    /// configured ratio, letting the index drop superseded versions, and
    /// resets the tombstone counter.
    async fn maybe_compact(&self, settings: &CacheSettings, live: usize) -> bool {
        let tombstones = self.tombstones.load(Ordering::Relaxed);
        let total = live as u64 + tombstones;
        if total == 0 || (tombstones as f32 / total as f32) <= settings.compaction_ratio {
            return false;
        }

        let points: Vec<VectorPoint> = {
            let entries = self.entries.read();
            entries
                .values()
                .map(|e| VectorPoint::new(e.id, e.embedding.clone(), hash_scope(&e.scope)))
                .collect()
        };

        for chunk in points.chunks(EVICT_BATCH_SIZE) {
            if let Err(e) = self.index.upsert(&self.collection, chunk.to_vec()).await {
                warn!(error = %e, "compaction upsert failed, keeping tombstone count");
                return false;
            }
            tokio::task::yield_now().await;
        }

        self.tombstones.store(0, Ordering::Relaxed);
        true
    }

    async fn delete_from_index(&self, ids: &[u64]) -> Result<(), VectorDbError> {
        for chunk in ids.chunks(EVICT_BATCH_SIZE) {
            self.index.delete(&self.collection, chunk.to_vec()).await?;
            tokio::task::yield_now().await;
        }
        Ok(())
    }
}

impl<E, V> std::fmt::Debug for SemanticCache<E, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticCache")
            .field("collection", &self.collection)
            .field("entries", &self.entries.read().len())
            .finish()
    }
}

/// Spawns the periodic eviction sweeper. The interval is re-read from the
/// config store on every tick, so a reload takes effect without a restart.
pub fn start_sweeper<E, V>(
    cache: Arc<SemanticCache<E, V>>,
    config: Arc<ConfigStore>,
) -> tokio::task::JoinHandle<()>
where
    E: Embedder + 'static,
    V: VectorIndex + 'static,
{
    tokio::spawn(async move {
        loop {
            let settings = config.snapshot().cache.clone();
            tokio::time::sleep(Duration::from_secs(settings.sweep_interval_secs)).await;
            cache.evict(&settings).await;
        }
    })
}

fn scope_matches(pattern: &str, scope: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => scope.starts_with(prefix),
        None => scope == pattern,
    }
}
