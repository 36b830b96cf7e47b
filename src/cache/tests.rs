use chrono::{Duration as ChronoDuration, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::*;
use crate::config::CacheSettings;
use crate::embedding::{Embedder, EmbeddingError, MockEmbedder};
use crate::tier::Tier;
use crate::vectordb::{MockVectorIndex, SearchMatch, VectorDbError, VectorIndex, VectorPoint};

const COLLECTION: &str = "test_cache";

fn settings() -> CacheSettings {
    CacheSettings {
        max_entries: 100,
        ..CacheSettings::default()
    }
}

fn response(text: &str) -> CachedResponse {
    CachedResponse {
        text: text.to_string(),
        input_tokens: 100,
        output_tokens: 50,
    }
}

async fn test_cache() -> SemanticCache<MockEmbedder, MockVectorIndex> {
    let cache = SemanticCache::new(MockEmbedder::new(), MockVectorIndex::new(), COLLECTION);
    cache.ensure_ready().await.unwrap();
    cache
}

/// Embedder that never completes within a test-sized deadline.
struct StalledEmbedder;

impl Embedder for StalledEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        unreachable!("deadline should fire first")
    }

    fn dim(&self) -> usize {
        crate::embedding::MOCK_EMBEDDING_DIM
    }
}

/// Index whose first N upserts fail, to exercise the store retry.
struct FlakyIndex {
    inner: MockVectorIndex,
    upsert_failures_left: AtomicUsize,
}

impl FlakyIndex {
    fn failing_first(n: usize) -> Self {
        Self {
            inner: MockVectorIndex::new(),
            upsert_failures_left: AtomicUsize::new(n),
        }
    }
}

impl VectorIndex for FlakyIndex {
    async fn ensure_collection(&self, name: &str, vector_size: u64) -> Result<(), VectorDbError> {
        self.inner.ensure_collection(name, vector_size).await
    }

    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> Result<(), VectorDbError> {
        let left = self.upsert_failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.upsert_failures_left.store(left - 1, Ordering::SeqCst);
            return Err(VectorDbError::UpsertFailed {
                collection: collection.to_string(),
                message: "injected failure".to_string(),
            });
        }
        self.inner.upsert(collection, points).await
    }

    async fn search(
        &self,
        collection: &str,
        query: Vec<f32>,
        limit: u64,
        scope_filter: Option<u64>,
    ) -> Result<Vec<SearchMatch>, VectorDbError> {
        self.inner.search(collection, query, limit, scope_filter).await
    }

    async fn delete(&self, collection: &str, ids: Vec<u64>) -> Result<(), VectorDbError> {
        self.inner.delete(collection, ids).await
    }

    async fn is_ready(&self) -> bool {
        self.inner.is_ready().await
    }
}

#[tokio::test]
async fn test_store_then_identical_lookup_hits() {
    let cache = test_cache().await;
    let cfg = settings();

    let stored = cache
        .store(
            "how do I open a file in rust",
            response("use std::fs::File::open"),
            Tier::Mid,
            "proj-a",
            &cfg,
        )
        .await
        .unwrap();

    let hit = cache
        .lookup("how do I open a file in rust", "proj-a", &cfg)
        .await
        .expect("identical query should hit");

    assert_eq!(hit.entry_id, stored.id);
    assert_eq!(hit.response.text, "use std::fs::File::open");
    assert_eq!(hit.source_tier, Tier::Mid);
    assert!(hit.similarity > 0.999);
}

#[tokio::test]
async fn test_hit_updates_access_metadata() {
    let cache = test_cache().await;
    let cfg = settings();

    cache
        .store("what is a borrow checker", response("it checks borrows"), Tier::Cheap, "s", &cfg)
        .await
        .unwrap();

    cache.lookup("what is a borrow checker", "s", &cfg).await.unwrap();
    cache.lookup("what is a borrow checker", "s", &cfg).await.unwrap();

    let exported = cache.export();
    assert_eq!(exported.len(), 1);
    assert_eq!(exported[0].hit_count, 2);
    assert!(exported[0].last_accessed_at >= exported[0].created_at);
}

#[tokio::test]
async fn test_lookup_never_crosses_scopes() {
    let cache = test_cache().await;
    let cfg = settings();

    cache
        .store("explain lifetimes", response("lifetimes answer"), Tier::Mid, "proj-a", &cfg)
        .await
        .unwrap();

    assert!(cache.lookup("explain lifetimes", "proj-b", &cfg).await.is_none());
    assert!(cache.lookup("explain lifetimes", "proj-a", &cfg).await.is_some());
}

#[tokio::test]
async fn test_dissimilar_query_misses() {
    let cache = test_cache().await;
    let cfg = settings();

    cache
        .store(
            "configure nginx reverse proxy headers",
            response("proxy_set_header"),
            Tier::Cheap,
            "s",
            &cfg,
        )
        .await
        .unwrap();

    let miss = cache
        .lookup("why does my rust iterator allocate", "s", &cfg)
        .await;
    assert!(miss.is_none());
}

#[tokio::test]
async fn test_expired_entry_is_not_returned() {
    let cache = test_cache().await;
    let cfg = CacheSettings {
        ttl_secs: 0,
        ..settings()
    };

    cache
        .store("short lived", response("gone"), Tier::Cheap, "s", &cfg)
        .await
        .unwrap();

    // The vector is still searchable; TTL must be enforced at hit time.
    assert!(cache.lookup("short lived", "s", &cfg).await.is_none());
}

#[tokio::test]
async fn test_lookup_fail_open_on_index_failure() {
    let index = MockVectorIndex::new();
    index.fail_searches(true);
    let cache = SemanticCache::new(MockEmbedder::new(), index, COLLECTION);
    cache.ensure_ready().await.unwrap();
    let cfg = settings();

    // Upserts still work; only the search path is broken.
    cache
        .store("resilient query", response("cached"), Tier::Cheap, "s", &cfg)
        .await
        .unwrap();

    assert!(cache.lookup("resilient query", "s", &cfg).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_lookup_fail_open_on_embed_timeout() {
    let index = MockVectorIndex::new();
    index.ensure_collection(COLLECTION, 64).await.unwrap();
    let cache = SemanticCache::new(StalledEmbedder, index, COLLECTION);
    let cfg = settings();

    assert!(cache.lookup("anything", "s", &cfg).await.is_none());
}

#[tokio::test]
async fn test_store_retries_upsert_once() {
    let index = FlakyIndex::failing_first(1);
    let cache = SemanticCache::new(MockEmbedder::new(), index, COLLECTION);
    cache.ensure_ready().await.unwrap();
    let cfg = settings();

    cache
        .store("flaky store", response("made it"), Tier::Mid, "s", &cfg)
        .await
        .expect("single upsert failure should be retried");

    assert!(cache.lookup("flaky store", "s", &cfg).await.is_some());
}

#[tokio::test]
async fn test_store_gives_up_after_second_failure() {
    let index = FlakyIndex::failing_first(2);
    let cache = SemanticCache::new(MockEmbedder::new(), index, COLLECTION);
    cache.ensure_ready().await.unwrap();

    let result = cache
        .store("doomed store", response("lost"), Tier::Mid, "s", &settings())
        .await;

    assert!(matches!(result, Err(CacheError::Index(_))));
    assert_eq!(cache.len(), 0);
}

#[tokio::test]
async fn test_restore_same_query_overwrites_in_place() {
    let cache = test_cache().await;
    let cfg = settings();

    cache
        .store("same question", response("first answer"), Tier::Cheap, "s", &cfg)
        .await
        .unwrap();
    cache
        .store("same question", response("second answer"), Tier::Mid, "s", &cfg)
        .await
        .unwrap();

    assert_eq!(cache.len(), 1);
    let hit = cache.lookup("same question", "s", &cfg).await.unwrap();
    assert_eq!(hit.response.text, "second answer");
    assert_eq!(hit.source_tier, Tier::Mid);
}

#[tokio::test]
async fn test_record_feedback_clamps_and_reports_missing() {
    let cache = test_cache().await;
    let cfg = settings();

    let entry = cache
        .store("rated query", response("ok"), Tier::Cheap, "s", &cfg)
        .await
        .unwrap();

    assert!(cache.record_feedback(entry.id, 7.5));
    assert_eq!(cache.export()[0].quality_score, 1.0);
    assert!(cache.record_feedback(entry.id, -3.0));
    assert_eq!(cache.export()[0].quality_score, 0.0);

    assert!(!cache.record_feedback(entry.id + 1, 0.5));
}

#[tokio::test]
async fn test_clear_all_and_clear_scope_pattern() {
    let cache = test_cache().await;
    let cfg = settings();

    for (text, scope) in [
        ("q one", "proj-a"),
        ("q two", "proj-b/session-1"),
        ("q three", "proj-b/session-2"),
    ] {
        cache
            .store(text, response("r"), Tier::Cheap, scope, &cfg)
            .await
            .unwrap();
    }

    let removed = cache.clear_scope_pattern("proj-b*").await.unwrap();
    assert_eq!(removed, 2);
    assert_eq!(cache.len(), 1);
    assert!(cache.lookup("q one", "proj-a", &cfg).await.is_some());
    assert!(cache.lookup("q two", "proj-b/session-1", &cfg).await.is_none());

    let removed = cache.clear_all().await.unwrap();
    assert_eq!(removed, 1);
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_stats_report_hit_rate() {
    let cache = test_cache().await;
    let cfg = settings();

    cache
        .store("known question", response("r"), Tier::Cheap, "s", &cfg)
        .await
        .unwrap();

    cache.lookup("known question", "s", &cfg).await.unwrap();
    cache.lookup("entirely unrelated topic zebra", "s", &cfg).await;

    let stats = cache.stats();
    assert_eq!(stats.entry_count, 1);
    assert_eq!(stats.lookups, 2);
    assert_eq!(stats.hits, 1);
    assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
    assert!(stats.avg_age_secs >= 0.0);
}

#[tokio::test]
async fn test_export_import_round_trip_preserves_lookups() {
    let source = test_cache().await;
    let cfg = settings();

    source
        .store("portable query", response("portable answer"), Tier::Premium, "s", &cfg)
        .await
        .unwrap();
    source
        .store("another query", response("another answer"), Tier::Cheap, "t", &cfg)
        .await
        .unwrap();

    let exported = source.export();
    assert_eq!(exported.len(), 2);

    let target = test_cache().await;
    let imported = target.import(exported).await.unwrap();
    assert_eq!(imported, 2);
    assert_eq!(target.len(), 2);

    let hit = target.lookup("portable query", "s", &cfg).await.unwrap();
    assert_eq!(hit.response.text, "portable answer");
    assert_eq!(hit.source_tier, Tier::Premium);
}

#[tokio::test]
async fn test_import_rejects_wrong_dimension() {
    let target = test_cache().await;

    let entry = CacheEntry::new(
        1,
        vec![1.0, 0.0],
        response("bad"),
        Tier::Cheap,
        "s".to_string(),
        Duration::from_secs(60),
        Utc::now(),
    );

    let result = target.import(vec![entry]).await;
    assert!(matches!(result, Err(CacheError::ImportRejected { .. })));
    assert!(target.is_empty());
}

#[tokio::test]
async fn test_store_over_ceiling_evicts_back_to_limit() {
    let cache = test_cache().await;
    let cfg = CacheSettings {
        max_entries: 5,
        ..settings()
    };

    for i in 0..6 {
        cache
            .store(
                &format!("distinct question number {i} about topic {i}"),
                response(&format!("answer {i}")),
                Tier::Cheap,
                "s",
                &cfg,
            )
            .await
            .unwrap();
    }

    assert_eq!(cache.len(), 5);
    // The newest entry survives the pass that its own store triggered.
    assert!(
        cache
            .lookup("distinct question number 5 about topic 5", "s", &cfg)
            .await
            .is_some()
    );
}

#[tokio::test]
async fn test_evict_prefers_low_quality_over_lru() {
    let cache = test_cache().await;
    let cfg = CacheSettings {
        max_entries: 2,
        evict_by_quality: true,
        evict_by_lru: true,
        ..settings()
    };

    let keep_old = cache
        .store("oldest stored question", response("a"), Tier::Cheap, "s", &settings())
        .await
        .unwrap();
    let bad = cache
        .store("downvoted question text", response("b"), Tier::Cheap, "s", &settings())
        .await
        .unwrap();
    cache
        .store("newest stored question", response("c"), Tier::Cheap, "s", &settings())
        .await
        .unwrap();
    cache.record_feedback(bad.id, 0.1);

    let report = cache.evict(&cfg).await;

    assert_eq!(report.quality_removed, 1);
    assert_eq!(report.lru_removed, 0);
    assert_eq!(report.remaining, 2);
    let surviving: Vec<u64> = cache.export().iter().map(|e| e.id).collect();
    assert!(surviving.contains(&keep_old.id));
    assert!(!surviving.contains(&bad.id));
}

#[tokio::test]
async fn test_evict_pass_is_idempotent() {
    let cache = test_cache().await;
    let cfg = CacheSettings {
        ttl_secs: 0,
        ..settings()
    };

    cache
        .store("instantly stale", response("r"), Tier::Cheap, "s", &cfg)
        .await
        .unwrap();

    let first = cache.evict(&cfg).await;
    assert_eq!(first.expired_removed, 1);
    assert_eq!(first.remaining, 0);

    let second = cache.evict(&cfg).await;
    assert_eq!(second.expired_removed, 0);
    assert_eq!(second.remaining, 0);
}

#[tokio::test]
async fn test_compaction_fires_once_after_heavy_deletion() {
    let cache = test_cache().await;
    let cfg = CacheSettings {
        compaction_ratio: 0.25,
        ..settings()
    };

    for i in 0..4 {
        cache
            .store(
                &format!("compaction subject number {i}"),
                response("r"),
                Tier::Cheap,
                "s",
                &cfg,
            )
            .await
            .unwrap();
    }
    cache.clear_scope_pattern("s").await.unwrap();
    cache
        .store("sole survivor entry", response("r"), Tier::Cheap, "s", &cfg)
        .await
        .unwrap();

    let first = cache.evict(&cfg).await;
    assert!(first.compacted);

    let second = cache.evict(&cfg).await;
    assert!(!second.compacted);
}

mod plan {
    use super::super::eviction::{EntryMeta, plan};
    use super::*;

    fn meta(id: u64, age_secs: i64, ttl_secs: u64, quality: f32, accessed_ago_secs: i64) -> EntryMeta {
        let now = Utc::now();
        EntryMeta {
            id,
            created_at: now - ChronoDuration::seconds(age_secs),
            last_accessed_at: now - ChronoDuration::seconds(accessed_ago_secs),
            ttl: Duration::from_secs(ttl_secs),
            quality_score: quality,
        }
    }

    #[test]
    fn test_plan_removes_expired_regardless_of_size() {
        let cfg = CacheSettings {
            max_entries: 100,
            ..CacheSettings::default()
        };
        let entries = vec![meta(1, 7200, 3600, 0.9, 0), meta(2, 10, 3600, 0.9, 0)];

        let plan = plan(&entries, &cfg, Utc::now());

        assert_eq!(plan.expired, vec![1]);
        assert!(plan.quality.is_empty());
        assert!(plan.lru.is_empty());
    }

    #[test]
    fn test_plan_quality_step_only_takes_below_neutral() {
        let cfg = CacheSettings {
            max_entries: 2,
            ..CacheSettings::default()
        };
        // One below-neutral entry, overflow of two: quality takes one, LRU
        // takes the remaining one.
        let entries = vec![
            meta(1, 10, 3600, 0.2, 500),
            meta(2, 10, 3600, 0.9, 900),
            meta(3, 10, 3600, 0.9, 100),
            meta(4, 10, 3600, 0.9, 10),
        ];

        let plan = plan(&entries, &cfg, Utc::now());

        assert_eq!(plan.quality, vec![1]);
        assert_eq!(plan.lru, vec![2]);
    }

    #[test]
    fn test_plan_lru_orders_by_last_access() {
        let cfg = CacheSettings {
            max_entries: 1,
            evict_by_quality: false,
            ..CacheSettings::default()
        };
        let entries = vec![
            meta(1, 10, 3600, 0.5, 300),
            meta(2, 10, 3600, 0.5, 100),
            meta(3, 10, 3600, 0.5, 200),
        ];

        let plan = plan(&entries, &cfg, Utc::now());

        assert_eq!(plan.lru, vec![1, 3]);
    }

    #[test]
    fn test_plan_respects_disabled_steps() {
        let cfg = CacheSettings {
            max_entries: 1,
            evict_expired: false,
            evict_by_quality: false,
            evict_by_lru: false,
            ..CacheSettings::default()
        };
        let entries = vec![meta(1, 7200, 3600, 0.1, 500), meta(2, 10, 3600, 0.1, 100)];

        let plan = plan(&entries, &cfg, Utc::now());

        assert!(plan.is_empty());
    }

    #[test]
    fn test_plan_under_limit_touches_nothing_live() {
        let cfg = CacheSettings::default();
        let entries = vec![meta(1, 10, 3600, 0.0, 0), meta(2, 10, 3600, 0.0, 0)];

        let plan = plan(&entries, &cfg, Utc::now());

        assert!(plan.is_empty());
    }
}
