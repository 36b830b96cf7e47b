use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{SearchMatch, VectorDbError, VectorIndex, VectorPoint};

/// In-memory [`VectorIndex`] with exact cosine scoring.
#[derive(Default)]
pub struct MockVectorIndex {
    collections: std::sync::RwLock<HashMap<String, MockCollection>>,
    fail_searches: AtomicBool,
}

#[derive(Default)]
struct MockCollection {
    vector_size: u64,
    points: HashMap<u64, MockStoredPoint>,
}

struct MockStoredPoint {
    vector: Vec<f32>,
    scope_hash: u64,
}

impl MockVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of points in a collection, if it exists.
    pub fn point_count(&self, collection: &str) -> Option<usize> {
        self.collections
            .read()
            .ok()?
            .get(collection)
            .map(|c| c.points.len())
    }

    /// Makes every subsequent search fail, to exercise fail-open paths.
    pub fn fail_searches(&self, fail: bool) {
        self.fail_searches.store(fail, Ordering::Relaxed);
    }
}

impl VectorIndex for MockVectorIndex {
    async fn ensure_collection(&self, name: &str, vector_size: u64) -> Result<(), VectorDbError> {
        let mut collections =
            self.collections
                .write()
                .map_err(|_| VectorDbError::CreateCollectionFailed {
                    collection: name.to_string(),
                    message: "lock poisoned".to_string(),
                })?;

        collections.entry(name.to_string()).or_insert(MockCollection {
            vector_size,
            points: HashMap::new(),
        });

        Ok(())
    }

    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> Result<(), VectorDbError> {
        let mut collections =
            self.collections
                .write()
                .map_err(|_| VectorDbError::UpsertFailed {
                    collection: collection.to_string(),
                    message: "lock poisoned".to_string(),
                })?;

        let coll =
            collections
                .get_mut(collection)
                .ok_or_else(|| VectorDbError::CollectionNotFound {
                    collection: collection.to_string(),
                })?;

        for point in points {
            if point.vector.len() as u64 != coll.vector_size {
                return Err(VectorDbError::InvalidDimension {
                    expected: coll.vector_size as usize,
                    actual: point.vector.len(),
                });
            }

            coll.points.insert(
                point.id,
                MockStoredPoint {
                    vector: point.vector,
                    scope_hash: point.scope_hash,
                },
            );
        }

        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query: Vec<f32>,
        limit: u64,
        scope_filter: Option<u64>,
    ) -> Result<Vec<SearchMatch>, VectorDbError> {
        if self.fail_searches.load(Ordering::Relaxed) {
            return Err(VectorDbError::SearchFailed {
                collection: collection.to_string(),
                message: "injected failure".to_string(),
            });
        }

        let collections = self
            .collections
            .read()
            .map_err(|_| VectorDbError::SearchFailed {
                collection: collection.to_string(),
                message: "lock poisoned".to_string(),
            })?;

        let coll =
            collections
                .get(collection)
                .ok_or_else(|| VectorDbError::CollectionNotFound {
                    collection: collection.to_string(),
                })?;

        let mut results: Vec<SearchMatch> = coll
            .points
            .iter()
            .filter(|(_, p)| scope_filter.is_none() || scope_filter == Some(p.scope_hash))
            .map(|(&id, p)| SearchMatch {
                id,
                score: cosine_similarity(&query, &p.vector),
                scope_hash: p.scope_hash,
            })
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(limit as usize);

        Ok(results)
    }

    async fn delete(&self, collection: &str, ids: Vec<u64>) -> Result<(), VectorDbError> {
        let mut collections =
            self.collections
                .write()
                .map_err(|_| VectorDbError::DeleteFailed {
                    collection: collection.to_string(),
                    message: "lock poisoned".to_string(),
                })?;

        let coll =
            collections
                .get_mut(collection)
                .ok_or_else(|| VectorDbError::CollectionNotFound {
                    collection: collection.to_string(),
                })?;

        for id in ids {
            coll.points.remove(&id);
        }

        Ok(())
    }

    async fn is_ready(&self) -> bool {
        true
    }
}

impl std::fmt::Debug for MockVectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self
            .collections
            .read()
            .map(|c| c.values().map(|coll| coll.points.len()).sum::<usize>())
            .unwrap_or(0);
        f.debug_struct("MockVectorIndex")
            .field("points", &count)
            .finish()
    }
}

/// Exact cosine similarity; zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|v| v * v).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
