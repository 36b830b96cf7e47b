use qdrant_client::qdrant::ScoredPoint;
use qdrant_client::qdrant::point_id::PointIdOptions;

/// A vector plus the metadata the cache needs back from a search.
#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: u64,
    pub vector: Vec<f32>,
    /// 64-bit hash of the cache scope this entry belongs to.
    pub scope_hash: u64,
    /// Entry creation time (unix seconds), for diagnostics.
    pub created_at: i64,
}

impl VectorPoint {
    pub fn new(id: u64, vector: Vec<f32>, scope_hash: u64) -> Self {
        Self {
            id,
            vector,
            scope_hash,
            created_at: 0,
        }
    }

    pub fn with_created_at(mut self, created_at: i64) -> Self {
        self.created_at = created_at;
        self
    }
}

/// One ranked nearest-neighbor match.
#[derive(Debug, Clone)]
pub struct SearchMatch {
    pub id: u64,
    /// Cosine similarity in `[-1, 1]`.
    pub score: f32,
    pub scope_hash: u64,
}

impl SearchMatch {
    /// Converts a qdrant scored point; returns `None` for non-numeric ids.
    pub fn from_scored_point(point: ScoredPoint) -> Option<Self> {
        let id = match point.id.and_then(|pid| pid.point_id_options) {
            Some(PointIdOptions::Num(n)) => n,
            _ => return None,
        };

        let scope_hash = point
            .payload
            .get("scope_hash")
            .and_then(|v| v.as_integer())
            .map(|i| i as u64)
            .unwrap_or(0);

        Some(SearchMatch {
            id,
            score: point.score,
            scope_hash,
        })
    }
}
