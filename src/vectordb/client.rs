use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, PointStruct,
    PointsIdsList, SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
};
use std::collections::HashMap;

use super::error::VectorDbError;
use super::model::{SearchMatch, VectorPoint};

/// Minimal async interface the cache needs from a vector index.
pub trait VectorIndex: Send + Sync {
    /// Ensures a collection exists.
    fn ensure_collection(
        &self,
        name: &str,
        vector_size: u64,
    ) -> impl std::future::Future<Output = Result<(), VectorDbError>> + Send;

    /// Upserts points.
    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> impl std::future::Future<Output = Result<(), VectorDbError>> + Send;

    /// Nearest-neighbor search, optionally restricted to one scope.
    fn search(
        &self,
        collection: &str,
        query: Vec<f32>,
        limit: u64,
        scope_filter: Option<u64>,
    ) -> impl std::future::Future<Output = Result<Vec<SearchMatch>, VectorDbError>> + Send;

    /// Deletes points by id.
    fn delete(
        &self,
        collection: &str,
        ids: Vec<u64>,
    ) -> impl std::future::Future<Output = Result<(), VectorDbError>> + Send;

    /// Returns `true` if the index answers a liveness probe.
    fn is_ready(&self) -> impl std::future::Future<Output = bool> + Send;
}

#[derive(Clone)]
/// Qdrant-backed [`VectorIndex`].
pub struct QdrantIndex {
    client: Qdrant,
    url: String,
}

impl QdrantIndex {
    /// Creates a client for `url`.
    pub async fn connect(url: &str) -> Result<Self, VectorDbError> {
        let client =
            Qdrant::from_url(url)
                .build()
                .map_err(|e| VectorDbError::ConnectionFailed {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    /// Returns the configured URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn create_collection(&self, name: &str, vector_size: u64) -> Result<(), VectorDbError> {
        let vectors_config = VectorParamsBuilder::new(vector_size, Distance::Cosine);

        self.client
            .create_collection(
                CreateCollectionBuilder::new(name)
                    .vectors_config(vectors_config)
                    .on_disk_payload(true),
            )
            .await
            .map_err(|e| VectorDbError::CreateCollectionFailed {
                collection: name.to_string(),
                message: e.to_string(),
            })?;

        Ok(())
    }
}

impl VectorIndex for QdrantIndex {
    async fn ensure_collection(&self, name: &str, vector_size: u64) -> Result<(), VectorDbError> {
        let exists = self.client.collection_exists(name).await.map_err(|e| {
            VectorDbError::CreateCollectionFailed {
                collection: name.to_string(),
                message: e.to_string(),
            }
        })?;

        if !exists {
            self.create_collection(name, vector_size).await?;
        }

        Ok(())
    }

    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> Result<(), VectorDbError> {
        if points.is_empty() {
            return Ok(());
        }

        let qdrant_points: Vec<PointStruct> = points
            .into_iter()
            .map(|p| {
                let mut payload: HashMap<String, qdrant_client::qdrant::Value> = HashMap::new();
                payload.insert("scope_hash".to_string(), (p.scope_hash as i64).into());
                payload.insert("created_at".to_string(), p.created_at.into());

                PointStruct::new(p.id, p.vector, payload)
            })
            .collect();

        // Eventual consistency is fine: a store that is not yet searchable
        // behaves like the accepted duplicate-miss race.
        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, qdrant_points).wait(false))
            .await
            .map_err(|e| VectorDbError::UpsertFailed {
                collection: collection.to_string(),
                message: e.to_string(),
            })?;

        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query: Vec<f32>,
        limit: u64,
        scope_filter: Option<u64>,
    ) -> Result<Vec<SearchMatch>, VectorDbError> {
        let mut search_builder =
            SearchPointsBuilder::new(collection, query, limit).with_payload(true);

        if let Some(scope_hash) = scope_filter {
            let filter = Filter::must([Condition::matches("scope_hash", scope_hash as i64)]);
            search_builder = search_builder.filter(filter);
        }

        let search_result = self
            .client
            .search_points(search_builder)
            .await
            .map_err(|e| VectorDbError::SearchFailed {
                collection: collection.to_string(),
                message: e.to_string(),
            })?;

        let results = search_result
            .result
            .into_iter()
            .filter_map(SearchMatch::from_scored_point)
            .collect();

        Ok(results)
    }

    async fn delete(&self, collection: &str, ids: Vec<u64>) -> Result<(), VectorDbError> {
        if ids.is_empty() {
            return Ok(());
        }

        let points_selector = PointsIdsList {
            ids: ids.into_iter().map(|id| id.into()).collect(),
        };

        self.client
            .delete_points(
                DeletePointsBuilder::new(collection)
                    .points(points_selector)
                    .wait(true),
            )
            .await
            .map_err(|e| VectorDbError::DeleteFailed {
                collection: collection.to_string(),
                message: e.to_string(),
            })?;

        Ok(())
    }

    async fn is_ready(&self) -> bool {
        self.client.health_check().await.is_ok()
    }
}

impl std::fmt::Debug for QdrantIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantIndex").field("url", &self.url).finish()
    }
}
