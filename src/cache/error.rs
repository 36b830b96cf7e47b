use crate::embedding::EmbeddingError;
use crate::vectordb::VectorDbError;
use thiserror::Error;

#[derive(Debug, Error)]
/// Errors returned by the semantic cache.
///
/// Lookup never surfaces these to a request; they exist for the store path
/// and admin operations, where the caller decides whether to log or reject.
pub enum CacheError {
    /// Embedding generation failed or timed out.
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Vector index error (search/upsert/delete).
    #[error("vector index error: {0}")]
    Index(#[from] VectorDbError),

    /// An imported entry was unusable.
    #[error("import rejected: {reason}")]
    ImportRejected {
        /// Error message.
        reason: String,
    },
}

/// Convenience result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
