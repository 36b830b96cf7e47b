use thiserror::Error;

#[derive(Debug, Error)]
/// Errors from the vector index collaborator.
pub enum VectorDbError {
    /// Could not reach the index endpoint.
    #[error("failed to connect to vector index at {url}: {message}")]
    ConnectionFailed {
        /// Endpoint URL.
        url: String,
        /// Error message.
        message: String,
    },

    /// Collection creation failed.
    #[error("failed to create collection '{collection}': {message}")]
    CreateCollectionFailed {
        /// Collection name.
        collection: String,
        /// Error message.
        message: String,
    },

    /// The named collection does not exist.
    #[error("collection '{collection}' not found")]
    CollectionNotFound {
        /// Collection name.
        collection: String,
    },

    /// Upsert failed.
    #[error("upsert into '{collection}' failed: {message}")]
    UpsertFailed {
        /// Collection name.
        collection: String,
        /// Error message.
        message: String,
    },

    /// Search failed.
    #[error("search in '{collection}' failed: {message}")]
    SearchFailed {
        /// Collection name.
        collection: String,
        /// Error message.
        message: String,
    },

    /// Delete failed.
    #[error("delete from '{collection}' failed: {message}")]
    DeleteFailed {
        /// Collection name.
        collection: String,
        /// Error message.
        message: String,
    },

    /// A vector's dimensionality did not match the collection.
    #[error("invalid vector dimension: expected {expected}, got {actual}")]
    InvalidDimension {
        /// Collection dimensionality.
        expected: usize,
        /// Offending vector dimensionality.
        actual: usize,
    },
}
