//! Vector index integration (Qdrant).

pub mod client;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod model;


pub use client::{QdrantIndex, VectorIndex};
pub use error::VectorDbError;
#[cfg(any(test, feature = "mock"))]
pub use mock::{MockVectorIndex, cosine_similarity};
pub use model::{SearchMatch, VectorPoint};

/// Collection holding cache-entry vectors.
pub const CACHE_COLLECTION_NAME: &str = "tollgate_cache";
