//! Embedding-service collaborator.
//!
//! The only network-bound step on the cache lookup path. Callers bound every
//! call with a timeout and degrade to a miss on failure; the trait itself
//! stays oblivious to that policy.

pub mod error;

pub use error::EmbeddingError;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Turns text into a vector.
pub trait Embedder: Send + Sync {
    /// Embeds one text. Implementations should apply their own transport
    /// timeout; callers still wrap the call in a deadline.
    fn embed(
        &self,
        text: &str,
    ) -> impl std::future::Future<Output = Result<Vec<f32>, EmbeddingError>> + Send;

    /// Dimensionality of produced vectors.
    fn dim(&self) -> usize;
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// HTTP embedding client: `POST {url}` with `{"text": ...}`, expecting
/// `{"embedding": [...]}`.
#[derive(Clone)]
pub struct HttpEmbedder {
    client: reqwest::Client,
    url: String,
    dim: usize,
}

impl HttpEmbedder {
    /// Creates a client with a transport timeout.
    pub fn new(url: &str, dim: usize, timeout: Duration) -> Result<Self, EmbeddingError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmbeddingError::RequestFailed {
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            url: url.to_string(),
            dim,
        })
    }

    /// Returns the configured service URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let response = self
            .client
            .post(&self.url)
            .json(&EmbedRequest { text })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EmbeddingError::Timeout { timeout_ms: 0 }
                } else {
                    EmbeddingError::RequestFailed {
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(EmbeddingError::BadStatus {
                status: status.as_u16(),
            });
        }

        let body: EmbedResponse =
            response
                .json()
                .await
                .map_err(|e| EmbeddingError::MalformedResponse {
                    message: e.to_string(),
                })?;

        if body.embedding.len() != self.dim {
            return Err(EmbeddingError::MalformedResponse {
                message: format!(
                    "expected {} dimensions, got {}",
                    self.dim,
                    body.embedding.len()
                ),
            });
        }

        Ok(body.embedding)
    }

    fn dim(&self) -> usize {
        self.dim
    }
}

impl std::fmt::Debug for HttpEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEmbedder")
            .field("url", &self.url)
            .field("dim", &self.dim)
            .finish()
    }
}

/// Default dimensionality of [`MockEmbedder`] vectors.
pub const MOCK_EMBEDDING_DIM: usize = 64;

/// Deterministic offline embedder.
///
/// Hashes word and character-trigram features into a fixed number of buckets
/// and L2-normalizes. Identical text always produces the identical vector
/// (cosine 1.0); texts sharing vocabulary land close together, which is
/// enough structure for cache tests and stub deployments.
#[derive(Debug, Clone, Default)]
pub struct MockEmbedder {
    _priv: (),
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(mock_embedding(text))
    }

    fn dim(&self) -> usize {
        MOCK_EMBEDDING_DIM
    }
}

/// Feature-hashed embedding used by [`MockEmbedder`].
pub fn mock_embedding(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; MOCK_EMBEDDING_DIM];
    let normalized = text.to_lowercase();

    for word in normalized.split_whitespace() {
        let bucket = crate::hashing::hash_to_u64(word.as_bytes()) as usize % MOCK_EMBEDDING_DIM;
        vector[bucket] += 1.0;

        let chars: Vec<char> = word.chars().collect();
        for trigram in chars.windows(3) {
            let feature: String = trigram.iter().collect();
            let bucket =
                crate::hashing::hash_to_u64(feature.as_bytes()) as usize % MOCK_EMBEDDING_DIM;
            vector[bucket] += 0.5;
        }
    }

    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    } else {
        // Empty text still needs a valid unit vector.
        vector[0] = 1.0;
    }

    vector
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let na: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        let nb: f32 = b.iter().map(|v| v * v).sum::<f32>().sqrt();
        dot / (na * nb)
    }

    #[tokio::test]
    async fn test_mock_embedder_is_deterministic() {
        let embedder = MockEmbedder::new();

        let a = embedder.embed("explain the borrow checker").await.unwrap();
        let b = embedder.embed("explain the borrow checker").await.unwrap();

        assert_eq!(a, b);
        assert_eq!(a.len(), MOCK_EMBEDDING_DIM);
    }

    #[tokio::test]
    async fn test_mock_embedder_identical_text_cosine_one() {
        let embedder = MockEmbedder::new();

        let a = embedder.embed("list all functions in utils.py").await.unwrap();
        let b = embedder.embed("list all functions in utils.py").await.unwrap();

        assert!((cosine(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_mock_embedder_distinct_text_lower_similarity() {
        let embedder = MockEmbedder::new();

        let a = embedder.embed("list all functions in utils.py").await.unwrap();
        let b = embedder
            .embed("summarize the quarterly financial report")
            .await
            .unwrap();

        assert!(cosine(&a, &b) < 0.85);
    }

    #[tokio::test]
    async fn test_mock_embedder_vectors_are_normalized() {
        let embedder = MockEmbedder::new();

        for text in ["", "one", "a slightly longer query text"] {
            let v = embedder.embed(text).await.unwrap();
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-5, "norm {norm} for {text:?}");
        }
    }
}
