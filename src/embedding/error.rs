use thiserror::Error;

#[derive(Debug, Error)]
/// Errors from the embedding collaborator.
///
/// Cache callers treat every variant as a miss; nothing here aborts a
/// request.
pub enum EmbeddingError {
    /// The embedding service did not answer within the deadline.
    #[error("embedding request timed out after {timeout_ms}ms")]
    Timeout {
        /// Configured deadline.
        timeout_ms: u64,
    },

    /// Transport-level failure reaching the service.
    #[error("embedding request failed: {message}")]
    RequestFailed {
        /// Error message.
        message: String,
    },

    /// The service answered with a non-success status.
    #[error("embedding service returned status {status}")]
    BadStatus {
        /// HTTP status code.
        status: u16,
    },

    /// The response body did not contain a usable vector.
    #[error("embedding response was malformed: {message}")]
    MalformedResponse {
        /// Error message.
        message: String,
    },
}
