use thiserror::Error;

use crate::provider::ProviderError;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The model call for a routed query failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// A task servicing the request was lost (panic or runtime shutdown).
    #[error("request task failed: {message}")]
    TaskFailed {
        /// Error message.
        message: String,
    },
}
