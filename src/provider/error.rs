use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// The upstream model call failed (transport, auth, or provider error).
    #[error("provider request failed for model '{model}': {message}")]
    RequestFailed {
        /// Model the request was sent to.
        model: String,
        /// Error message.
        message: String,
    },

    /// The provider answered but the response carried no usable text.
    #[error("provider returned an empty response for model '{model}'")]
    EmptyResponse {
        /// Model the request was sent to.
        model: String,
    },
}
