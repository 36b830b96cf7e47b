//! Model-provider integration.
//!
//! One trait seam over the upstream LLM call so the orchestrator and tests
//! never touch provider SDKs directly. Token counts come from the provider's
//! own usage accounting; the ledger never estimates them from text length.

pub mod error;

pub use error::ProviderError;

use genai::Client;
use genai::chat::{ChatMessage, ChatOptions, ChatRequest};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, instrument};

/// A completed model invocation.
#[derive(Debug, Clone)]
pub struct ModelResponse {
    /// Response text.
    pub text: String,
    /// Prompt tokens as reported by the provider.
    pub input_tokens: u64,
    /// Completion tokens as reported by the provider.
    pub output_tokens: u64,
}

/// Invokes a model and reports actual token usage.
pub trait ModelProvider: Send + Sync {
    /// Sends `prompt` to `model`, bounded to `max_tokens` of output.
    fn invoke(
        &self,
        model: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> impl std::future::Future<Output = Result<ModelResponse, ProviderError>> + Send;
}

/// Multi-provider client backed by `genai`; the model name selects the
/// upstream provider.
#[derive(Debug, Clone, Default)]
pub struct GenaiProvider {
    client: Client,
}

impl GenaiProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModelProvider for GenaiProvider {
    #[instrument(skip(self, prompt), fields(model = %model))]
    async fn invoke(
        &self,
        model: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<ModelResponse, ProviderError> {
        let request = ChatRequest::new(vec![ChatMessage::user(prompt)]);
        let options = ChatOptions::default().with_max_tokens(max_tokens);

        let response = self
            .client
            .exec_chat(model, request, Some(&options))
            .await
            .map_err(|e| {
                error!(error = %e, "provider request failed");
                ProviderError::RequestFailed {
                    model: model.to_string(),
                    message: e.to_string(),
                }
            })?;

        let text = response
            .first_text()
            .map(str::to_string)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ProviderError::EmptyResponse {
                model: model.to_string(),
            })?;

        let usage = &response.usage;
        Ok(ModelResponse {
            text,
            input_tokens: usage.prompt_tokens.unwrap_or(0).max(0) as u64,
            output_tokens: usage.completion_tokens.unwrap_or(0).max(0) as u64,
        })
    }
}

/// Canned provider for tests and offline deployments.
///
/// Echoes a deterministic response and fixed token counts so cost arithmetic
/// in tests can be checked by hand.
#[derive(Debug)]
pub struct MockModelProvider {
    input_tokens: u64,
    output_tokens: u64,
    fail: AtomicBool,
}

impl Default for MockModelProvider {
    fn default() -> Self {
        Self {
            input_tokens: 10,
            output_tokens: 10,
            fail: AtomicBool::new(false),
        }
    }
}

impl MockModelProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixes the usage every response reports.
    pub fn with_usage(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            fail: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent invocation fail.
    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::Relaxed);
    }
}

impl ModelProvider for MockModelProvider {
    async fn invoke(
        &self,
        model: &str,
        prompt: &str,
        _max_tokens: u32,
    ) -> Result<ModelResponse, ProviderError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(ProviderError::RequestFailed {
                model: model.to_string(),
                message: "injected failure".to_string(),
            });
        }

        Ok(ModelResponse {
            text: format!("mock response ({model}): {prompt}"),
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
        })
    }
}
