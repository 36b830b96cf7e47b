//! Request-scoped query model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tier::Tier;

/// Coarse task category supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Search,
    Explain,
    Analyze,
    Debug,
    Generate,
    Refactor,
    Other,
}

impl Default for TaskType {
    fn default() -> Self {
        TaskType::Other
    }
}

/// An incoming query. Created per request, discarded after the response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub id: Uuid,
    pub text: String,
    /// Caller-supplied token estimate. When absent, routing heuristics fall
    /// back to a character-based estimate; the cost ledger never uses either.
    pub token_estimate: Option<u32>,
    #[serde(default)]
    pub task_type: TaskType,
    pub context_ref: Option<String>,
    /// Explicit request-parameter override (lowest escalation precedence).
    pub explicit_override: Option<Tier>,
    pub session_id: Option<String>,
    pub received_at: DateTime<Utc>,
}

/// Rough chars-per-token divisor for routing heuristics.
const CHARS_PER_TOKEN: usize = 4;

impl Query {
    /// Creates a query with a fresh id and the current timestamp.
    pub fn new(text: impl Into<String>, task_type: TaskType) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            token_estimate: None,
            task_type,
            context_ref: None,
            explicit_override: None,
            session_id: None,
            received_at: Utc::now(),
        }
    }

    pub fn with_token_estimate(mut self, tokens: u32) -> Self {
        self.token_estimate = Some(tokens);
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_explicit_override(mut self, tier: Tier) -> Self {
        self.explicit_override = Some(tier);
        self
    }

    pub fn with_context_ref(mut self, context_ref: impl Into<String>) -> Self {
        self.context_ref = Some(context_ref.into());
        self
    }

    /// Token estimate used by routing heuristics only: the caller's estimate
    /// when present, otherwise a character-count approximation.
    pub fn estimated_tokens(&self) -> u32 {
        self.token_estimate
            .unwrap_or_else(|| (self.text.chars().count() / CHARS_PER_TOKEN) as u32)
    }

    /// Returns `true` if the query text is empty or whitespace.
    pub fn is_empty_text(&self) -> bool {
        self.text.trim().is_empty()
    }
}
