//! Tollgate library crate (used by the server binary and integration tests).
//!
//! Tollgate sits between a retrieval-augmented dev assistant and its model
//! providers, deciding per query which model tier to pay for, answering
//! repeated queries from a semantic cache, and keeping a ledger of what was
//! spent and what was saved.
//!
//! # Public API Surface
//!
//! ## Core Types
//! - [`Query`], [`TaskType`] - the unit of work
//! - [`Tier`], [`TierSpec`], [`TierPricing`] - model tiers and pricing
//! - [`RoutingEngine`], [`RoutingRule`], [`RoutingDecision`] - tier selection
//! - [`SemanticCache`], [`CacheEntry`], [`CacheHit`] - similarity cache
//! - [`EscalationManager`], [`Override`] - manual overrides
//! - [`CostTracker`], [`UsageRecord`], [`CostSummary`] - usage ledger
//! - [`Orchestrator`], [`RouteOutcome`] - per-query composition
//!
//! ## Configuration
//! - [`ServerConfig`] - process env (`TOLLGATE_*`)
//! - [`RoutingConfig`], [`ConfigStore`] - hot-reloadable routing policy
//!
//! ## Collaborators
//! - [`Embedder`] / [`HttpEmbedder`] - embedding service client
//! - [`VectorIndex`] / [`QdrantIndex`] - nearest-neighbor index
//! - [`ModelProvider`] / [`GenaiProvider`] - upstream model calls
//!
//! ## Test/Mock Support
//! [`MockEmbedder`] and [`MockModelProvider`] also back the server's offline
//! stub modes; [`vectordb::MockVectorIndex`] is gated behind
//! `#[cfg(any(test, feature = "mock"))]`.

pub mod cache;
pub mod config;
pub mod cost;
pub mod embedding;
pub mod escalation;
pub mod gateway;
pub mod hashing;
pub mod orchestrator;
pub mod provider;
pub mod query;
pub mod routing;
pub mod tier;
pub mod vectordb;

pub use cache::{CacheEntry, CacheError, CacheHit, CacheStats, CachedResponse, SemanticCache};
pub use config::{ConfigError, ConfigStore, RoutingConfig, ServerConfig};
pub use cost::{CostSummary, CostTracker, UsageDraft, UsageRecord};
pub use embedding::{Embedder, EmbeddingError, HttpEmbedder, MockEmbedder};
pub use escalation::{EscalationManager, Override, OverrideSource};
pub use gateway::{HandlerState, TOLLGATE_STATUS_HEADER, create_router_with_state};
pub use orchestrator::{Orchestrator, OrchestratorError, RouteOutcome};
pub use provider::{GenaiProvider, MockModelProvider, ModelProvider, ProviderError};
pub use query::{Query, TaskType};
pub use routing::{RoutingDecision, RoutingEngine};
pub use routing::rules::RoutingRule;
pub use tier::{Tier, TierPricing, TierSpec};
pub use vectordb::{QdrantIndex, VectorDbError, VectorIndex};
