//! Request orchestration.
//!
//! Composes the pipeline for one query: escalation resolution, cache lookup,
//! routing, the model call, then the fire-and-forget store and ledger write.
//! Each request works from one immutable config snapshot end to end.

pub mod error;


pub use error::OrchestratorError;

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, warn};

use crate::cache::{CachedResponse, SemanticCache};
use crate::config::ConfigStore;
use crate::cost::{CostTracker, UsageDraft};
use crate::embedding::Embedder;
use crate::escalation::EscalationManager;
use crate::provider::ModelProvider;
use crate::query::Query;
use crate::routing::{RoutingDecision, RoutingEngine};
use crate::tier::Tier;
use crate::vectordb::VectorIndex;

/// Ledger reason for a query answered from the cache.
pub const REASON_CACHE_HIT: &str = "cache_hit";

/// What one handled query produced.
#[derive(Debug, Clone)]
pub struct RouteOutcome {
    pub response_text: String,
    /// Tier that produced the text; for a hit, the tier that originally
    /// produced the cached entry.
    pub tier_used: Tier,
    pub cache_hit: bool,
    /// Actual spend for this request; zero on hits.
    pub cost: f64,
    pub routing_reason: String,
    /// Cache entry that served a hit, for later quality feedback.
    pub cache_entry_id: Option<u64>,
}

/// Ties the components together; one instance serves all requests.
pub struct Orchestrator<E, V, P> {
    config: Arc<ConfigStore>,
    escalation: Arc<EscalationManager>,
    cache: Arc<SemanticCache<E, V>>,
    provider: Arc<P>,
    tracker: CostTracker,
}

impl<E, V, P> Orchestrator<E, V, P>
where
    E: Embedder + 'static,
    V: VectorIndex + 'static,
    P: ModelProvider + 'static,
{
    pub fn new(
        config: Arc<ConfigStore>,
        escalation: Arc<EscalationManager>,
        cache: Arc<SemanticCache<E, V>>,
        provider: Arc<P>,
        tracker: CostTracker,
    ) -> Self {
        Self {
            config,
            escalation,
            cache,
            provider,
            tracker,
        }
    }

    /// Handles one query within `scope`.
    ///
    /// An escalation override skips the cache lookup so the caller gets a
    /// fresh response from the pinned tier; the response is still stored for
    /// later automatic traffic. Exactly one usage record is written per
    /// call, failed model attempts included.
    #[instrument(skip(self, query), fields(query_id = %query.id, scope = %scope))]
    pub async fn handle(
        &self,
        query: Query,
        scope: &str,
    ) -> Result<RouteOutcome, OrchestratorError> {
        let snapshot = self.config.snapshot();
        let started = Instant::now();

        let manual = self.escalation.resolve(&query);
        let engine = RoutingEngine::from_config(&snapshot);

        if manual.is_none()
            && let Some(hit) = self.cache.lookup(&query.text, scope, &snapshot.cache).await
        {
            // The counterfactual is what the routed tier would have charged
            // for the tokens the cached response originally consumed.
            let would_be = engine.route(&query);
            let counterfactual = snapshot.tiers.cost(
                would_be.tier,
                hit.response.input_tokens,
                hit.response.output_tokens,
            );

            self.tracker.record(UsageDraft {
                tier: would_be.tier,
                input_tokens: hit.response.input_tokens,
                output_tokens: hit.response.output_tokens,
                cost: 0.0,
                counterfactual_cost: counterfactual,
                cache_hit: true,
                routing_reason: REASON_CACHE_HIT.to_string(),
                latency_ms: elapsed_ms(started),
            });

            debug!(entry_id = hit.entry_id, similarity = hit.similarity, "served from cache");
            return Ok(RouteOutcome {
                response_text: hit.response.text,
                tier_used: hit.source_tier,
                cache_hit: true,
                cost: 0.0,
                routing_reason: REASON_CACHE_HIT.to_string(),
                cache_entry_id: Some(hit.entry_id),
            });
        }

        let decision = engine.route_with_override(&query, manual.as_ref());

        // The paid call runs detached: if the caller disconnects mid-flight
        // the response still lands in the cache and the ledger.
        let task = tokio::spawn(Self::invoke_and_settle(
            Arc::clone(&self.provider),
            Arc::clone(&self.cache),
            self.tracker.clone(),
            Arc::clone(&snapshot),
            decision,
            query.text.clone(),
            scope.to_string(),
            started,
        ));

        task.await
            .map_err(|e| OrchestratorError::TaskFailed {
                message: e.to_string(),
            })?
    }

    #[allow(clippy::too_many_arguments)]
    async fn invoke_and_settle(
        provider: Arc<P>,
        cache: Arc<SemanticCache<E, V>>,
        tracker: CostTracker,
        snapshot: Arc<crate::config::RoutingConfig>,
        decision: RoutingDecision,
        text: String,
        scope: String,
        started: Instant,
    ) -> Result<RouteOutcome, OrchestratorError> {
        let spec = snapshot.tiers.spec(decision.tier);

        let response = match provider.invoke(&spec.model, &text, spec.max_tokens).await {
            Ok(response) => response,
            Err(e) => {
                // Failed attempts are ledger rows too, at zero cost.
                tracker.record(UsageDraft {
                    tier: decision.tier,
                    input_tokens: 0,
                    output_tokens: 0,
                    cost: 0.0,
                    counterfactual_cost: 0.0,
                    cache_hit: false,
                    routing_reason: decision.rule_name.clone(),
                    latency_ms: elapsed_ms(started),
                });
                return Err(e.into());
            }
        };

        let cost = snapshot
            .tiers
            .cost(decision.tier, response.input_tokens, response.output_tokens);
        let counterfactual = snapshot.tiers.cost(
            Tier::Premium,
            response.input_tokens,
            response.output_tokens,
        );

        tracker.record(UsageDraft {
            tier: decision.tier,
            input_tokens: response.input_tokens,
            output_tokens: response.output_tokens,
            cost,
            counterfactual_cost: counterfactual,
            cache_hit: false,
            routing_reason: decision.rule_name.clone(),
            latency_ms: elapsed_ms(started),
        });

        let cached = CachedResponse {
            text: response.text.clone(),
            input_tokens: response.input_tokens,
            output_tokens: response.output_tokens,
        };
        let tier = decision.tier;
        let settings = snapshot.cache.clone();
        tokio::spawn(async move {
            if let Err(e) = cache.store(&text, cached, tier, &scope, &settings).await {
                warn!(error = %e, "failed to store response in cache");
            }
        });

        Ok(RouteOutcome {
            response_text: response.text,
            tier_used: decision.tier,
            cache_hit: false,
            cost,
            routing_reason: decision.rule_name,
            cache_entry_id: None,
        })
    }

    /// The escalation manager, for session pin management.
    pub fn escalation(&self) -> &EscalationManager {
        &self.escalation
    }

    /// The semantic cache, for admin operations.
    pub fn cache(&self) -> &Arc<SemanticCache<E, V>> {
        &self.cache
    }

    /// The usage ledger.
    pub fn tracker(&self) -> &CostTracker {
        &self.tracker
    }

    /// The config store backing request snapshots.
    pub fn config(&self) -> &Arc<ConfigStore> {
        &self.config
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
