use axum::{
    Json,
    extract::{Query as UrlQuery, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use std::time::Duration;
use tracing::{info, instrument};

use super::error::GatewayError;
use super::payload::{
    CacheAdminRequest, ConfigReloadResponse, CostSummaryQuery, EscalateAction, EscalateRequest,
    EscalateResponse, RouteRequest, RouteResponse,
};
use super::state::HandlerState;
use super::{TOLLGATE_STATUS_HEADER, TOLLGATE_STATUS_HIT, TOLLGATE_STATUS_MISS};
use crate::cache::CacheError;
use crate::embedding::Embedder;
use crate::provider::ModelProvider;
use crate::query::Query;
use crate::vectordb::VectorIndex;

/// `POST /v1/route`: runs one query through the full pipeline.
#[instrument(skip(state, request))]
pub async fn route_handler<E, V, P>(
    State(state): State<HandlerState<E, V, P>>,
    Json(request): Json<RouteRequest>,
) -> Result<Response, GatewayError>
where
    E: Embedder + 'static,
    V: VectorIndex + 'static,
    P: ModelProvider + 'static,
{
    request.validate()?;

    let mut query = Query::new(request.text, request.task_type);
    if let Some(tokens) = request.token_estimate {
        query = query.with_token_estimate(tokens);
    }
    if let Some(session_id) = request.session_id {
        query = query.with_session(session_id);
    }
    if let Some(tier) = request.tier_override {
        query = query.with_explicit_override(tier);
    }
    if let Some(context_ref) = request.context_ref {
        query = query.with_context_ref(context_ref);
    }
    let query_id = query.id;

    let outcome = state.orchestrator.handle(query, &request.scope).await?;

    let status = if outcome.cache_hit {
        TOLLGATE_STATUS_HIT
    } else {
        TOLLGATE_STATUS_MISS
    };
    let mut headers = HeaderMap::new();
    headers.insert(TOLLGATE_STATUS_HEADER, HeaderValue::from_static(status));

    Ok((
        StatusCode::OK,
        headers,
        Json(RouteResponse {
            query_id,
            response: outcome.response_text,
            tier: outcome.tier_used,
            cache_hit: outcome.cache_hit,
            cost: outcome.cost,
            routing_reason: outcome.routing_reason,
            cache_entry_id: outcome.cache_entry_id,
        }),
    )
        .into_response())
}

/// `POST /v1/escalate`: pins or clears a session-level tier override.
#[instrument(skip(state, request))]
pub async fn escalate_handler<E, V, P>(
    State(state): State<HandlerState<E, V, P>>,
    Json(request): Json<EscalateRequest>,
) -> Result<Json<EscalateResponse>, GatewayError>
where
    E: Embedder + 'static,
    V: VectorIndex + 'static,
    P: ModelProvider + 'static,
{
    if request.session_id.trim().is_empty() {
        return Err(GatewayError::InvalidRequest(
            "session_id must be a non-empty string".to_string(),
        ));
    }

    let escalation = state.orchestrator.escalation();
    let pinned = match request.action {
        EscalateAction::Pin => {
            let tier = request.tier.ok_or_else(|| {
                GatewayError::InvalidRequest("pin requires a tier".to_string())
            })?;
            let reason = request.reason.as_deref().unwrap_or("operator");
            escalation.pin_session(&request.session_id, tier, reason);
            Some(tier)
        }
        EscalateAction::Clear => {
            escalation.clear_session(&request.session_id);
            None
        }
    };

    Ok(Json(EscalateResponse {
        session_id: request.session_id,
        pinned,
    }))
}

/// `GET /v1/cost/summary`: ledger rollup over a trailing window.
#[instrument(skip(state))]
pub async fn cost_summary_handler<E, V, P>(
    State(state): State<HandlerState<E, V, P>>,
    UrlQuery(params): UrlQuery<CostSummaryQuery>,
) -> Result<Response, GatewayError>
where
    E: Embedder + 'static,
    V: VectorIndex + 'static,
    P: ModelProvider + 'static,
{
    let summary = state
        .orchestrator
        .tracker()
        .summarize(Duration::from_secs(params.window_secs));

    Ok(Json(summary).into_response())
}

/// `POST /v1/cache/admin`: operator cache management, one operation per call.
#[instrument(skip(state, request))]
pub async fn cache_admin_handler<E, V, P>(
    State(state): State<HandlerState<E, V, P>>,
    Json(request): Json<CacheAdminRequest>,
) -> Result<Json<serde_json::Value>, GatewayError>
where
    E: Embedder + 'static,
    V: VectorIndex + 'static,
    P: ModelProvider + 'static,
{
    let cache = state.orchestrator.cache();

    let body = match request {
        CacheAdminRequest::Clear => {
            let removed = cache.clear_all().await.map_err(admin_error)?;
            serde_json::json!({ "removed": removed })
        }
        CacheAdminRequest::ClearPattern { pattern } => {
            let removed = cache
                .clear_scope_pattern(&pattern)
                .await
                .map_err(admin_error)?;
            serde_json::json!({ "removed": removed })
        }
        CacheAdminRequest::Stats => serde_json::json!({ "stats": cache.stats() }),
        CacheAdminRequest::Export => serde_json::json!({ "entries": cache.export() }),
        CacheAdminRequest::Import { entries } => {
            let imported = cache.import(entries).await.map_err(admin_error)?;
            serde_json::json!({ "imported": imported })
        }
        CacheAdminRequest::Feedback {
            entry_id,
            quality_score,
        } => {
            let updated = cache.record_feedback(entry_id, quality_score);
            serde_json::json!({ "updated": updated })
        }
        CacheAdminRequest::Evict => {
            let settings = state.orchestrator.config().snapshot().cache.clone();
            let report = cache.evict(&settings).await;
            serde_json::json!({ "report": report })
        }
    };

    Ok(Json(body))
}

/// `POST /v1/config/reload`: re-reads the config source and swaps it in.
#[instrument(skip(state))]
pub async fn config_reload_handler<E, V, P>(
    State(state): State<HandlerState<E, V, P>>,
) -> Result<Json<ConfigReloadResponse>, GatewayError>
where
    E: Embedder + 'static,
    V: VectorIndex + 'static,
    P: ModelProvider + 'static,
{
    let config = state
        .orchestrator
        .config()
        .reload()
        .map_err(|e| GatewayError::ConfigReload(e.to_string()))?;

    info!(version = config.version, "config reloaded");
    Ok(Json(ConfigReloadResponse {
        version: config.version,
    }))
}

fn admin_error(e: CacheError) -> GatewayError {
    match e {
        CacheError::ImportRejected { .. } => GatewayError::InvalidRequest(e.to_string()),
        other => GatewayError::Cache(other.to_string()),
    }
}
