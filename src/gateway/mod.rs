//! HTTP gateway (Axum).
//!
//! Thin JSON surface over the orchestrator for tool-layer callers, plus the
//! operator endpoints: escalation pins, cost summaries, cache admin, config
//! reload, and the health probes.

pub mod error;
pub mod handler;
pub mod payload;
pub mod state;


use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::HeaderValue},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use error::{ErrorResponse, GatewayError};
pub use handler::{
    cache_admin_handler, config_reload_handler, cost_summary_handler, escalate_handler,
    route_handler,
};
pub use state::HandlerState;

use crate::embedding::Embedder;
use crate::provider::ModelProvider;
use crate::vectordb::VectorIndex;

/// Response header carrying the gateway's verdict for the request.
pub const TOLLGATE_STATUS_HEADER: &str = "x-tollgate-status";
pub const TOLLGATE_STATUS_HEALTHY: &str = "healthy";
pub const TOLLGATE_STATUS_READY: &str = "ready";
pub const TOLLGATE_STATUS_ERROR: &str = "error";
pub const TOLLGATE_STATUS_HIT: &str = "hit";
pub const TOLLGATE_STATUS_MISS: &str = "miss";

pub fn create_router_with_state<E, V, P>(state: HandlerState<E, V, P>) -> Router
where
    E: Embedder + 'static,
    V: VectorIndex + 'static,
    P: ModelProvider + 'static,
{
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/v1/route", post(route_handler))
        .route("/v1/escalate", post(escalate_handler))
        .route("/v1/cost/summary", get(cost_summary_handler))
        .route("/v1/cache/admin", post(cache_admin_handler))
        .route("/v1/config/reload", post(config_reload_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(serde::Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(serde::Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub components: ComponentStatus,
}

#[derive(serde::Serialize)]
pub struct ComponentStatus {
    pub http: &'static str,
    pub vectordb: &'static str,
    pub config_version: u64,
}

#[tracing::instrument]
pub async fn health_handler() -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        TOLLGATE_STATUS_HEADER,
        HeaderValue::from_static(TOLLGATE_STATUS_HEALTHY),
    );

    (
        StatusCode::OK,
        headers,
        Json(HealthResponse { status: "ok" }),
    )
        .into_response()
}

#[tracing::instrument(skip(state))]
pub async fn ready_handler<E, V, P>(State(state): State<HandlerState<E, V, P>>) -> Response
where
    E: Embedder + 'static,
    V: VectorIndex + 'static,
    P: ModelProvider + 'static,
{
    let vectordb_status = if state.orchestrator.cache().index_ready().await {
        TOLLGATE_STATUS_READY
    } else {
        "pending"
    };

    let components = ComponentStatus {
        http: TOLLGATE_STATUS_READY,
        vectordb: vectordb_status,
        config_version: state.orchestrator.config().snapshot().version,
    };

    let is_ready = components.vectordb == TOLLGATE_STATUS_READY;
    let status_code = if is_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let status_msg = if is_ready { "ok" } else { "pending" };

    let mut headers = HeaderMap::new();
    headers.insert(
        TOLLGATE_STATUS_HEADER,
        HeaderValue::from_str(status_msg).unwrap_or(HeaderValue::from_static(TOLLGATE_STATUS_ERROR)),
    );

    (
        status_code,
        headers,
        Json(ReadyResponse {
            status: status_msg,
            components,
        }),
    )
        .into_response()
}
