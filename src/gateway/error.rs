use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use super::{TOLLGATE_STATUS_ERROR, TOLLGATE_STATUS_HEADER};
use crate::orchestrator::OrchestratorError;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("config reload rejected: {0}")]
    ConfigReload(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<OrchestratorError> for GatewayError {
    fn from(e: OrchestratorError) -> Self {
        match e {
            OrchestratorError::Provider(inner) => GatewayError::Provider(inner.to_string()),
            OrchestratorError::TaskFailed { message } => GatewayError::Internal(message),
        }
    }
}

#[derive(serde::Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, tollgate_status) = match &self {
            GatewayError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            GatewayError::Provider(_) => (StatusCode::BAD_GATEWAY, "provider_error"),
            GatewayError::Cache(_) => (StatusCode::INTERNAL_SERVER_ERROR, "cache_error"),
            GatewayError::ConfigReload(_) => (StatusCode::UNPROCESSABLE_ENTITY, "config_rejected"),
            GatewayError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            TOLLGATE_STATUS_HEADER,
            HeaderValue::from_str(tollgate_status)
                .unwrap_or(HeaderValue::from_static(TOLLGATE_STATUS_ERROR)),
        );

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: status.as_u16(),
        });

        (status, headers, body).into_response()
    }
}
