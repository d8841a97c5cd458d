use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Top-level error type the HTTP frontend maps to a response. Wraps
/// every layer's own error type: `InvalidRequest` -> 400, `Cancelled` ->
/// 499 (non-standard but widely used for client-cancelled requests),
/// everything else -> 500.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("request cancelled")]
    Cancelled,
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("policy domain load error: {0}")]
    PolicyDomainLoad(String),
    #[error("internal error: {0}")]
    Internal(String),
    #[error("server bind error")]
    ServerBind(#[from] std::io::Error),
}

impl From<decision_engine::PipelineError> for AppError {
    fn from(err: decision_engine::PipelineError) -> Self {
        match err {
            decision_engine::PipelineError::InvalidRequest(msg) => AppError::InvalidRequest(msg),
            decision_engine::PipelineError::Cancelled => AppError::Cancelled,
            decision_engine::PipelineError::EvalError(msg) => AppError::Internal(msg),
            decision_engine::PipelineError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<policy_domain::LoadError> for AppError {
    fn from(err: policy_domain::LoadError) -> Self {
        AppError::PolicyDomainLoad(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            // 499 has no StatusCode constant in the http crate; the closest
            // registered status for a request the client gave up on is 460-ish
            // territory reserved for proxies, so this uses the same code proxy
            // ext_authz frontends use for a cancelled check.
            AppError::Cancelled => (StatusCode::from_u16(499).unwrap(), "CANCELLED"),
            AppError::Configuration(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "CONFIGURATION_ERROR")
            }
            AppError::PolicyDomainLoad(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "POLICY_DOMAIN_ERROR")
            }
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            AppError::ServerBind(_) => (StatusCode::INTERNAL_SERVER_ERROR, "SERVER_ERROR"),
        };

        match &self {
            AppError::InvalidRequest(_) => tracing::debug!("{self}"),
            AppError::Cancelled => tracing::info!("{self}"),
            _ => tracing::error!("{self}"),
        }

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": self.to_string(),
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }
        }));

        (status, body).into_response()
    }
}
