//! Generic HTTP PDP server: `POST /authorize`, `GET
//! /openapi.yaml`, `GET /swagger-ui/*`. Binding happens before
//! `start()` returns — the race the design notes flag against the
//! original server (callers unable to tell bind succeeded) can't occur
//! here because `TcpListener::bind` is awaited inline, before the
//! request-serving task is ever spawned.

use crate::auxdata::AuxData;
use crate::error::AppError;
use crate::lifecycle::Lifecycle;
use access_log::PolicyOutcome;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use decision_engine::{Cancellation, DecisionEngine};
use policy_domain::Porc;
use policy_eval::PolicyEvaluator;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

pub struct AppState<E: PolicyEvaluator> {
    pub engine: Arc<DecisionEngine<E>>,
    pub auxdata: Arc<AuxData>,
}

impl<E: PolicyEvaluator> Clone for AppState<E> {
    fn clone(&self) -> Self {
        AppState {
            engine: self.engine.clone(),
            auxdata: self.auxdata.clone(),
        }
    }
}

/// Documents the `POST /authorize` wire shape; the handler itself
/// accepts any JSON object and normalizes it through [`Porc::from_value`]
/// so the same validation applies regardless of frontend.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthorizeRequest {
    pub principal: serde_json::Value,
    pub operation: serde_json::Value,
    pub resource: serde_json::Value,
    pub context: serde_json::Value,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PolicyOutcomeDto {
    pub mrn: String,
    pub allow: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<PolicyOutcome> for PolicyOutcomeDto {
    fn from(outcome: PolicyOutcome) -> Self {
        PolicyOutcomeDto {
            mrn: outcome.mrn,
            allow: outcome.allow,
            reason: outcome.reason,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthorizeResponse {
    pub allow: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<Vec<PolicyOutcomeDto>>,
}

#[utoipa::path(
    post,
    path = "/authorize",
    request_body = AuthorizeRequest,
    responses(
        (status = 200, description = "Decision reached (Allow or Deny)", body = AuthorizeResponse),
        (status = 400, description = "Malformed PORC request body"),
        (status = 500, description = "Internal evaluator error"),
    )
)]
pub async fn authorize<E>(
    State(state): State<AppState<E>>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<AuthorizeResponse>, AppError>
where
    E: PolicyEvaluator + 'static,
{
    let mut porc =
        Porc::from_value(body).map_err(|e| AppError::InvalidRequest(e.to_string()))?;
    state.auxdata.augment(&mut porc);

    let decision = state.engine.decide(porc, &Cancellation::new())?;
    let trace = if decision.trace.is_empty() {
        None
    } else {
        Some(decision.trace.into_iter().map(PolicyOutcomeDto::from).collect())
    };

    Ok(Json(AuthorizeResponse {
        allow: decision.allow,
        trace,
    }))
}

async fn openapi_yaml() -> impl IntoResponse {
    let yaml = crate::openapi::ApiDoc::openapi()
        .to_yaml()
        .unwrap_or_else(|e| format!("# failed to render OpenAPI document: {e}"));
    ([(axum::http::header::CONTENT_TYPE, "application/yaml")], yaml)
}

pub fn build_router<E>(state: AppState<E>, request_timeout: Duration) -> Router
where
    E: PolicyEvaluator + 'static,
{
    Router::new()
        .route("/authorize", post(authorize::<E>))
        .route("/openapi.yaml", get(openapi_yaml))
        .merge(SwaggerUi::new("/swagger-ui").url("/openapi.json", crate::openapi::ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}

/// Binds the listener and spawns the request-serving task, returning
/// once the bind has succeeded: no more "did it bind" ambiguity for the
/// caller.
pub async fn start<E>(
    addr: &str,
    engine: Arc<DecisionEngine<E>>,
    auxdata: Arc<AuxData>,
    request_timeout: Duration,
) -> Result<(Lifecycle, SocketAddr), AppError>
where
    E: PolicyEvaluator + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;

    let state = AppState { engine, auxdata };
    let app = build_router(state, request_timeout);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<Duration>();
    let join_handle = tokio::spawn(async move {
        let shutdown_signal = async move {
            let deadline = shutdown_rx.await.unwrap_or(Duration::from_secs(0));
            info!(?deadline, "http server received shutdown signal");
        };
        if let Err(err) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
        {
            tracing::error!(error = %err, "http server exited with an error");
        }
    });

    info!(%local_addr, "http PDP server listening");
    Ok((Lifecycle::new(shutdown_tx, join_handle), local_addr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use access_log::{AccessLogSink, AccessRecord};
    use policy_domain::loader::load_policy_domain;
    use policy_eval::CedarPolicyEvaluator;
    use serde_json::json;

    struct NoopSink;
    impl AccessLogSink for NoopSink {
        fn submit(&self, _record: AccessRecord) {}
    }

    const ALLOW_ALL: &str = r#"
apiVersion: iamlite.manetu.io/v1alpha3
kind: PolicyDomain
metadata:
  name: allow-all
spec:
  policies:
    - mrn: "mrn:iam:policy:allow-all"
      name: allow-all
      source: "permit(principal, action, resource);"
  operations:
    - name: any
      selectors: [".*"]
      policy: "mrn:iam:policy:allow-all"
"#;

    fn test_engine() -> Arc<DecisionEngine<CedarPolicyEvaluator>> {
        let im = load_policy_domain(ALLOW_ALL.as_bytes()).unwrap();
        Arc::new(
            DecisionEngine::new(Arc::new(im), CedarPolicyEvaluator::default(), Arc::new(NoopSink))
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn start_binds_before_returning_and_serves_requests() {
        let (lifecycle, addr) = start(
            "127.0.0.1:0",
            test_engine(),
            Arc::new(AuxData::empty()),
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        let body = json!({
            "principal": {"sub": "alice"},
            "operation": "api:read",
            "resource": {"id": "doc:1"},
            "context": {},
        });
        let response = reqwest::Client::new()
            .post(format!("http://{addr}/authorize"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let parsed: serde_json::Value = response.json().await.unwrap();
        assert_eq!(parsed["allow"], json!(true));

        lifecycle.stop(Duration::from_secs(5)).await;
    }

    #[tokio::test]
    async fn malformed_porc_is_a_400() {
        let (lifecycle, addr) = start(
            "127.0.0.1:0",
            test_engine(),
            Arc::new(AuxData::empty()),
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        let response = reqwest::Client::new()
            .post(format!("http://{addr}/authorize"))
            .json(&json!({"principal": {"sub": "alice"}}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);

        lifecycle.stop(Duration::from_secs(5)).await;
    }

    #[tokio::test]
    async fn openapi_yaml_is_served() {
        let (lifecycle, addr) = start(
            "127.0.0.1:0",
            test_engine(),
            Arc::new(AuxData::empty()),
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        let response = reqwest::Client::new()
            .get(format!("http://{addr}/openapi.yaml"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        lifecycle.stop(Duration::from_secs(5)).await;
    }
}
