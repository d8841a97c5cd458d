//! Proxy ExtAuthz PDP server: speaks the proxy's external
//! authorization `Check` RPC shape — unary and streaming — without a
//! real gRPC transport, since wire encoding is out of scope. The
//! transport-facing edge is a pair of `tokio::sync::mpsc` channels; a
//! real tonic service would sit in front of [`start`] and translate
//! wire frames into [`Job`] values.

use crate::auxdata::AuxData;
use decision_engine::{Cancellation, DecisionEngine, PipelineError};
use policy_domain::Porc;
use policy_eval::PolicyEvaluator;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};

use crate::lifecycle::Lifecycle;

#[derive(Debug, Clone)]
pub struct ExtAuthzConfig {
    /// Service name used when the request carries no explicit `service`
    /// field: `operation.id` then becomes `"<name>:<method>"`.
    pub service_name: String,
    /// Header carrying the caller's identity, joined with auxdata.
    pub identity_header: String,
    /// Header carrying the target resource id; falls back to the
    /// request path when absent.
    pub resource_header: Option<String>,
}

impl Default for ExtAuthzConfig {
    fn default() -> Self {
        ExtAuthzConfig {
            service_name: "envoy".to_string(),
            identity_header: "x-forwarded-user".to_string(),
            resource_header: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckRequest {
    pub service: Option<String>,
    pub method: String,
    pub path: Option<String>,
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckResponse {
    Ok,
    PermissionDenied { reason: Option<String> },
    Cancelled,
}

/// Work handed to the supervisor task spawned by [`start`]. A future
/// transport adapter constructs these from wire frames.
pub enum Job {
    Unary {
        request: CheckRequest,
        respond_to: oneshot::Sender<CheckResponse>,
    },
    Stream {
        requests: mpsc::Receiver<CheckRequest>,
        responses: mpsc::Sender<CheckResponse>,
    },
}

pub struct ExtAuthzServer<E: PolicyEvaluator> {
    engine: Arc<DecisionEngine<E>>,
    auxdata: Arc<AuxData>,
    config: ExtAuthzConfig,
}

impl<E: PolicyEvaluator> ExtAuthzServer<E> {
    fn operation_id(&self, request: &CheckRequest) -> String {
        match (&request.service, &request.path) {
            (Some(service), _) => format!("{service}:{}", request.method),
            (None, Some(path)) => format!("http:{}:{path}", request.method),
            (None, None) => format!("http:{}", request.method),
        }
    }

    fn resource_id(&self, request: &CheckRequest) -> String {
        self.config
            .resource_header
            .as_ref()
            .and_then(|h| request.headers.get(h))
            .cloned()
            .or_else(|| request.path.clone())
            .unwrap_or_default()
    }

    fn build_porc(&self, request: &CheckRequest) -> Result<Porc, String> {
        let sub = request
            .headers
            .get(&self.config.identity_header)
            .cloned()
            .unwrap_or_default();
        let operation_id = if request.service.is_none() && request.path.is_none() {
            format!("{}:{}", self.config.service_name, request.method)
        } else {
            self.operation_id(request)
        };

        let mut porc = Porc::from_value(json!({
            "principal": { "sub": sub },
            "operation": operation_id,
            "resource": { "id": self.resource_id(request) },
            "context": { "headers": request.headers },
        }))
        .map_err(|e| e.to_string())?;
        self.auxdata.augment(&mut porc);
        Ok(porc)
    }

    #[instrument(skip(self, request), fields(method = %request.method))]
    async fn check(&self, request: CheckRequest) -> CheckResponse {
        let porc = match self.build_porc(&request) {
            Ok(porc) => porc,
            Err(err) => {
                warn!(error = %err, "extauthz request could not be normalized to PORC");
                return CheckResponse::PermissionDenied {
                    reason: Some(err),
                };
            }
        };

        match self.engine.decide(porc, &Cancellation::new()) {
            Ok(decision) if decision.allow => CheckResponse::Ok,
            Ok(decision) => CheckResponse::PermissionDenied {
                reason: decision.reason,
            },
            Err(PipelineError::Cancelled) => CheckResponse::Cancelled,
            Err(err) => {
                error!(error = %err, "extauthz decision pipeline failed, failing closed");
                CheckResponse::PermissionDenied {
                    reason: Some("internal evaluator error".to_string()),
                }
            }
        }
    }

    async fn check_stream(
        &self,
        mut requests: mpsc::Receiver<CheckRequest>,
        responses: mpsc::Sender<CheckResponse>,
    ) {
        while let Some(request) = requests.recv().await {
            let response = self.check(request).await;
            if responses.send(response).await.is_err() {
                break;
            }
        }
    }
}

/// Spawns the supervisor task that drains `inbox` and runs each job
/// against the decision pipeline. Creation never blocks; `Lifecycle::stop`
/// stops accepting new jobs and waits for in-flight ones (including
/// open streams) to finish, up to its deadline.
pub fn start<E>(
    mut inbox: mpsc::Receiver<Job>,
    engine: Arc<DecisionEngine<E>>,
    auxdata: Arc<AuxData>,
    config: ExtAuthzConfig,
) -> Lifecycle
where
    E: PolicyEvaluator + 'static,
{
    let server = Arc::new(ExtAuthzServer {
        engine,
        auxdata,
        config,
    });

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<Duration>();
    let join_handle = tokio::spawn(async move {
        let mut inflight = JoinSet::new();
        tokio::pin!(shutdown_rx);

        loop {
            tokio::select! {
                job = inbox.recv() => {
                    match job {
                        Some(Job::Unary { request, respond_to }) => {
                            let server = server.clone();
                            inflight.spawn(async move {
                                let response = server.check(request).await;
                                let _ = respond_to.send(response);
                            });
                        }
                        Some(Job::Stream { requests, responses }) => {
                            let server = server.clone();
                            inflight.spawn(async move {
                                server.check_stream(requests, responses).await;
                            });
                        }
                        None => break,
                    }
                }
                deadline = &mut shutdown_rx => {
                    let deadline = deadline.unwrap_or(Duration::from_secs(0));
                    info!(?deadline, pending = inflight.len(), "extauthz server draining in-flight checks");
                    let _ = tokio::time::timeout(deadline, async {
                        while inflight.join_next().await.is_some() {}
                    })
                    .await;
                    break;
                }
            }
        }
    });

    Lifecycle::new(shutdown_tx, join_handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use access_log::{AccessLogSink, AccessRecord};
    use policy_domain::loader::load_policy_domain;
    use policy_eval::CedarPolicyEvaluator;

    struct NoopSink;
    impl AccessLogSink for NoopSink {
        fn submit(&self, _record: AccessRecord) {}
    }

    const DENY_ALL: &str = r#"
apiVersion: iamlite.manetu.io/v1alpha3
kind: PolicyDomain
metadata:
  name: deny-all
spec:
  policies:
    - mrn: "mrn:iam:policy:deny-all"
      name: deny-all
      source: "forbid(principal, action, resource);"
  operations:
    - name: any
      selectors: [".*"]
      policy: "mrn:iam:policy:deny-all"
"#;

    fn server() -> ExtAuthzServer<CedarPolicyEvaluator> {
        let im = load_policy_domain(DENY_ALL.as_bytes()).unwrap();
        let engine = DecisionEngine::new(
            Arc::new(im),
            CedarPolicyEvaluator::default(),
            Arc::new(NoopSink),
        )
        .unwrap();
        ExtAuthzServer {
            engine: Arc::new(engine),
            auxdata: Arc::new(AuxData::empty()),
            config: ExtAuthzConfig::default(),
        }
    }

    fn request(method: &str) -> CheckRequest {
        let mut headers = HashMap::new();
        headers.insert("x-forwarded-user".to_string(), "alice".to_string());
        CheckRequest {
            service: None,
            method: method.to_string(),
            path: Some("/widgets/1".to_string()),
            headers,
        }
    }

    #[tokio::test]
    async fn denying_policy_maps_to_permission_denied() {
        let server = server();
        let response = server.check(request("GET")).await;
        assert!(matches!(response, CheckResponse::PermissionDenied { .. }));
    }

    #[tokio::test]
    async fn operation_id_uses_http_prefix_when_no_service_given() {
        let server = server();
        let id = server.operation_id(&request("GET"));
        assert_eq!(id, "http:GET:/widgets/1");
    }

    #[tokio::test]
    async fn check_stream_forwards_one_response_per_request() {
        let server = server();
        let (req_tx, req_rx) = mpsc::channel(4);
        let (resp_tx, mut resp_rx) = mpsc::channel(4);

        req_tx.send(request("GET")).await.unwrap();
        req_tx.send(request("POST")).await.unwrap();
        drop(req_tx);

        server.check_stream(req_rx, resp_tx).await;

        let mut count = 0;
        while resp_rx.recv().await.is_some() {
            count += 1;
        }
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn start_drains_inflight_unary_jobs_on_stop() {
        let im = load_policy_domain(DENY_ALL.as_bytes()).unwrap();
        let engine = Arc::new(
            DecisionEngine::new(
                Arc::new(im),
                CedarPolicyEvaluator::default(),
                Arc::new(NoopSink),
            )
            .unwrap(),
        );
        let (inbox_tx, inbox_rx) = mpsc::channel(4);
        let lifecycle = start(inbox_rx, engine, Arc::new(AuxData::empty()), ExtAuthzConfig::default());

        let (respond_to, response_rx) = oneshot::channel();
        inbox_tx
            .send(Job::Unary {
                request: request("GET"),
                respond_to,
            })
            .await
            .unwrap();

        let response = response_rx.await.unwrap();
        assert!(matches!(response, CheckResponse::PermissionDenied { .. }));

        drop(inbox_tx);
        lifecycle.stop(Duration::from_secs(5)).await;
    }
}
