//! HTTP front end.
//!
//! # Endpoints
//!
//! - `POST /webhook` - Accepts GitHub webhook deliveries (returns 202 Accepted)
//! - `GET /api/v1/pending` - Lists pending delayed actions as JSON
//! - `GET /health` - Returns 200 if the server is running

use std::sync::Arc;

use octocrab::Octocrab;

use crate::effects::GitHubInterpreter;
use crate::engine::WorkerHandle;
use crate::github::OctocrabClient;
use crate::scheduler::Scheduler;
use crate::types::RepoId;
use crate::webhooks::WebhookSecret;

pub mod health;
pub mod pending;
pub mod webhook;

pub use health::health_handler;
pub use pending::pending_handler;
pub use webhook::webhook_handler;

/// Produces a GitHub client scoped to the repository of a delivery.
pub trait ClientFactory: Send + Sync + 'static {
    type Client: GitHubInterpreter + Send + Sync + 'static;

    fn for_repo(&self, repo: &RepoId) -> Arc<Self::Client>;
}

impl ClientFactory for Octocrab {
    type Client = OctocrabClient;

    fn for_repo(&self, repo: &RepoId) -> Arc<OctocrabClient> {
        Arc::new(OctocrabClient::new(self.clone(), repo.clone()))
    }
}

/// Shared application state, passed to handlers via axum's `State` extractor.
pub struct AppState<F: ClientFactory> {
    inner: Arc<AppStateInner<F>>,
}

impl<F: ClientFactory> Clone for AppState<F> {
    fn clone(&self) -> Self {
        AppState {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct AppStateInner<F: ClientFactory> {
    webhook_secret: WebhookSecret,
    clients: F,
    worker: WorkerHandle<F::Client>,
    scheduler: Scheduler,
}

impl<F: ClientFactory> AppState<F> {
    pub fn new(
        webhook_secret: WebhookSecret,
        clients: F,
        worker: WorkerHandle<F::Client>,
        scheduler: Scheduler,
    ) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                webhook_secret,
                clients,
                worker,
                scheduler,
            }),
        }
    }

    pub fn webhook_secret(&self) -> &WebhookSecret {
        &self.inner.webhook_secret
    }

    pub fn clients(&self) -> &F {
        &self.inner.clients
    }

    pub fn worker(&self) -> &WorkerHandle<F::Client> {
        &self.inner.worker
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router<F: ClientFactory>(app_state: AppState<F>) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/webhook", post(webhook_handler::<F>))
        .route("/api/v1/pending", get(pending_handler::<F>))
        .route("/health", get(health_handler))
        .with_state(app_state)
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    use crate::engine::{Engine, EventWorker};
    use crate::executor::ExecutorConfig;
    use crate::rules::RuleSet;
    use crate::test_utils::FakeGitHub;

    const SECRET: &str = "test-secret";

    const RULES: &str = "
labels:
  wontfix: close
  stale:
    action: close
    delay: 1h
";

    /// Hands every repository the same fake.
    struct SharedFake(Arc<FakeGitHub>);

    impl ClientFactory for SharedFake {
        type Client = FakeGitHub;

        fn for_repo(&self, _repo: &RepoId) -> Arc<FakeGitHub> {
            Arc::clone(&self.0)
        }
    }

    struct Harness {
        app: AppState<SharedFake>,
        github: Arc<FakeGitHub>,
        scheduler: Scheduler,
    }

    fn harness() -> Harness {
        let shutdown = CancellationToken::new();
        let scheduler = Scheduler::new(shutdown.child_token());
        let rules = RuleSet::from_yaml(RULES).unwrap();
        let engine = Engine::new(Arc::new(rules), scheduler.clone(), ExecutorConfig::default());
        let worker = EventWorker::spawn(engine, 8, &shutdown);
        let github = Arc::new(FakeGitHub::new());
        let app = AppState::new(
            WebhookSecret::new(SECRET),
            SharedFake(github.clone()),
            worker,
            scheduler.clone(),
        );
        Harness {
            app,
            github,
            scheduler,
        }
    }

    fn labeled(label: &str) -> serde_json::Value {
        serde_json::json!({
            "action": "labeled",
            "label": { "name": label },
            "issue": { "number": 42, "state": "open", "labels": [] },
            "repository": { "owner": { "login": "octocat" }, "name": "hello-world" }
        })
    }

    fn webhook_request(secret: &str, event_type: &str, body: &serde_json::Value) -> Request<Body> {
        let body_bytes = serde_json::to_vec(body).unwrap();
        let signature = WebhookSecret::new(secret).sign(&body_bytes).unwrap();

        Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json")
            .header("x-github-event", event_type)
            .header("x-github-delivery", "550e8400-e29b-41d4-a716-446655440000")
            .header("x-hub-signature-256", signature)
            .body(Body::from(body_bytes))
            .unwrap()
    }

    async fn eventually(mut condition: impl FnMut() -> bool) {
        for _ in 0..100 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition never became true");
    }

    #[tokio::test]
    async fn health_returns_200() {
        let app = build_router(harness().app);

        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn webhook_runs_immediate_action() {
        let harness = harness();
        let app = build_router(harness.app);

        let response = app
            .oneshot(webhook_request(SECRET, "issues", &labeled("wontfix")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let github = harness.github;
        eventually(|| github.count("set_issue_state") == 1).await;
    }

    #[tokio::test]
    async fn webhook_invalid_signature_returns_401() {
        let harness = harness();
        let app = build_router(harness.app);

        let response = app
            .oneshot(webhook_request("wrong-secret", "issues", &labeled("wontfix")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(harness.github.calls().is_empty());
    }

    #[tokio::test]
    async fn webhook_missing_event_header_returns_400() {
        let app = build_router(harness().app);
        let body_bytes = serde_json::to_vec(&labeled("wontfix")).unwrap();
        let signature = WebhookSecret::new(SECRET).sign(&body_bytes).unwrap();

        let request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("x-github-delivery", "550e8400-e29b-41d4-a716-446655440002")
            .header("x-hub-signature-256", signature)
            .body(Body::from(body_bytes))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn webhook_malformed_payload_returns_400() {
        let app = build_router(harness().app);
        let body = serde_json::json!({ "action": "labeled" });

        let response = app
            .oneshot(webhook_request(SECRET, "issues", &body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn webhook_ignored_event_returns_202() {
        let harness = harness();
        let app = build_router(harness.app);
        let body = serde_json::json!({ "zen": "Keep it logically awesome." });

        let response = app
            .oneshot(webhook_request(SECRET, "ping", &body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(harness.scheduler.pending_count(), 0);
    }

    #[tokio::test]
    async fn pending_lists_delayed_actions() {
        let harness = harness();
        let app = build_router(harness.app);

        let response = app
            .clone()
            .oneshot(webhook_request(SECRET, "issues", &labeled("stale")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let scheduler = harness.scheduler;
        eventually(|| scheduler.pending_count() == 1).await;

        let request = Request::builder()
            .uri("/api/v1/pending")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let pending: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let pending = pending.as_array().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0]["action"], "close");
        assert_eq!(pending[0]["target"], 42);
        assert_eq!(pending[0]["delay_secs"], 3600);
    }
}
