mod common;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use common::*;
use repo_stats_tracker::actors::{DashboardArgs, DashboardMessage, DashboardSupervisor};
use repo_stats_tracker::api::create_router;
use repo_stats_tracker::auth::{
    AppwriteConfig, AppwriteSessionProvider, SessionProvider, StaticSessionProvider,
};
use repo_stats_tracker::health::AppState;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    supervisor: ractor::ActorRef<DashboardMessage>,
}

impl TestApp {
    async fn new(session: Arc<dyn SessionProvider>) -> Self {
        let base_url = spawn_server(github_router(RequestLog::default())).await;
        let client = Arc::new(client_for(&base_url, session.clone()));

        let (supervisor, _handle) = DashboardSupervisor::spawn(DashboardArgs {
            client,
            target: target(),
            refresh_interval: Duration::from_secs(60),
        })
        .await
        .expect("Failed to spawn dashboard supervisor");

        let router = create_router(AppState {
            supervisor: supervisor.clone(),
            session,
            public_url: "http://localhost:8080/".to_string(),
            start_time: std::time::Instant::now(),
        });

        Self { router, supervisor }
    }

    async fn request(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, axum::http::HeaderMap, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("router never fails");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, headers, json)
    }

    fn shutdown(&self) {
        let _ = self.supervisor.send_message(DashboardMessage::Shutdown);
    }
}

#[tokio::test]
async fn test_liveness_probe() {
    let app = TestApp::new(Arc::new(StaticSessionProvider::anonymous())).await;

    let (status, _, body) = app.request("GET", "/livez", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "alive");
    app.shutdown();
}

#[tokio::test]
async fn test_stats_endpoint_serves_snapshot() {
    let app = TestApp::new(Arc::new(StaticSessionProvider::anonymous())).await;

    let mut body = Value::Null;
    for _ in 0..50 {
        let (status, _, json) = app.request("GET", "/api/stats", None).await;
        assert_eq!(status, StatusCode::OK);
        if !json["last_updated"].is_null() {
            body = json;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    assert_eq!(body["star_count"], 1234);
    assert_eq!(body["fork_count"], 56);
    assert_eq!(body["watcher_count"], 78);
    assert_eq!(body["is_loading"], false);
    assert!(body["error"].is_null());

    let (status, _, health) = app.request("GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
    app.shutdown();
}

#[tokio::test]
async fn test_repository_switch_validates_input() {
    let app = TestApp::new(Arc::new(StaticSessionProvider::anonymous())).await;

    let (status, _, body) = app
        .request(
            "POST",
            "/api/repository",
            Some(serde_json::json!({ "owner": "", "repo": "rust" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap_or_default().contains("Invalid repository"));

    for (owner, repo) in [("..", ".."), ("appwrite", "appwrite?x=1#frag")] {
        let (status, _, _) = app
            .request(
                "POST",
                "/api/repository",
                Some(serde_json::json!({ "owner": owner, "repo": repo })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}/{} accepted", owner, repo);
    }
    let (_, _, dashboard) = app.request("GET", "/api/dashboard", None).await;
    assert_eq!(dashboard["target"]["repo"], "appwrite");

    let (status, _, body) = app
        .request(
            "POST",
            "/api/repository",
            Some(serde_json::json!({ "owner": "rust-lang", "repo": "rust" })),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["success"], true);

    let (_, _, dashboard) = app.request("GET", "/api/dashboard", None).await;
    assert_eq!(dashboard["target"]["owner"], "rust-lang");
    app.shutdown();
}

#[tokio::test]
async fn test_login_without_oauth_provider_is_unavailable() {
    let app = TestApp::new(Arc::new(StaticSessionProvider::with_token("ghp_static"))).await;

    let (status, _, body) = app.request("GET", "/auth/login", None).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap_or_default().contains("not configured"));

    let (status, _, body) = app.request("POST", "/auth/logout", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["success"], false);
    app.shutdown();
}

#[tokio::test]
async fn test_login_redirects_to_oauth_provider() {
    let provider = AppwriteSessionProvider::new(AppwriteConfig {
        endpoint: "https://cloud.appwrite.io/v1".to_string(),
        project: "star-tracker".to_string(),
        session_secret: None,
    })
    .expect("Failed to create provider");
    let app = TestApp::new(Arc::new(provider)).await;

    let (status, headers, _) = app.request("GET", "/auth/login", None).await;

    assert_eq!(status, StatusCode::SEE_OTHER);
    let location = headers
        .get(header::LOCATION)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();
    assert!(location.starts_with("https://cloud.appwrite.io/v1/account/sessions/oauth2/github?"));
    assert!(location.contains("project=star-tracker"));
    app.shutdown();
}

#[tokio::test]
async fn test_readiness_reports_stopped_supervisor() {
    let app = TestApp::new(Arc::new(StaticSessionProvider::anonymous())).await;

    let (status, _, body) = app.request("GET", "/readyz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ready"], true);

    app.shutdown();

    let mut body = Value::Null;
    for _ in 0..50 {
        let (status, _, json) = app.request("GET", "/readyz", None).await;
        if status == StatusCode::SERVICE_UNAVAILABLE {
            body = json;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    assert_eq!(body["ready"], false);
    assert_eq!(body["message"], "Dashboard supervisor not responding");
}
