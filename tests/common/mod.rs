#![allow(dead_code)]

use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, Uri},
    response::Json,
    routing::{get, MethodRouter},
    Router,
};
use repo_stats_tracker::auth::SessionProvider;
use repo_stats_tracker::github::GitHubClient;
use repo_stats_tracker::models::RepoTarget;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A request as seen by the mock server
#[derive(Debug, Clone)]
pub struct LoggedRequest {
    pub uri: String,
    pub authorization: Option<String>,
    pub accept: Option<String>,
}

#[derive(Clone, Default)]
pub struct RequestLog(Arc<Mutex<Vec<LoggedRequest>>>);

impl RequestLog {
    pub fn record(&self, uri: &Uri, headers: &HeaderMap) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|h| h.to_str().ok())
                .map(str::to_string)
        };
        self.0
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(LoggedRequest {
                uri: uri.to_string(),
                authorization: header("authorization"),
                accept: header("accept"),
            });
    }

    pub fn requests(&self) -> Vec<LoggedRequest> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn find(&self, path_prefix: &str) -> Option<LoggedRequest> {
        self.requests()
            .into_iter()
            .find(|r| r.uri.starts_with(path_prefix))
    }
}

/// Serves `app` on an ephemeral local port and returns its base URL
pub async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind mock server");
    let addr = listener.local_addr().expect("Mock server has no address");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Mock server failed");
    });

    format!("http://{}", addr)
}

/// Base URL nothing listens on
pub async fn closed_base_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("No address");
    drop(listener);
    format!("http://{}", addr)
}

pub fn json_route(body: Value) -> MethodRouter<RequestLog> {
    get(
        move |State(log): State<RequestLog>, uri: Uri, headers: HeaderMap| {
            let body = body.clone();
            async move {
                log.record(&uri, &headers);
                Json(body)
            }
        },
    )
}

pub fn status_route(status: u16, reset: Option<i64>) -> MethodRouter<RequestLog> {
    get(
        move |State(log): State<RequestLog>, uri: Uri, headers: HeaderMap| async move {
            log.record(&uri, &headers);

            let mut response_headers = HeaderMap::new();
            if let Some(reset) = reset {
                response_headers.insert(
                    "x-ratelimit-reset",
                    HeaderValue::from_str(&reset.to_string()).expect("header value"),
                );
                response_headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
            }

            (
                StatusCode::from_u16(status).expect("status code"),
                response_headers,
                Json(json!({ "message": "API rate limit exceeded" })),
            )
        },
    )
}

pub fn repo_json(stars: u64, forks: u64, subscribers: u64) -> Value {
    json!({
        "name": "appwrite",
        "full_name": "appwrite/appwrite",
        "html_url": "https://github.com/appwrite/appwrite",
        "stargazers_count": stars,
        "forks_count": forks,
        "watchers_count": stars,
        "subscribers_count": subscribers
    })
}

fn pull_json(number: u64, merged_at: Option<&str>) -> Value {
    json!({
        "number": number,
        "title": format!("PR #{}", number),
        "html_url": format!("https://github.com/appwrite/appwrite/pull/{}", number),
        "user": { "login": "octocat", "avatar_url": "https://github.com/octocat.png" },
        "merged_at": merged_at
    })
}

/// Five closed pull requests, #102 and #104 closed without merging
pub fn pulls_json() -> Value {
    json!([
        pull_json(105, Some("2024-05-05T10:00:00Z")),
        pull_json(104, None),
        pull_json(103, Some("2024-05-03T10:00:00Z")),
        pull_json(102, None),
        pull_json(101, Some("2024-05-01T10:00:00Z")),
    ])
}

pub fn contributors_json() -> Value {
    json!([
        { "login": "eldadfux", "avatar_url": "https://a/1", "html_url": "https://github.com/eldadfux", "contributions": 5000 },
        { "login": "torstendittmann", "avatar_url": "https://a/2", "html_url": "https://github.com/torstendittmann", "contributions": 1200 }
    ])
}

pub fn release_json() -> Value {
    json!({
        "name": "Appwrite 1.5.0",
        "tag_name": "1.5.0",
        "published_at": "2024-03-01T12:00:00Z",
        "html_url": "https://github.com/appwrite/appwrite/releases/tag/1.5.0",
        "body": "Release notes"
    })
}

pub fn languages_json() -> Value {
    json!({ "TypeScript": 250, "PHP": 700, "Dockerfile": 50 })
}

pub fn commit_activity_json() -> Value {
    json!([
        { "days": [0, 3, 1, 0, 2, 0, 0], "total": 6, "week": 1714262400 },
        { "days": [1, 1, 1, 1, 1, 1, 2], "total": 8, "week": 1714867200 }
    ])
}

pub fn stargazers_json() -> Value {
    json!([
        { "starred_at": "2024-05-01T00:00:00Z", "user": { "login": "a", "avatar_url": "https://a/a" } },
        { "starred_at": "2024-05-02T00:00:00Z", "user": { "login": "b", "avatar_url": "https://a/b" } }
    ])
}

/// Every GitHub endpoint the tracker uses, all succeeding
pub fn github_router(log: RequestLog) -> Router {
    Router::new()
        .route("/repos/:owner/:repo", json_route(repo_json(1234, 56, 78)))
        .route("/repos/:owner/:repo/contributors", json_route(contributors_json()))
        .route("/repos/:owner/:repo/releases/latest", json_route(release_json()))
        .route("/repos/:owner/:repo/pulls", json_route(pulls_json()))
        .route("/repos/:owner/:repo/languages", json_route(languages_json()))
        .route(
            "/repos/:owner/:repo/stats/commit_activity",
            json_route(commit_activity_json()),
        )
        .route("/repos/:owner/:repo/stargazers", json_route(stargazers_json()))
        .with_state(log)
}

pub fn target() -> RepoTarget {
    RepoTarget::new("appwrite", "appwrite")
}

pub fn client_for(base_url: &str, session: Arc<dyn SessionProvider>) -> GitHubClient {
    GitHubClient::with_base_url(base_url, Duration::from_secs(5), session)
        .expect("Failed to create client")
}
