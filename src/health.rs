use crate::actors::DashboardMessage;
use crate::auth::SessionProvider;
use crate::models::{StatsErrorKind, StatsSnapshot};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use ractor::ActorRef;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Health check status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub checks: HealthChecks,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<StatsSnapshot>,
}

/// Individual health checks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthChecks {
    pub supervisor: CheckResult,
    pub github: CheckResult,
}

/// Result of an individual check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CheckResult {
    fn healthy() -> Self {
        Self {
            status: HealthStatus::Healthy,
            message: None,
        }
    }
}

/// Liveness probe response (minimal, just indicates the process is running)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessResponse {
    pub status: String,
}

/// Readiness probe response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Shared state of every HTTP handler
#[derive(Clone)]
pub struct AppState {
    pub supervisor: ActorRef<DashboardMessage>,
    pub session: Arc<dyn SessionProvider>,
    /// Where the OAuth provider sends the visitor back to
    pub public_url: String,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub async fn stats(&self, timeout: Duration) -> Option<StatsSnapshot> {
        match self
            .supervisor
            .call(DashboardMessage::GetStats, Some(timeout))
            .await
        {
            Ok(ractor::rpc::CallResult::Success(stats)) => Some(stats),
            _ => None,
        }
    }
}

pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(health_check))
        .route("/livez", get(liveness_check))
        .route("/readyz", get(readiness_check))
}

/// Rates the upstream API from the latest poll outcome
pub fn github_check(stats: &StatsSnapshot) -> CheckResult {
    match &stats.error {
        None => CheckResult::healthy(),
        Some(error) => {
            let status = match error.kind {
                StatsErrorKind::RateLimited { .. } | StatsErrorKind::Api { .. } => {
                    HealthStatus::Degraded
                }
                StatsErrorKind::Transport => HealthStatus::Unhealthy,
            };
            CheckResult {
                status,
                message: Some(error.message.clone()),
            }
        }
    }
}

/// Main health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = state.start_time.elapsed().as_secs();
    let stats = state.stats(Duration::from_secs(5)).await;

    let (supervisor_check, github_check) = match &stats {
        Some(stats) => (CheckResult::healthy(), github_check(stats)),
        None => (
            CheckResult {
                status: HealthStatus::Unhealthy,
                message: Some("Supervisor not responding".to_string()),
            },
            CheckResult {
                status: HealthStatus::Unhealthy,
                message: Some("No stats available".to_string()),
            },
        ),
    };

    let overall_status = [&supervisor_check.status, &github_check.status]
        .into_iter()
        .fold(HealthStatus::Healthy, |acc, s| match (acc, s) {
            (HealthStatus::Unhealthy, _) | (_, HealthStatus::Unhealthy) => HealthStatus::Unhealthy,
            (HealthStatus::Degraded, _) | (_, HealthStatus::Degraded) => HealthStatus::Degraded,
            _ => HealthStatus::Healthy,
        });

    let response = HealthResponse {
        status: overall_status.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        checks: HealthChecks {
            supervisor: supervisor_check,
            github: github_check,
        },
        stats,
    };

    let status_code = match overall_status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(response))
}

async fn liveness_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(LivenessResponse {
            status: "alive".to_string(),
        }),
    )
}

/// Ready once the supervisor answers
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.stats(Duration::from_secs(1)).await.is_some();

    let response = ReadinessResponse {
        ready,
        message: if ready {
            None
        } else {
            Some("Dashboard supervisor not responding".to_string())
        },
    };

    let status_code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}
