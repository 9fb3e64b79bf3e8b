use crate::actors::DashboardMessage;
use crate::health::{health_routes, AppState};
use crate::models::RepoTarget;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Redirect},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Response for successful operations
#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

/// Response for errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> axum::response::Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

/// Full HTTP surface: dashboard API, sign-in and health probes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/stats", get(get_stats))
        .route("/api/dashboard", get(get_dashboard))
        .route("/api/repository", post(set_repository))
        .route("/auth/login", get(login))
        .route("/auth/logout", post(logout))
        .merge(health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Dashboard API listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn get_stats(State(state): State<AppState>) -> impl IntoResponse {
    match state.stats(Duration::from_secs(5)).await {
        Some(stats) => (StatusCode::OK, Json(stats)).into_response(),
        None => error_response(StatusCode::SERVICE_UNAVAILABLE, "Failed to get repository stats"),
    }
}

async fn get_dashboard(State(state): State<AppState>) -> impl IntoResponse {
    match state
        .supervisor
        .call(DashboardMessage::GetDashboard, Some(Duration::from_secs(5)))
        .await
    {
        Ok(ractor::rpc::CallResult::Success(view)) => (StatusCode::OK, Json(view)).into_response(),
        _ => error_response(StatusCode::SERVICE_UNAVAILABLE, "Failed to get dashboard"),
    }
}

async fn set_repository(
    State(state): State<AppState>,
    Json(target): Json<RepoTarget>,
) -> impl IntoResponse {
    if let Err(e) = target.validate() {
        return error_response(StatusCode::BAD_REQUEST, e.to_string());
    }

    let full_name = target.full_name();
    match state
        .supervisor
        .send_message(DashboardMessage::SetRepository(target))
    {
        Ok(_) => (
            StatusCode::ACCEPTED,
            Json(SuccessResponse {
                success: true,
                message: format!("Now tracking {}", full_name),
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to switch repository: {}", e);
            error_response(StatusCode::SERVICE_UNAVAILABLE, "Dashboard is not running")
        }
    }
}

/// Redirects the visitor to the OAuth provider
async fn login(State(state): State<AppState>) -> impl IntoResponse {
    match state.session.start_login(&state.public_url).await {
        Ok(url) => Redirect::to(url.as_str()).into_response(),
        Err(e) => {
            warn!("GitHub login unavailable: {}", e);
            error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    }
}

async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    let success = state.session.logout().await;
    let status = if success {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    };

    (
        status,
        Json(SuccessResponse {
            success,
            message: if success {
                "Signed out".to_string()
            } else {
                "Logout failed".to_string()
            },
        }),
    )
}
