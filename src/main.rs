use clap::Parser;
use colored::*;
use ractor::{rpc::CallResult, ActorRef};
use repo_stats_tracker::actors::{DashboardArgs, DashboardMessage, DashboardSupervisor};
use repo_stats_tracker::api;
use repo_stats_tracker::auth::{
    AppwriteConfig, AppwriteSessionProvider, SessionProvider, StaticSessionProvider,
};
use repo_stats_tracker::cli::Cli;
use repo_stats_tracker::error::TrackerError;
use repo_stats_tracker::github::GitHubClient;
use repo_stats_tracker::health::AppState;
use repo_stats_tracker::models::{RepoTarget, StatsSnapshot};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let cli = Cli::parse();

    println!("{}", "Repo Stats Tracker".bold().green());
    println!("{}\n", "=".repeat(50).dimmed());

    let session = build_session_provider(&cli)?;

    let client = Arc::new(GitHubClient::with_base_url(
        &cli.github_api_url,
        Duration::from_secs(cli.request_timeout_secs),
        session.clone(),
    )?);

    let target = RepoTarget::new(cli.owner.clone(), cli.repo.clone());
    println!(
        "📡 Tracking {} every {}s",
        target.full_name().bold(),
        cli.refresh_interval_ms as f64 / 1000.0
    );

    let (supervisor, supervisor_handle) = DashboardSupervisor::spawn(DashboardArgs {
        client,
        target,
        refresh_interval: Duration::from_millis(cli.refresh_interval_ms),
    })
    .await
    .map_err(|e| TrackerError::Dashboard(format!("Failed to start supervisor: {}", e)))?;

    tokio::spawn(print_star_changes(supervisor.clone()));

    let app_state = AppState {
        supervisor: supervisor.clone(),
        session,
        public_url: cli.public_url.clone(),
        start_time: std::time::Instant::now(),
    };

    println!("\nPress Ctrl+C to stop the tracker\n");

    tokio::select! {
        result = api::serve(app_state, cli.port) => {
            if let Err(e) = result {
                error!("Dashboard API failed: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\n🛑 Shutting down tracker...");
        }
    }

    supervisor
        .send_message(DashboardMessage::Shutdown)
        .map_err(|e| TrackerError::Dashboard(format!("Failed to shutdown supervisor: {:?}", e)))?;

    if let Err(e) = supervisor_handle.await {
        error!("Dashboard supervisor did not stop cleanly: {}", e);
    }

    println!("✅ Tracker stopped");

    Ok(())
}

/// OAuth provider when Appwrite is configured, else a static (possibly anonymous) session
fn build_session_provider(cli: &Cli) -> anyhow::Result<Arc<dyn SessionProvider>> {
    if let (Some(endpoint), Some(project)) = (&cli.appwrite_endpoint, &cli.appwrite_project) {
        info!(%endpoint, %project, "Using Appwrite GitHub OAuth sessions");
        let provider = AppwriteSessionProvider::new(AppwriteConfig {
            endpoint: endpoint.clone(),
            project: project.clone(),
            session_secret: cli.appwrite_session.clone(),
        })?;
        return Ok(Arc::new(provider));
    }

    match &cli.github_token {
        Some(token) if !token.is_empty() => {
            println!("{}", "🔑 Using configured GitHub token".yellow());
            Ok(Arc::new(StaticSessionProvider::with_token(token.clone())))
        }
        _ => {
            println!("{}", "Running anonymously (60 requests/hour)".yellow());
            Ok(Arc::new(StaticSessionProvider::anonymous()))
        }
    }
}

/// Prints every star count change; follows the supervisor across repository switches.
async fn print_star_changes(supervisor: ActorRef<DashboardMessage>) {
    let mut last_stars: Option<u64> = None;

    loop {
        let mut stats = match supervisor
            .call(DashboardMessage::SubscribeStats, Some(Duration::from_secs(5)))
            .await
        {
            Ok(CallResult::Success(receiver)) => receiver,
            _ => break,
        };

        loop {
            report(&stats.borrow_and_update(), &mut last_stars);
            if stats.changed().await.is_err() {
                break;
            }
        }

        // The poller was replaced or stopped
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

fn report(snapshot: &StatsSnapshot, last_stars: &mut Option<u64>) {
    if let Some(error) = &snapshot.error {
        println!("{} {}", "⚠️".yellow(), error.message.red());
        return;
    }
    if snapshot.is_loading || snapshot.last_updated.is_none() {
        return;
    }

    match *last_stars {
        Some(previous) if previous == snapshot.star_count => {}
        Some(previous) => {
            let delta = snapshot.star_count as i64 - previous as i64;
            println!(
                "⭐ {} stars ({}) | {} forks | {} watchers",
                snapshot.star_count.to_string().bold(),
                format!("{:+}", delta).green(),
                snapshot.fork_count,
                snapshot.watcher_count
            );
        }
        None => println!(
            "⭐ {} stars | {} forks | {} watchers",
            snapshot.star_count.to_string().bold(),
            snapshot.fork_count,
            snapshot.watcher_count
        ),
    }
    *last_stars = Some(snapshot.star_count);
}
