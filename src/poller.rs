use crate::error::{Result, TrackerError};
use crate::github::GitHubClient;
use crate::models::{RepoTarget, StatsError, StatsSnapshot};
use crate::types::GitHubRepo;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(60_000);

/// Anything that can produce repository metadata for the poller
#[async_trait]
pub trait StatsSource: Send + Sync + 'static {
    async fn fetch_stats(&self, target: &RepoTarget) -> Result<GitHubRepo>;
}

#[async_trait]
impl StatsSource for GitHubClient {
    async fn fetch_stats(&self, target: &RepoTarget) -> Result<GitHubRepo> {
        self.get_repository_info(target).await
    }
}

/// Repeating stats fetch for one repository.
///
/// The first cycle runs immediately, then one cycle per refresh interval.
/// Dropping the poller (or calling [`StatsPoller::stop`]) cancels the task;
/// a request still in flight at that point is discarded.
pub struct StatsPoller {
    target: RepoTarget,
    cancel: CancellationToken,
    snapshot: watch::Receiver<StatsSnapshot>,
    handle: JoinHandle<()>,
    _guard: DropGuard,
}

impl StatsPoller {
    pub fn spawn(
        source: Arc<dyn StatsSource>,
        target: RepoTarget,
        refresh_interval: Duration,
    ) -> Result<Self> {
        if refresh_interval.is_zero() {
            return Err(TrackerError::Config(
                "refresh interval must be greater than zero".to_string(),
            ));
        }

        let cancel = CancellationToken::new();
        let (tx, rx) = watch::channel(StatsSnapshot::default());

        info!(
            repo = %target.full_name(),
            interval_ms = refresh_interval.as_millis() as u64,
            "Starting stats poller"
        );

        let handle = tokio::spawn(run_poller(
            source,
            target.clone(),
            refresh_interval,
            cancel.clone(),
            tx,
        ));

        Ok(Self {
            target,
            _guard: cancel.clone().drop_guard(),
            cancel,
            snapshot: rx,
            handle,
        })
    }

    pub fn target(&self) -> &RepoTarget {
        &self.target
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<StatsSnapshot> {
        self.snapshot.clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Clears the repeating timer. Idempotent.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Stops the poller and waits for its task to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            warn!("Stats poller task ended abnormally: {}", e);
        }
    }
}

async fn run_poller(
    source: Arc<dyn StatsSource>,
    target: RepoTarget,
    refresh_interval: Duration,
    cancel: CancellationToken,
    tx: watch::Sender<StatsSnapshot>,
) {
    let mut ticker = tokio::time::interval(refresh_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        tx.send_if_modified(|snapshot| !std::mem::replace(&mut snapshot.is_loading, true));

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(repo = %target.full_name(), "Discarding in-flight stats request");
                break;
            }
            result = source.fetch_stats(&target) => result,
        };

        apply_result(&tx, &target, result);
    }

    tx.send_if_modified(|snapshot| std::mem::replace(&mut snapshot.is_loading, false));
    info!(repo = %target.full_name(), "Stats poller stopped");
}

/// Publishes a cycle's outcome. Succeeds even when every subscriber is gone.
fn apply_result(
    tx: &watch::Sender<StatsSnapshot>,
    target: &RepoTarget,
    result: Result<GitHubRepo>,
) {
    match result {
        Ok(repo) => {
            debug!(
                repo = %target.full_name(),
                stars = repo.stargazers_count,
                forks = repo.forks_count,
                watchers = repo.subscribers_count,
                "Fetched repository stats"
            );
            tx.send_replace(StatsSnapshot {
                star_count: repo.stargazers_count,
                fork_count: repo.forks_count,
                watcher_count: repo.subscribers_count,
                last_updated: Some(Utc::now()),
                is_loading: false,
                error: None,
            });
        }
        Err(e) => {
            warn!(repo = %target.full_name(), "Stats fetch failed: {}", e);
            let error = StatsError::from(&e);
            tx.send_modify(|snapshot| snapshot.fail(error));
        }
    }
}
