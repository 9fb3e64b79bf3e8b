use crate::error::Result as TrackerResult;
use crate::github::GitHubClient;
use crate::models::{
    commit_heatmap, language_breakdown, star_history, DashboardView, HeatmapWeek, LanguageShare,
    RepoTarget, ResourceKind, ResourceState, StarHistoryPoint, StatsSnapshot,
};
use crate::poller::{StatsPoller, StatsSource};
use crate::types::{Contributor, PullRequest, Release};
use anyhow::Result;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort, SpawnErr};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Owns the stats poller and the one-shot extended resources of the tracked repository
pub struct DashboardSupervisor;

/// State for the dashboard supervisor
pub struct DashboardState {
    client: Arc<GitHubClient>,
    refresh_interval: Duration,
    poller: StatsPoller,
    resources: ExtendedResources,
}

#[derive(Debug, Clone, Default)]
pub struct ExtendedResources {
    pub contributors: ResourceState<Vec<Contributor>>,
    pub latest_release: ResourceState<Release>,
    pub pull_requests: ResourceState<Vec<PullRequest>>,
    pub languages: ResourceState<Vec<LanguageShare>>,
    pub commit_activity: ResourceState<Vec<HeatmapWeek>>,
    pub star_history: ResourceState<Vec<StarHistoryPoint>>,
}

/// Result of one extended fetcher
#[derive(Debug)]
pub enum ResourceUpdate {
    Contributors(ResourceState<Vec<Contributor>>),
    LatestRelease(ResourceState<Release>),
    PullRequests(ResourceState<Vec<PullRequest>>),
    Languages(ResourceState<Vec<LanguageShare>>),
    CommitActivity(ResourceState<Vec<HeatmapWeek>>),
    StarHistory(ResourceState<Vec<StarHistoryPoint>>),
}

impl ResourceUpdate {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceUpdate::Contributors(_) => ResourceKind::Contributors,
            ResourceUpdate::LatestRelease(_) => ResourceKind::LatestRelease,
            ResourceUpdate::PullRequests(_) => ResourceKind::PullRequests,
            ResourceUpdate::Languages(_) => ResourceKind::Languages,
            ResourceUpdate::CommitActivity(_) => ResourceKind::CommitActivity,
            ResourceUpdate::StarHistory(_) => ResourceKind::StarHistory,
        }
    }
}

/// Messages the supervisor can handle
#[derive(Debug)]
pub enum DashboardMessage {
    /// Track another repository: restarts the poller and refetches every resource
    SetRepository(RepoTarget),
    /// An extended fetcher finished
    ResourceLoaded(ResourceUpdate),
    GetStats(RpcReplyPort<StatsSnapshot>),
    /// Subscribe to every snapshot the current poller publishes
    SubscribeStats(RpcReplyPort<watch::Receiver<StatsSnapshot>>),
    GetDashboard(RpcReplyPort<DashboardView>),
    Shutdown,
}

/// Arguments for starting the supervisor
pub struct DashboardArgs {
    pub client: Arc<GitHubClient>,
    pub target: RepoTarget,
    pub refresh_interval: Duration,
}

impl DashboardSupervisor {
    pub async fn spawn(
        args: DashboardArgs,
    ) -> Result<(ActorRef<DashboardMessage>, JoinHandle<()>), SpawnErr> {
        let repo = args.target.full_name();
        let spawned = Actor::spawn(None, DashboardSupervisor, args).await?;

        info!(%repo, "Dashboard supervisor started");
        Ok(spawned)
    }
}

#[ractor::async_trait]
impl Actor for DashboardSupervisor {
    type Msg = DashboardMessage;
    type State = DashboardState;
    type Arguments = DashboardArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let poller = start_poller(&args.client, args.target.clone(), args.refresh_interval)?;
        spawn_extended_fetchers(&myself, &args.client, &args.target);

        Ok(DashboardState {
            client: args.client,
            refresh_interval: args.refresh_interval,
            poller,
            resources: ExtendedResources::default(),
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            DashboardMessage::SetRepository(target) => {
                if &target == state.poller.target() {
                    debug!(repo = %target.full_name(), "Repository unchanged");
                    return Ok(());
                }

                info!(
                    from = %state.poller.target().full_name(),
                    to = %target.full_name(),
                    "Switching tracked repository"
                );

                let poller = start_poller(&state.client, target.clone(), state.refresh_interval)?;
                let previous = std::mem::replace(&mut state.poller, poller);
                previous.stop();

                state.resources = ExtendedResources::default();
                spawn_extended_fetchers(&myself, &state.client, &target);
            }

            DashboardMessage::ResourceLoaded(update) => {
                debug!(kind = ?update.kind(), "Extended resource loaded");
                state.resources.apply(update);
            }

            DashboardMessage::GetStats(reply) => {
                if !reply.is_closed() {
                    let _ = reply.send(state.poller.snapshot());
                }
            }

            DashboardMessage::SubscribeStats(reply) => {
                if !reply.is_closed() {
                    let _ = reply.send(state.poller.subscribe());
                }
            }

            DashboardMessage::GetDashboard(reply) => {
                let view = state
                    .resources
                    .view(state.poller.target().clone(), state.poller.snapshot());
                if !reply.is_closed() {
                    let _ = reply.send(view);
                }
            }

            DashboardMessage::Shutdown => {
                info!("Shutting down dashboard supervisor");
                state.poller.stop();
                myself.stop(Some("Shutdown requested".to_string()));
            }
        }

        Ok(())
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        state.poller.stop();
        info!(
            repo = %state.poller.target().full_name(),
            "Dashboard supervisor stopped"
        );
        Ok(())
    }
}

impl ExtendedResources {
    /// Replaces the resource wholesale. A result from a previously tracked
    /// repository may still land here after a switch.
    pub fn apply(&mut self, update: ResourceUpdate) {
        match update {
            ResourceUpdate::Contributors(s) => self.contributors = s,
            ResourceUpdate::LatestRelease(s) => self.latest_release = s,
            ResourceUpdate::PullRequests(s) => self.pull_requests = s,
            ResourceUpdate::Languages(s) => self.languages = s,
            ResourceUpdate::CommitActivity(s) => self.commit_activity = s,
            ResourceUpdate::StarHistory(s) => self.star_history = s,
        }
    }

    fn is_unavailable(&self, kind: ResourceKind) -> bool {
        match kind {
            ResourceKind::Contributors => self.contributors.is_unavailable(),
            ResourceKind::LatestRelease => self.latest_release.is_unavailable(),
            ResourceKind::PullRequests => self.pull_requests.is_unavailable(),
            ResourceKind::Languages => self.languages.is_unavailable(),
            ResourceKind::CommitActivity => self.commit_activity.is_unavailable(),
            ResourceKind::StarHistory => self.star_history.is_unavailable(),
        }
    }

    pub fn view(&self, target: RepoTarget, stats: StatsSnapshot) -> DashboardView {
        let notices = ResourceKind::ALL
            .into_iter()
            .filter(|&kind| self.is_unavailable(kind))
            .map(|kind| kind.unavailable_message().to_string())
            .collect();

        DashboardView {
            target,
            stats,
            contributors: self.contributors.clone(),
            latest_release: self.latest_release.clone(),
            pull_requests: self.pull_requests.clone(),
            languages: self.languages.clone(),
            commit_activity: self.commit_activity.clone(),
            star_history: self.star_history.clone(),
            notices,
        }
    }
}

fn start_poller(
    client: &Arc<GitHubClient>,
    target: RepoTarget,
    refresh_interval: Duration,
) -> TrackerResult<StatsPoller> {
    let source: Arc<dyn StatsSource> = client.clone();
    StatsPoller::spawn(source, target, refresh_interval)
}

/// Collapses a fetch outcome: any failure, or an empty payload, is unavailable.
pub fn collapse<T>(
    kind: ResourceKind,
    result: TrackerResult<T>,
    is_empty: impl FnOnce(&T) -> bool,
) -> ResourceState<T> {
    match result {
        Ok(data) if is_empty(&data) => {
            debug!(?kind, "Extended resource is empty");
            ResourceState::Unavailable
        }
        Ok(data) => ResourceState::Ready(data),
        Err(e) => {
            warn!(?kind, "Error fetching extended resource: {}", e);
            ResourceState::Unavailable
        }
    }
}

fn spawn_fetch<T, Fut>(
    myself: &ActorRef<DashboardMessage>,
    fetch: Fut,
    wrap: fn(ResourceState<T>) -> ResourceUpdate,
) where
    T: Send + 'static,
    Fut: Future<Output = ResourceState<T>> + Send + 'static,
{
    let myself = myself.clone();
    tokio::spawn(async move {
        let update = wrap(fetch.await);
        let kind = update.kind();
        if let Err(e) = myself.send_message(DashboardMessage::ResourceLoaded(update)) {
            debug!(?kind, "Dashboard gone before resource arrived: {}", e);
        }
    });
}

/// Starts one independent task per extended resource; they may finish in any order.
fn spawn_extended_fetchers(
    myself: &ActorRef<DashboardMessage>,
    client: &Arc<GitHubClient>,
    target: &RepoTarget,
) {
    debug!(repo = %target.full_name(), "Fetching extended resources");

    let (c, t) = (client.clone(), target.clone());
    spawn_fetch(
        myself,
        async move {
            collapse(ResourceKind::Contributors, c.fetch_contributors(&t).await, Vec::is_empty)
        },
        ResourceUpdate::Contributors,
    );

    let (c, t) = (client.clone(), target.clone());
    spawn_fetch(
        myself,
        async move {
            collapse(
                ResourceKind::LatestRelease,
                c.fetch_latest_release(&t).await,
                |_| false,
            )
        },
        ResourceUpdate::LatestRelease,
    );

    let (c, t) = (client.clone(), target.clone());
    spawn_fetch(
        myself,
        async move {
            collapse(
                ResourceKind::PullRequests,
                c.fetch_recent_pull_requests(&t).await,
                Vec::is_empty,
            )
        },
        ResourceUpdate::PullRequests,
    );

    let (c, t) = (client.clone(), target.clone());
    spawn_fetch(
        myself,
        async move {
            let result = c.fetch_languages(&t).await.map(|l| language_breakdown(&l));
            collapse(ResourceKind::Languages, result, Vec::is_empty)
        },
        ResourceUpdate::Languages,
    );

    let (c, t) = (client.clone(), target.clone());
    spawn_fetch(
        myself,
        async move {
            let result = c.fetch_commit_activity(&t).await.map(|a| commit_heatmap(&a));
            collapse(ResourceKind::CommitActivity, result, Vec::is_empty)
        },
        ResourceUpdate::CommitActivity,
    );

    let (c, t) = (client.clone(), target.clone());
    spawn_fetch(
        myself,
        async move {
            let result = c.fetch_stargazers(&t).await.map(|s| star_history(&s));
            collapse(ResourceKind::StarHistory, result, Vec::is_empty)
        },
        ResourceUpdate::StarHistory,
    );
}
