use crate::error::TrackerError;
use crate::types::{CommitActivity, Contributor, LanguageData, PullRequest, Release, Stargazer};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Repository whose stats are being tracked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoTarget {
    pub owner: String,
    pub repo: String,
}

impl RepoTarget {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Accepts only names made of GitHub's `[A-Za-z0-9._-]` set, excluding `.` and `..`,
    /// so both parts are safe to use as URL path segments.
    pub fn validate(&self) -> Result<(), TrackerError> {
        if is_valid_name(&self.owner) && is_valid_name(&self.repo) {
            Ok(())
        } else {
            Err(TrackerError::InvalidRepository(self.full_name()))
        }
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Latest star/fork/watcher counts as seen by the poller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub star_count: u64,
    pub fork_count: u64,
    pub watcher_count: u64,
    pub last_updated: Option<DateTime<Utc>>,
    pub is_loading: bool,
    pub error: Option<StatsError>,
}

impl Default for StatsSnapshot {
    fn default() -> Self {
        Self {
            star_count: 0,
            fork_count: 0,
            watcher_count: 0,
            last_updated: None,
            is_loading: true,
            error: None,
        }
    }
}

impl StatsSnapshot {
    /// Keeps the previous counters and records the failure.
    pub fn fail(&mut self, error: StatsError) {
        self.is_loading = false;
        self.error = Some(error);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StatsErrorKind {
    RateLimited { sign_in_available: bool },
    Api { status: u16 },
    Transport,
}

/// Failure of a single poll cycle, ready for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsError {
    pub kind: StatsErrorKind,
    pub message: String,
}

impl StatsError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self.kind, StatsErrorKind::RateLimited { .. })
    }
}

impl From<&TrackerError> for StatsError {
    fn from(error: &TrackerError) -> Self {
        let kind = match error {
            TrackerError::RateLimited { authenticated, .. } => StatsErrorKind::RateLimited {
                sign_in_available: !authenticated,
            },
            TrackerError::Api { status } => StatsErrorKind::Api { status: *status },
            _ => StatsErrorKind::Transport,
        };

        Self {
            kind,
            message: error.to_string(),
        }
    }
}

/// Rate limit headers of the last successful response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitState {
    pub remaining: u32,
    pub limit: u32,
    pub reset_time: DateTime<Utc>,
    pub is_limited: bool,
}

impl Default for RateLimitState {
    fn default() -> Self {
        Self {
            remaining: 60,
            limit: 60,
            reset_time: Utc::now() + chrono::Duration::hours(1),
            is_limited: false,
        }
    }
}

/// State of a one-shot resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum ResourceState<T> {
    Loading,
    Ready(T),
    Unavailable,
}

impl<T> Default for ResourceState<T> {
    fn default() -> Self {
        ResourceState::Loading
    }
}

impl<T> ResourceState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, ResourceState::Loading)
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, ResourceState::Unavailable)
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            ResourceState::Ready(data) => Some(data),
            _ => None,
        }
    }
}

/// Which extended resource a fetch result belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Contributors,
    LatestRelease,
    PullRequests,
    Languages,
    CommitActivity,
    StarHistory,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 6] = [
        ResourceKind::Contributors,
        ResourceKind::LatestRelease,
        ResourceKind::PullRequests,
        ResourceKind::Languages,
        ResourceKind::CommitActivity,
        ResourceKind::StarHistory,
    ];

    pub fn unavailable_message(self) -> &'static str {
        match self {
            ResourceKind::Contributors => "Contributor data is currently unavailable.",
            ResourceKind::LatestRelease => "Release information is currently unavailable.",
            ResourceKind::PullRequests => "Pull request data is currently unavailable.",
            ResourceKind::Languages => "Language data is currently unavailable.",
            ResourceKind::CommitActivity => "Commit activity data is currently unavailable.",
            ResourceKind::StarHistory => "Star history data is currently unavailable.",
        }
    }
}

/// Cumulative star count at the time a stargazer starred the repo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StarHistoryPoint {
    pub count: u64,
    pub date: DateTime<Utc>,
}

/// Counts stargazers in upstream order.
pub fn star_history(stargazers: &[Stargazer]) -> Vec<StarHistoryPoint> {
    stargazers
        .iter()
        .enumerate()
        .map(|(i, s)| StarHistoryPoint {
            count: i as u64 + 1,
            date: s.starred_at,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageShare {
    pub language: String,
    pub bytes: u64,
    pub percentage: f64,
}

pub const MAX_LANGUAGES: usize = 8;

/// Share of each language in bytes, largest first, capped at [`MAX_LANGUAGES`].
/// Percentages are taken against the bytes of every language, listed or not.
pub fn language_breakdown(languages: &LanguageData) -> Vec<LanguageShare> {
    let total: u64 = languages.values().sum();
    if total == 0 {
        return Vec::new();
    }

    let mut shares: Vec<LanguageShare> = languages
        .iter()
        .map(|(language, &bytes)| LanguageShare {
            language: language.clone(),
            bytes,
            percentage: bytes as f64 / total as f64 * 100.0,
        })
        .collect();

    shares.sort_by(|a, b| b.bytes.cmp(&a.bytes).then_with(|| a.language.cmp(&b.language)));
    shares.truncate(MAX_LANGUAGES);
    shares
}

pub const HEATMAP_WEEKS: usize = 13;
pub const MAX_HEAT_LEVEL: u8 = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapWeek {
    pub week: i64,
    pub days: Vec<u64>,
    pub levels: Vec<u8>,
}

/// Buckets the trailing weeks of activity into intensity levels `0..=4`.
///
/// The scale maximum covers every day count and weekly total in the full
/// series, not just the rendered window.
pub fn commit_heatmap(activity: &[CommitActivity]) -> Vec<HeatmapWeek> {
    let max = activity
        .iter()
        .flat_map(|w| w.days.iter().copied().chain(std::iter::once(w.total)))
        .max()
        .unwrap_or(0);

    let start = activity.len().saturating_sub(HEATMAP_WEEKS);
    activity[start..]
        .iter()
        .map(|w| HeatmapWeek {
            week: w.week,
            days: w.days.clone(),
            levels: w.days.iter().map(|&count| heat_level(count, max)).collect(),
        })
        .collect()
}

fn heat_level(count: u64, max: u64) -> u8 {
    if count == 0 || max == 0 {
        return 0;
    }
    let level = (count as f64 / max as f64 * MAX_HEAT_LEVEL as f64).ceil() as u8;
    level.min(MAX_HEAT_LEVEL)
}

/// Everything the dashboard knows about the tracked repository
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardView {
    pub target: RepoTarget,
    pub stats: StatsSnapshot,
    pub contributors: ResourceState<Vec<Contributor>>,
    pub latest_release: ResourceState<Release>,
    pub pull_requests: ResourceState<Vec<PullRequest>>,
    pub languages: ResourceState<Vec<LanguageShare>>,
    pub commit_activity: ResourceState<Vec<HeatmapWeek>>,
    pub star_history: ResourceState<Vec<StarHistoryPoint>>,
    /// User-facing message for every resource that could not be loaded
    pub notices: Vec<String>,
}
