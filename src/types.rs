use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// GitHub API response structures
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubRepo {
    pub name: String,
    pub full_name: String,
    pub html_url: String,
    pub stargazers_count: u64,
    pub forks_count: u64,
    pub watchers_count: u64,
    /// Real watcher count; `watchers_count` mirrors stars on the v3 API.
    #[serde(default)]
    pub subscribers_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubUser {
    pub login: String,
    pub avatar_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contributor {
    pub login: String,
    pub avatar_url: String,
    pub html_url: String,
    pub contributions: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Release {
    pub name: Option<String>,
    pub tag_name: String,
    pub published_at: Option<DateTime<Utc>>,
    pub html_url: String,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub html_url: String,
    pub user: GitHubUser,
    pub merged_at: Option<DateTime<Utc>>,
}

impl PullRequest {
    pub fn is_merged(&self) -> bool {
        self.merged_at.is_some()
    }
}

/// Bytes of code per language name.
pub type LanguageData = BTreeMap<String, u64>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitActivity {
    /// Sunday-first commit counts.
    pub days: Vec<u64>,
    pub total: u64,
    /// Unix timestamp of the week's Sunday.
    pub week: i64,
}

/// Stargazer entry as returned with the `star+json` media type.
#[derive(Debug, Clone, Deserialize)]
pub struct Stargazer {
    pub starred_at: DateTime<Utc>,
    pub user: Option<GitHubUser>,
}
