use crate::auth::SessionProvider;
use crate::error::{Result, TrackerError};
use crate::models::{RateLimitState, RepoTarget};
use crate::types::{
    CommitActivity, Contributor, GitHubRepo, LanguageData, PullRequest, Release, Stargazer,
};
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";
const ACCEPT_V3: &str = "application/vnd.github.v3+json";
const ACCEPT_STARS: &str = "application/vnd.github.v3.star+json";
const STARGAZERS_PER_PAGE: u32 = 100;
const CONTRIBUTORS_PER_PAGE: u32 = 5;
const PULLS_PER_PAGE: u32 = 5;

pub struct GitHubClient {
    client: Client,
    base_url: String,
    session: Arc<dyn SessionProvider>,
}

impl GitHubClient {
    pub fn new(session: Arc<dyn SessionProvider>) -> Result<Self> {
        Self::with_base_url(DEFAULT_API_BASE_URL, Duration::from_secs(30), session)
    }

    pub fn with_base_url(
        base_url: &str,
        timeout: Duration,
        session: Arc<dyn SessionProvider>,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("repo-stats-tracker/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(GitHubClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    fn repo_url(&self, target: &RepoTarget, path: &str) -> Result<String> {
        target.validate()?;

        Ok(format!(
            "{}/repos/{}/{}{}",
            self.base_url, target.owner, target.repo, path
        ))
    }

    /// Sends a GET with the session's bearer token when one is available.
    /// The flag reports whether a token was attached.
    async fn authorized_get(&self, url: &str, accept: &str) -> Result<(Response, bool)> {
        let session = self.session.current_session().await;

        let mut request = self.client.get(url).header(ACCEPT, accept);
        let authenticated = match session.bearer_token() {
            Some(token) => {
                request = request.header(AUTHORIZATION, format!("Bearer {}", token));
                true
            }
            None => false,
        };

        debug!(url, authenticated, "GitHub request");
        let response = request.send().await?;
        Ok((response, authenticated))
    }

    /// Repository metadata with rate-limit aware failure reporting.
    pub async fn get_repository_info(&self, target: &RepoTarget) -> Result<GitHubRepo> {
        let url = self.repo_url(target, "")?;
        let (response, authenticated) = self.authorized_get(&url, ACCEPT_V3).await?;

        match response.status() {
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
                let reset_at = rate_limit_reset(response.headers());
                warn!(
                    repo = %target.full_name(),
                    authenticated,
                    ?reset_at,
                    "GitHub rate limit exhausted"
                );
                Err(TrackerError::RateLimited {
                    reset_at,
                    authenticated,
                })
            }
            status if !status.is_success() => Err(TrackerError::Api {
                status: status.as_u16(),
            }),
            _ => {
                let rate_limit = Self::get_rate_limit_state(response.headers());
                debug!(
                    remaining = rate_limit.remaining,
                    limit = rate_limit.limit,
                    reset = %rate_limit.reset_time,
                    "Rate limit state"
                );
                Ok(response.json().await?)
            }
        }
    }

    /// Rate limit state from the headers of a response
    pub fn get_rate_limit_state(headers: &HeaderMap) -> RateLimitState {
        let remaining = header_value::<u32>(headers, "x-ratelimit-remaining").unwrap_or(0);
        let limit = header_value::<u32>(headers, "x-ratelimit-limit").unwrap_or(60);
        let reset_time =
            rate_limit_reset(headers).unwrap_or_else(|| Utc::now() + chrono::Duration::hours(1));

        RateLimitState {
            remaining,
            limit,
            reset_time,
            is_limited: remaining == 0,
        }
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        target: &RepoTarget,
        path: &str,
        accept: &str,
    ) -> Result<T> {
        let url = self.repo_url(target, path)?;
        let (response, _) = self.authorized_get(&url, accept).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TrackerError::Api {
                status: status.as_u16(),
            });
        }

        Ok(response.json().await?)
    }

    pub async fn fetch_contributors(&self, target: &RepoTarget) -> Result<Vec<Contributor>> {
        self.fetch_json(
            target,
            &format!("/contributors?per_page={}", CONTRIBUTORS_PER_PAGE),
            ACCEPT_V3,
        )
        .await
    }

    pub async fn fetch_latest_release(&self, target: &RepoTarget) -> Result<Release> {
        self.fetch_json(target, "/releases/latest", ACCEPT_V3).await
    }

    /// Recently closed pull requests, keeping only the merged ones in upstream order.
    pub async fn fetch_recent_pull_requests(
        &self,
        target: &RepoTarget,
    ) -> Result<Vec<PullRequest>> {
        let pulls: Vec<PullRequest> = self
            .fetch_json(
                target,
                &format!(
                    "/pulls?state=closed&sort=updated&direction=desc&per_page={}",
                    PULLS_PER_PAGE
                ),
                ACCEPT_V3,
            )
            .await?;

        Ok(merged_only(pulls))
    }

    pub async fn fetch_languages(&self, target: &RepoTarget) -> Result<LanguageData> {
        self.fetch_json(target, "/languages", ACCEPT_V3).await
    }

    pub async fn fetch_commit_activity(&self, target: &RepoTarget) -> Result<Vec<CommitActivity>> {
        let url = self.repo_url(target, "/stats/commit_activity")?;
        let (response, _) = self.authorized_get(&url, ACCEPT_V3).await?;

        match response.status() {
            // GitHub is still computing the statistics
            StatusCode::ACCEPTED | StatusCode::NO_CONTENT => Ok(Vec::new()),
            status if !status.is_success() => Err(TrackerError::Api {
                status: status.as_u16(),
            }),
            _ => Ok(response.json().await?),
        }
    }

    /// Most recent page of stargazers with their `starred_at` timestamps.
    pub async fn fetch_stargazers(&self, target: &RepoTarget) -> Result<Vec<Stargazer>> {
        self.fetch_json(
            target,
            &format!("/stargazers?per_page={}", STARGAZERS_PER_PAGE),
            ACCEPT_STARS,
        )
        .await
    }
}

pub fn merged_only(pulls: Vec<PullRequest>) -> Vec<PullRequest> {
    pulls.into_iter().filter(PullRequest::is_merged).collect()
}

fn header_value<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.trim().parse::<T>().ok())
}

fn rate_limit_reset(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    header_value::<i64>(headers, "x-ratelimit-reset")
        .and_then(|timestamp| DateTime::from_timestamp(timestamp, 0))
}
