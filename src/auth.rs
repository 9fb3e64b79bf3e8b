use crate::error::{Result, TrackerError};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

/// Identity of a signed-in user as reported by the auth provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

/// Current visitor session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    Anonymous,
    /// Signed in, but the provider holds no GitHub access token.
    Authenticated(UserIdentity),
    AuthenticatedWithToken(UserIdentity, String),
}

impl Session {
    pub fn bearer_token(&self) -> Option<&str> {
        match self {
            Session::AuthenticatedWithToken(_, token) => Some(token.as_str()),
            _ => None,
        }
    }

    pub fn user(&self) -> Option<&UserIdentity> {
        match self {
            Session::Anonymous => None,
            Session::Authenticated(user) | Session::AuthenticatedWithToken(user, _) => Some(user),
        }
    }
}

/// Source of the optional bearer token attached to GitHub requests.
///
/// Constructed once at startup and shared with every fetcher; it is dropped
/// with the last client on shutdown.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// URL the visitor must be redirected to in order to start the OAuth flow.
    /// `return_url` is used for both the success and failure redirect.
    async fn start_login(&self, return_url: &str) -> Result<Url>;

    /// Never fails: provider errors degrade to a less privileged session.
    async fn current_session(&self) -> Session;

    /// Ends the current session. Returns whether the provider accepted it.
    async fn logout(&self) -> bool;
}

/// Session fixed at startup, e.g. from `GITHUB_TOKEN`
#[derive(Debug, Clone)]
pub struct StaticSessionProvider {
    session: Session,
}

impl StaticSessionProvider {
    pub fn anonymous() -> Self {
        Self {
            session: Session::Anonymous,
        }
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        let user = UserIdentity {
            id: "static".to_string(),
            name: "Configured token".to_string(),
            email: String::new(),
        };
        Self {
            session: Session::AuthenticatedWithToken(user, token.into()),
        }
    }
}

#[async_trait]
impl SessionProvider for StaticSessionProvider {
    async fn start_login(&self, _return_url: &str) -> Result<Url> {
        Err(TrackerError::Auth(
            "OAuth sign-in is not configured".to_string(),
        ))
    }

    async fn current_session(&self) -> Session {
        self.session.clone()
    }

    async fn logout(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone)]
pub struct AppwriteConfig {
    /// API root including the version segment, e.g. `https://cloud.appwrite.io/v1`
    pub endpoint: String,
    pub project: String,
    /// Session secret identifying the signed-in visitor, if any
    pub session_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionList {
    sessions: Vec<ProviderSession>,
}

#[derive(Debug, Deserialize)]
struct ProviderSession {
    provider: String,
    #[serde(rename = "providerAccessToken", default)]
    provider_access_token: String,
}

/// Session provider backed by an Appwrite project with GitHub OAuth enabled
pub struct AppwriteSessionProvider {
    client: Client,
    config: AppwriteConfig,
}

impl AppwriteSessionProvider {
    pub fn new(config: AppwriteConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("repo-stats-tracker/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder.header("X-Appwrite-Project", &self.config.project);
        match &self.config.session_secret {
            Some(secret) => builder.header("X-Appwrite-Session", secret),
            None => builder,
        }
    }

    async fn fetch_user(&self) -> Result<UserIdentity> {
        let response = self
            .request(self.client.get(self.endpoint("/account")))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TrackerError::Auth(format!(
                "account lookup failed with status {}",
                response.status()
            )));
        }

        Ok(response.json().await?)
    }

    async fn fetch_github_token(&self) -> Result<Option<String>> {
        let response = self
            .request(self.client.get(self.endpoint("/account/sessions")))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TrackerError::Auth(format!(
                "session listing failed with status {}",
                response.status()
            )));
        }

        let list: SessionList = response.json().await?;
        Ok(list
            .sessions
            .into_iter()
            .find(|s| s.provider == "github" && !s.provider_access_token.is_empty())
            .map(|s| s.provider_access_token))
    }
}

#[async_trait]
impl SessionProvider for AppwriteSessionProvider {
    async fn start_login(&self, return_url: &str) -> Result<Url> {
        let mut url = Url::parse(&self.endpoint("/account/sessions/oauth2/github"))
            .map_err(|e| TrackerError::Auth(format!("Invalid Appwrite endpoint: {}", e)))?;

        url.query_pairs_mut()
            .append_pair("project", &self.config.project)
            .append_pair("success", return_url)
            .append_pair("failure", return_url);

        Ok(url)
    }

    async fn current_session(&self) -> Session {
        if self.config.session_secret.is_none() {
            return Session::Anonymous;
        }

        let user = match self.fetch_user().await {
            Ok(user) => user,
            Err(e) => {
                debug!("No signed-in user: {}", e);
                return Session::Anonymous;
            }
        };

        match self.fetch_github_token().await {
            Ok(Some(token)) => Session::AuthenticatedWithToken(user, token),
            Ok(None) => Session::Authenticated(user),
            Err(e) => {
                warn!(user_id = %user.id, "Error getting sessions: {}", e);
                Session::Authenticated(user)
            }
        }
    }

    async fn logout(&self) -> bool {
        let result = self
            .request(self.client.delete(self.endpoint("/account/sessions/current")))
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!("Logout rejected with status {}", response.status());
                false
            }
            Err(e) => {
                error!("Logout error: {}", e);
                false
            }
        }
    }
}
