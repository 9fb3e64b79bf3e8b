use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "repo-stats-tracker")]
#[command(about = "Repo Stats Tracker - Live GitHub star, fork and watcher counts for a repository")]
#[command(version = "0.1.0")]
pub struct Cli {
    /// Repository owner
    #[arg(long, env = "GITHUB_OWNER", default_value = "appwrite")]
    pub owner: String,

    /// Repository name
    #[arg(long, env = "GITHUB_REPO", default_value = "appwrite")]
    pub repo: String,

    /// Milliseconds between two stats refreshes
    #[arg(long, env = "REFRESH_INTERVAL_MS", default_value_t = 60_000,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub refresh_interval_ms: u64,

    /// GitHub REST API base URL
    #[arg(long, env = "GITHUB_API_URL", default_value = "https://api.github.com")]
    pub github_api_url: String,

    /// Static GitHub token used when no OAuth provider is configured
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Appwrite API endpoint, e.g. https://cloud.appwrite.io/v1
    #[arg(long, env = "APPWRITE_ENDPOINT", requires = "appwrite_project")]
    pub appwrite_endpoint: Option<String>,

    /// Appwrite project id
    #[arg(long, env = "APPWRITE_PROJECT")]
    pub appwrite_project: Option<String>,

    /// Appwrite session secret of the signed-in visitor
    #[arg(long, env = "APPWRITE_SESSION", hide_env_values = true)]
    pub appwrite_session: Option<String>,

    /// HTTP port of the dashboard API
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Public URL the OAuth provider redirects back to
    #[arg(long, env = "PUBLIC_URL", default_value = "http://localhost:8080/")]
    pub public_url: String,

    /// Timeout of a single GitHub request, in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,
}
