use chrono::{DateTime, Local, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("{}", rate_limit_message(.reset_at, .authenticated))]
    RateLimited {
        reset_at: Option<DateTime<Utc>>,
        authenticated: bool,
    },

    #[error("GitHub API error: {status}")]
    Api { status: u16 },

    #[error("Invalid repository: {0}")]
    InvalidRepository(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Dashboard error: {0}")]
    Dashboard(String),
}

pub type Result<T> = std::result::Result<T, TrackerError>;

/// Local wall-clock rendering of a rate-limit reset instant, e.g. `3:04:05 PM`.
pub fn format_reset_time(reset_at: DateTime<Utc>) -> String {
    reset_at.with_timezone(&Local).format("%-I:%M:%S %p").to_string()
}

fn rate_limit_message(reset_at: &Option<DateTime<Utc>>, authenticated: &bool) -> String {
    let mut message = String::from("Looks like you've exceeded GitHub's hourly request limit.");

    if let Some(reset_at) = reset_at {
        message.push_str(&format!(
            " Rate limit will reset at {}.",
            format_reset_time(*reset_at)
        ));
    }

    if *authenticated {
        message.push_str(" Take a short break and check back soon!");
    } else {
        message.push_str(" Sign in with GitHub to raise your hourly limit.");
    }

    message
}
