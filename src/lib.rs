pub mod actors;
pub mod api;
pub mod auth;
pub mod cli;
pub mod error;
pub mod github;
pub mod health;
pub mod models;
pub mod poller;
pub mod types;
