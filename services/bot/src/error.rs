//! services/bot/src/error.rs
//!
//! Startup failures of the `bot` binary. Once the server runs, conversation errors are
//! handled per event by the engine and never reach this type.

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The OpenCart catalog database could not be reached.
    #[error("Catalog database error: {0}")]
    CatalogDatabase(#[from] sqlx::Error),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// The configured conversation state store refused the connection.
    #[error("State store unavailable: {0}")]
    StateStore(String),

    /// Binding the webhook listener or serving it failed.
    #[error("Webhook server error: {0}")]
    Server(#[from] std::io::Error),
}
