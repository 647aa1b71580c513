//! services/bot/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::engine::ConversationEngine;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ConversationEngine>,
    /// Expected value of the `X-Telegram-Bot-Api-Secret-Token` header, if any.
    pub secret_token: Option<String>,
}
