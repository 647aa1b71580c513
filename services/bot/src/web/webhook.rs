//! services/bot/src/web/webhook.rs
//!
//! Axum handlers for the Telegram webhook and the health probe.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn, Instrument};
use uuid::Uuid;

use crate::web::protocol::Update;
use crate::web::state::AppState;

/// Handles one update. The engine runs before the response is sent, so Telegram does not
/// deliver the next update for this webhook until the current one is processed.
pub async fn telegram_webhook_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Value>,
) -> StatusCode {
    let update: Update = match serde_json::from_value(payload) {
        Ok(update) => update,
        Err(e) => {
            warn!("Bad update: {}", e);
            return StatusCode::BAD_REQUEST;
        }
    };
    let update_id = update.update_id;

    let Some((chat, event)) = update.into_event() else {
        debug!(update_id, "Ignoring update the bot does not handle.");
        return StatusCode::OK;
    };

    let span = tracing::info_span!("update", update_id, request_id = %Uuid::new_v4());
    state.engine.handle_event(chat, event).instrument(span).await;
    StatusCode::OK
}

pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
