//! services/bot/src/web/middleware.rs
//!
//! Webhook authentication.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::warn;

use crate::web::state::AppState;

pub const SECRET_TOKEN_HEADER: &str = "X-Telegram-Bot-Api-Secret-Token";

/// Rejects webhook calls whose secret token header does not match the configured one.
///
/// With no secret configured every request passes.
pub async fn require_secret_token(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let provided = req
        .headers()
        .get(SECRET_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());

    if !secret_token_valid(state.secret_token.as_deref(), provided) {
        warn!("Webhook call with a missing or wrong secret token.");
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(req).await)
}

fn secret_token_valid(expected: Option<&str>, provided: Option<&str>) -> bool {
    match expected {
        Some(expected) => provided == Some(expected),
        None => true,
    }
}
