pub mod middleware;
pub mod protocol;
pub mod state;
pub mod webhook;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub use middleware::require_secret_token;
pub use state::AppState;
pub use webhook::{health_handler, telegram_webhook_handler};

/// Builds the HTTP surface: the guarded webhook plus an open health probe.
pub fn router(state: Arc<AppState>) -> Router {
    let webhook = Router::new()
        .route("/telegram/webhook", post(telegram_webhook_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_secret_token,
        ));

    Router::new()
        .merge(webhook)
        .route("/healthz", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
