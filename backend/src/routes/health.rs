use axum::routing::get;
use axum::Router;
use tracing::debug;

use crate::state::AppState;

/// Liveness only; does not touch the store.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn health() -> &'static str {
    debug!("GET /health");
    "OK"
}
