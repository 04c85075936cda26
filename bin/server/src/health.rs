//! Liveness endpoints served next to the webhook.

use axum::{Router, routing::get};

/// Builds the health check routes.
pub fn router() -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
}

async fn index() -> &'static str {
    "roster bot is running"
}

async fn health() -> &'static str {
    "OK"
}
