//! Liveness probe

use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
struct Health {
    status: &'static str,
    version: &'static str,
}

/// GET /api/v1/health
async fn health() -> Json<Health> {
    metrics::counter!("libris_health_checks_total").increment(1);

    Json(Health {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
