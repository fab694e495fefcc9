//! Read-only HTTP status endpoint.
//!
//! `GET /health` answers `ok` while the process is up; `GET /stats` returns
//! the latest [`IngestStats`] snapshot as JSON.

use axum::{Json, Router, extract::State, routing::get};
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use crate::pipeline::IngestStats;

pub fn router(stats: watch::Receiver<IngestStats>) -> Router {
  Router::new()
    .route("/health", get(health))
    .route("/stats",  get(stats_handler))
    .layer(TraceLayer::new_for_http())
    .with_state(stats)
}

async fn health() -> &'static str { "ok" }

async fn stats_handler(
  State(stats): State<watch::Receiver<IngestStats>>,
) -> Json<IngestStats> {
  Json(stats.borrow().clone())
}
