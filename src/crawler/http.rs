//! HTTP API of the downloader

use crate::api::{EnqueueRequest, ShutdownRequest};
use crate::common::{validate_url, Result};
use crate::crawler::frontier::Frontier;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct CrawlerState {
    pub frontier: Arc<Frontier>,
    pub shutdown: CancellationToken,
}

pub fn create_router(state: CrawlerState) -> Router {
    Router::new()
        .route("/enqueue", post(enqueue))
        .route("/shutdown", post(shutdown))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn enqueue(
    State(state): State<CrawlerState>,
    Json(req): Json<EnqueueRequest>,
) -> Result<StatusCode> {
    let url = validate_url(&req.url)?;
    if !state.frontier.push(url.as_str()) {
        tracing::debug!("Already queued once: {}", url);
    }
    Ok(StatusCode::ACCEPTED)
}

async fn shutdown(
    State(state): State<CrawlerState>,
    Json(req): Json<ShutdownRequest>,
) -> StatusCode {
    tracing::info!("Received: {}", req.message);
    state.shutdown.cancel();
    StatusCode::ACCEPTED
}

async fn health(State(state): State<CrawlerState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "queued": state.frontier.len(),
    }))
}
