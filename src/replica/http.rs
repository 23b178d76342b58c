//! HTTP API of one barrel

use crate::api::{
    QueryCount, RegisterReplicaResponse, ReplicaId, SearchHit, SearchParams, ShutdownRequest,
    SubLinksParams,
};
use crate::common::{Error, Result};
use crate::replica::store::ReplicaStore;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct ReplicaState {
    pub id: ReplicaId,
    pub store: Arc<ReplicaStore>,
    pub shutdown: CancellationToken,
}

pub fn create_router(state: ReplicaState) -> Router {
    Router::new()
        .route("/search", get(search))
        .route("/sublinks", get(sub_links))
        .route("/top-queries", get(top_queries))
        .route("/id", get(get_id))
        .route("/shutdown", post(shutdown))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn search(
    State(state): State<ReplicaState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<SearchHit>>> {
    // Counting a query rewrites the stats snapshot
    let store = state.store.clone();
    let hits = tokio::task::spawn_blocking(move || store.search(&params.q))
        .await
        .map_err(|e| Error::Internal(format!("search task failed: {}", e)))??;
    Ok(Json(hits))
}

async fn sub_links(
    State(state): State<ReplicaState>,
    Query(params): Query<SubLinksParams>,
) -> Result<Json<Vec<String>>> {
    Ok(Json(state.store.sub_links(&params.url)?))
}

async fn top_queries(State(state): State<ReplicaState>) -> Result<Json<Vec<QueryCount>>> {
    Ok(Json(state.store.top_queries()?))
}

async fn get_id(State(state): State<ReplicaState>) -> Json<RegisterReplicaResponse> {
    Json(RegisterReplicaResponse { id: state.id })
}

/// Stop signal from the gateway. Deregistration happens after the response.
async fn shutdown(
    State(state): State<ReplicaState>,
    Json(req): Json<ShutdownRequest>,
) -> StatusCode {
    tracing::info!("Barrel {} received: {}", state.id, req.message);
    state.shutdown.cancel();
    StatusCode::ACCEPTED
}

async fn health(State(state): State<ReplicaState>) -> Result<impl IntoResponse> {
    let (terms, pages) = state
        .store
        .with_index(|index| (index.term_count(), index.page_count()))?;
    Ok(Json(json!({
        "status": "ok",
        "id": state.id,
        "terms": terms,
        "pages": pages,
    })))
}
