//! HTTP API of the gateway
//!
//! Client-facing routes:
//! - `POST /urls`: queue a URL for crawling (202)
//! - `POST /clients/subscribe`, `POST /clients/unsubscribe`
//! - `GET /search?q=`, `GET /sublinks?url=`, `GET /top-queries`, `GET /replicas`
//!
//! Peer-facing routes:
//! - `POST /replicas/register`, `POST /replicas/deregister`
//! - `POST /crawler/register`, `POST /crawler/deregister`
//! - `POST /log/crawler`, `POST /log/replica`
//!
//! Errors are returned as `{code, message}` with the status from
//! [`Error::to_http_status`](crate::Error::to_http_status).

use crate::api::{
    CallbackRequest, CrawlMessage, DeregisterReplicaRequest, QueryCount,
    RegisterCrawlerResponse, RegisterReplicaResponse, RegisterRequest, ReplicaInfo,
    ReplicaMessage, SearchHit, SearchParams, SubLinksParams, SubmitUrlRequest,
};
use crate::common::Result;
use crate::coordinator::service::CoordinatorService;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct CoordState {
    pub service: Arc<CoordinatorService>,
}

pub fn create_router(state: CoordState) -> Router {
    Router::new()
        // Clients
        .route("/urls", post(submit_url))
        .route("/clients/subscribe", post(subscribe))
        .route("/clients/unsubscribe", post(unsubscribe))
        .route("/search", get(search))
        .route("/sublinks", get(sub_links))
        .route("/top-queries", get(top_queries))
        .route("/replicas", get(active_replicas))
        // Barrels
        .route("/replicas/register", post(register_replica))
        .route("/replicas/deregister", post(deregister_replica))
        .route("/log/replica", post(relay_replica_message))
        // Downloader
        .route("/crawler/register", post(register_crawler))
        .route("/crawler/deregister", post(deregister_crawler))
        .route("/log/crawler", post(relay_crawl_message))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn submit_url(
    State(state): State<CoordState>,
    Json(req): Json<SubmitUrlRequest>,
) -> Result<StatusCode> {
    state
        .service
        .submit_url(&req.url, req.client.as_deref())
        .await?;
    Ok(StatusCode::ACCEPTED)
}

async fn subscribe(
    State(state): State<CoordState>,
    Json(req): Json<CallbackRequest>,
) -> Result<StatusCode> {
    state.service.subscribe(&req.callback).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn unsubscribe(
    State(state): State<CoordState>,
    Json(req): Json<CallbackRequest>,
) -> Result<StatusCode> {
    state.service.unsubscribe(&req.callback).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn search(
    State(state): State<CoordState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<SearchHit>>> {
    Ok(Json(state.service.search(&params.q).await?))
}

async fn sub_links(
    State(state): State<CoordState>,
    Query(params): Query<SubLinksParams>,
) -> Result<Json<Vec<String>>> {
    Ok(Json(state.service.find_sub_links(&params.url).await?))
}

async fn top_queries(State(state): State<CoordState>) -> Result<Json<Vec<QueryCount>>> {
    Ok(Json(state.service.top_queries().await?))
}

async fn active_replicas(State(state): State<CoordState>) -> Result<Json<Vec<ReplicaInfo>>> {
    Ok(Json(state.service.active_replicas().await?))
}

async fn register_replica(
    State(state): State<CoordState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegisterReplicaResponse>> {
    let id = state.service.register_replica(&req.address).await?;
    Ok(Json(RegisterReplicaResponse { id }))
}

async fn deregister_replica(
    State(state): State<CoordState>,
    Json(req): Json<DeregisterReplicaRequest>,
) -> Result<StatusCode> {
    state
        .service
        .deregister_replica(&req.address, req.id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn relay_replica_message(
    State(state): State<CoordState>,
    Json(msg): Json<ReplicaMessage>,
) -> StatusCode {
    state.service.relay_replica_message(&msg.text).await;
    StatusCode::NO_CONTENT
}

async fn register_crawler(
    State(state): State<CoordState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegisterCrawlerResponse>> {
    let accepted = state.service.register_crawl_manager(&req.address).await?;
    Ok(Json(RegisterCrawlerResponse { accepted }))
}

async fn deregister_crawler(State(state): State<CoordState>) -> StatusCode {
    state.service.deregister_crawl_manager().await;
    StatusCode::NO_CONTENT
}

async fn relay_crawl_message(
    State(state): State<CoordState>,
    Json(msg): Json<CrawlMessage>,
) -> StatusCode {
    state
        .service
        .relay_crawl_message(&msg.text, msg.severity)
        .await;
    StatusCode::NO_CONTENT
}

async fn health(State(state): State<CoordState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "replicas": state.service.replica_count().await,
        "clients": state.service.client_count().await,
        "crawl_manager": state.service.has_crawl_manager().await,
    }))
}
