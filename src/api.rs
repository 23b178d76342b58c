//! Request/response types shared by every googol HTTP API
//!
//! The gateway, the barrels, the downloader and subscribed clients all talk
//! JSON over HTTP; a peer handle is the peer's base URL.

use crate::common::{Error, ErrorBody, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier handed out by the gateway to each registered barrel.
pub type ReplicaId = u32;

/// Message the gateway sends to every peer when it stops.
pub const SHUTDOWN_MESSAGE: &str = "Gateway shutting down.";

/// One ranked search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub citation: String,
}

/// Number of times a normalized term was searched on one barrel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryCount {
    pub term: String,
    pub count: u64,
}

impl fmt::Display for QueryCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.term, self.count)
    }
}

/// Entry of the active barrel list pushed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaInfo {
    pub id: ReplicaId,
    pub address: String,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Error,
}

// === Gateway requests ===

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitUrlRequest {
    pub url: String,
    /// Callback base URL of the submitting client, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackRequest {
    pub callback: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchParams {
    pub q: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubLinksParams {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterReplicaResponse {
    pub id: ReplicaId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeregisterReplicaRequest {
    pub address: String,
    pub id: ReplicaId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterCrawlerResponse {
    pub accepted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlMessage {
    pub text: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicaMessage {
    pub text: String,
}

// === Barrel / downloader / client requests ===

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueRequest {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownRequest {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageNotification {
    pub text: String,
}

/// Render search hits as `title`, `citation`, `url` lines per hit.
pub fn render_hits(hits: &[SearchHit]) -> String {
    let mut out = String::new();
    for hit in hits {
        if !hit.title.is_empty() {
            out.push_str(&hit.title);
            out.push('\n');
        }
        if !hit.citation.is_empty() {
            out.push_str(&hit.citation);
            out.push('\n');
        }
        out.push_str(&hit.url);
        out.push('\n');
    }
    out
}

/// Render query counters as `term - count` lines.
pub fn render_top_queries(counts: &[QueryCount]) -> String {
    counts.iter().map(|c| format!("{}\n", c)).collect()
}

/// Decode a JSON response, turning error bodies back into [`Error`] variants.
pub(crate) async fn decode_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    if resp.status().is_success() {
        return Ok(resp.json::<T>().await?);
    }
    Err(error_from_response(resp).await)
}

/// Check a response that carries no payload.
pub(crate) async fn expect_success(resp: reqwest::Response) -> Result<()> {
    if resp.status().is_success() {
        return Ok(());
    }
    Err(error_from_response(resp).await)
}

async fn error_from_response(resp: reqwest::Response) -> Error {
    let status = resp.status();
    let text = match resp.text().await {
        Ok(text) => text,
        Err(e) => return e.into(),
    };
    match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => Error::from_body(body),
        Err(_) => Error::Http(format!("{}: {}", status, text)),
    }
}
