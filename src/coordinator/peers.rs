//! Outbound calls from the gateway to its peers
//!
//! The gateway only talks to barrels, the downloader and clients through
//! these traits. [`HttpConnector`] builds the HTTP implementations from the
//! address a peer registered with.

use crate::api::{
    decode_response, expect_success, EnqueueRequest, MessageNotification, QueryCount,
    ReplicaInfo, SearchHit, ShutdownRequest,
};
use crate::common::{base_url, Result};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait ReplicaPeer: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>>;
    async fn sub_links(&self, url: &str) -> Result<Vec<String>>;
    async fn top_queries(&self) -> Result<Vec<QueryCount>>;
    async fn shutdown(&self, message: &str) -> Result<()>;
}

#[async_trait]
pub trait CrawlManagerPeer: Send + Sync {
    async fn enqueue(&self, url: &str) -> Result<()>;
    async fn shutdown(&self, message: &str) -> Result<()>;
}

#[async_trait]
pub trait ClientPeer: Send + Sync {
    async fn notify_replicas(&self, replicas: &[ReplicaInfo]) -> Result<()>;
    async fn notify_stats(&self, stats: &[QueryCount]) -> Result<()>;
    async fn notify_message(&self, text: &str) -> Result<()>;
}

/// Turns a registered address into a callable peer.
pub trait PeerConnector: Send + Sync {
    fn replica(&self, address: &str) -> Arc<dyn ReplicaPeer>;
    fn crawl_manager(&self, address: &str) -> Arc<dyn CrawlManagerPeer>;
    fn client(&self, address: &str) -> Arc<dyn ClientPeer>;
}

/// HTTP peers sharing one connection pool. No timeouts: a peer that fails
/// is detected by the transport error, not by a deadline.
#[derive(Debug, Clone, Default)]
pub struct HttpConnector {
    http: reqwest::Client,
}

impl HttpConnector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PeerConnector for HttpConnector {
    fn replica(&self, address: &str) -> Arc<dyn ReplicaPeer> {
        Arc::new(HttpPeer::new(address, self.http.clone()))
    }

    fn crawl_manager(&self, address: &str) -> Arc<dyn CrawlManagerPeer> {
        Arc::new(HttpPeer::new(address, self.http.clone()))
    }

    fn client(&self, address: &str) -> Arc<dyn ClientPeer> {
        Arc::new(HttpPeer::new(address, self.http.clone()))
    }
}

/// A peer reached at `base` over HTTP. Implements all three peer roles; which
/// one is used depends on how the peer registered.
#[derive(Debug, Clone)]
pub struct HttpPeer {
    base: String,
    http: reqwest::Client,
}

impl HttpPeer {
    pub fn new(address: &str, http: reqwest::Client) -> Self {
        Self {
            base: base_url(address),
            http,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn post_shutdown(&self, message: &str) -> Result<()> {
        let body = ShutdownRequest {
            message: message.to_string(),
        };
        let resp = self.http.post(self.url("/shutdown")).json(&body).send().await?;
        expect_success(resp).await
    }
}

#[async_trait]
impl ReplicaPeer for HttpPeer {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let resp = self
            .http
            .get(self.url("/search"))
            .query(&[("q", query)])
            .send()
            .await?;
        decode_response(resp).await
    }

    async fn sub_links(&self, url: &str) -> Result<Vec<String>> {
        let resp = self
            .http
            .get(self.url("/sublinks"))
            .query(&[("url", url)])
            .send()
            .await?;
        decode_response(resp).await
    }

    async fn top_queries(&self) -> Result<Vec<QueryCount>> {
        let resp = self.http.get(self.url("/top-queries")).send().await?;
        decode_response(resp).await
    }

    async fn shutdown(&self, message: &str) -> Result<()> {
        self.post_shutdown(message).await
    }
}

#[async_trait]
impl CrawlManagerPeer for HttpPeer {
    async fn enqueue(&self, url: &str) -> Result<()> {
        let body = EnqueueRequest {
            url: url.to_string(),
        };
        let resp = self.http.post(self.url("/enqueue")).json(&body).send().await?;
        expect_success(resp).await
    }

    async fn shutdown(&self, message: &str) -> Result<()> {
        self.post_shutdown(message).await
    }
}

#[async_trait]
impl ClientPeer for HttpPeer {
    async fn notify_replicas(&self, replicas: &[ReplicaInfo]) -> Result<()> {
        let resp = self
            .http
            .post(self.url("/notify/replicas"))
            .json(replicas)
            .send()
            .await?;
        expect_success(resp).await
    }

    async fn notify_stats(&self, stats: &[QueryCount]) -> Result<()> {
        let resp = self
            .http
            .post(self.url("/notify/stats"))
            .json(stats)
            .send()
            .await?;
        expect_success(resp).await
    }

    async fn notify_message(&self, text: &str) -> Result<()> {
        let body = MessageNotification {
            text: text.to_string(),
        };
        let resp = self
            .http
            .post(self.url("/notify/message"))
            .json(&body)
            .send()
            .await?;
        expect_success(resp).await
    }
}
