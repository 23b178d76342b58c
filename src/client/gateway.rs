//! HTTP client for the gateway API
//!
//! Used by barrels and the downloader to register themselves and relay log
//! messages, and by the `googol` CLI for queries.

use crate::api::{
    decode_response, expect_success, CallbackRequest, CrawlMessage, DeregisterReplicaRequest,
    QueryCount, RegisterCrawlerResponse, RegisterReplicaResponse, RegisterRequest, ReplicaId,
    ReplicaInfo, ReplicaMessage, SearchHit, Severity, SubmitUrlRequest,
};
use crate::common::{base_url, Result};

#[derive(Debug, Clone)]
pub struct GatewayClient {
    base: String,
    http: reqwest::Client,
}

impl GatewayClient {
    pub fn new(gateway_url: &str) -> Self {
        Self::with_client(gateway_url, reqwest::Client::new())
    }

    pub fn with_client(gateway_url: &str, http: reqwest::Client) -> Self {
        Self {
            base: base_url(gateway_url),
            http,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Ask the gateway to crawl `url`. Errors are also pushed to `client`.
    pub async fn submit_url(&self, url: &str, client: Option<&str>) -> Result<()> {
        let body = SubmitUrlRequest {
            url: url.to_string(),
            client: client.map(str::to_string),
        };
        let resp = self.http.post(self.url("/urls")).json(&body).send().await?;
        expect_success(resp).await
    }

    pub async fn subscribe(&self, callback: &str) -> Result<()> {
        let body = CallbackRequest {
            callback: callback.to_string(),
        };
        let resp = self
            .http
            .post(self.url("/clients/subscribe"))
            .json(&body)
            .send()
            .await?;
        expect_success(resp).await
    }

    pub async fn unsubscribe(&self, callback: &str) -> Result<()> {
        let body = CallbackRequest {
            callback: callback.to_string(),
        };
        let resp = self
            .http
            .post(self.url("/clients/unsubscribe"))
            .json(&body)
            .send()
            .await?;
        expect_success(resp).await
    }

    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let resp = self
            .http
            .get(self.url("/search"))
            .query(&[("q", query)])
            .send()
            .await?;
        decode_response(resp).await
    }

    pub async fn sub_links(&self, url: &str) -> Result<Vec<String>> {
        let resp = self
            .http
            .get(self.url("/sublinks"))
            .query(&[("url", url)])
            .send()
            .await?;
        decode_response(resp).await
    }

    pub async fn top_queries(&self) -> Result<Vec<QueryCount>> {
        let resp = self.http.get(self.url("/top-queries")).send().await?;
        decode_response(resp).await
    }

    pub async fn active_replicas(&self) -> Result<Vec<ReplicaInfo>> {
        let resp = self.http.get(self.url("/replicas")).send().await?;
        decode_response(resp).await
    }

    pub async fn register_replica(&self, address: &str) -> Result<ReplicaId> {
        let body = RegisterRequest {
            address: address.to_string(),
        };
        let resp = self
            .http
            .post(self.url("/replicas/register"))
            .json(&body)
            .send()
            .await?;
        let registered: RegisterReplicaResponse = decode_response(resp).await?;
        Ok(registered.id)
    }

    pub async fn deregister_replica(&self, address: &str, id: ReplicaId) -> Result<()> {
        let body = DeregisterReplicaRequest {
            address: address.to_string(),
            id,
        };
        let resp = self
            .http
            .post(self.url("/replicas/deregister"))
            .json(&body)
            .send()
            .await?;
        expect_success(resp).await
    }

    /// `false` when another downloader already holds the slot.
    pub async fn register_crawl_manager(&self, address: &str) -> Result<bool> {
        let body = RegisterRequest {
            address: address.to_string(),
        };
        let resp = self
            .http
            .post(self.url("/crawler/register"))
            .json(&body)
            .send()
            .await?;
        let registered: RegisterCrawlerResponse = decode_response(resp).await?;
        Ok(registered.accepted)
    }

    pub async fn deregister_crawl_manager(&self) -> Result<()> {
        let resp = self.http.post(self.url("/crawler/deregister")).send().await?;
        expect_success(resp).await
    }

    pub async fn relay_crawl_message(&self, text: &str, severity: Severity) -> Result<()> {
        let body = CrawlMessage {
            text: text.to_string(),
            severity,
        };
        let resp = self
            .http
            .post(self.url("/log/crawler"))
            .json(&body)
            .send()
            .await?;
        expect_success(resp).await
    }

    pub async fn relay_replica_message(&self, text: &str) -> Result<()> {
        let body = ReplicaMessage {
            text: text.to_string(),
        };
        let resp = self
            .http
            .post(self.url("/log/replica"))
            .json(&body)
            .send()
            .await?;
        expect_success(resp).await
    }

    pub async fn health(&self) -> Result<serde_json::Value> {
        let resp = self.http.get(self.url("/health")).send().await?;
        decode_response(resp).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Error;

    #[test]
    fn test_base_url_normalized() {
        let client = GatewayClient::new("http://127.0.0.1:8000/");
        assert_eq!(client.base_url(), "http://127.0.0.1:8000");
        assert_eq!(client.url("/search"), "http://127.0.0.1:8000/search");
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_peer_failure() {
        // Bind then drop to get a port nobody listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = GatewayClient::new(&format!("http://{}", addr));
        let err = client.top_queries().await.unwrap_err();
        assert!(err.is_peer_failure(), "unexpected error: {err:?}");
        assert!(matches!(err, Error::ConnectionFailed(_)));
    }
}
