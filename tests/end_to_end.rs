//! End-to-end tests: gateway, barrel and downloader in one process
//!
//! The barrel and the downloader share an in-process broadcast bus and the
//! downloader fetches from a canned page set instead of the network.

use async_trait::async_trait;
use googol::api::{QueryCount, RegisterReplicaResponse, ReplicaInfo};
use googol::client::{CallbackServer, GatewayClient, Notification};
use googol::common::{CoordinatorConfig, CrawlerConfig, ReplicaConfig, StopWords};
use googol::coordinator::RunningCoordinator;
use googol::crawler::{CrawlManager, PageFetcher, RunningCrawlManager};
use googol::replica::{ReplicaServer, RunningReplica};
use googol::{BroadcastBus, Coordinator, Error, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

const EXAMPLE: &str = "http://example.com";

const EXAMPLE_PAGE: &str = r#"<html>
<head>
  <title>Example Domain</title>
  <meta name="description" content="This domain is for use in illustrative examples">
</head>
<body>
  <h1>Example Domain</h1>
  <p>This domain is for use in illustrative examples in documents.</p>
  <a href="/more">More information</a>
</body>
</html>"#;

struct CannedFetcher {
    pages: HashMap<String, String>,
}

#[async_trait]
impl PageFetcher for CannedFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.pages.get(url).cloned().ok_or_else(|| Error::Fetch {
            url: url.to_string(),
            reason: "404 Not Found".into(),
        })
    }
}

fn stop_words() -> Arc<StopWords> {
    Arc::new(StopWords::from_words([
        "this", "is", "for", "in", "use", "the", "a",
    ]))
}

async fn start_gateway(dir: &Path) -> RunningCoordinator {
    let config = CoordinatorConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        frontier_snapshot: dir.join("queue.snap"),
    };
    Coordinator::new(config).start().await.unwrap()
}

async fn start_replica(gateway: &str, dir: &Path, bus: &BroadcastBus) -> RunningReplica {
    let config = ReplicaConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        gateway_url: gateway.to_string(),
        data_dir: dir.join("barrels"),
        ..Default::default()
    };
    ReplicaServer::new(config, bus.clone(), stop_words())
        .start()
        .await
        .unwrap()
}

async fn start_downloader(gateway: &str, dir: &Path, bus: &BroadcastBus) -> RunningCrawlManager {
    let config = CrawlerConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        gateway_url: gateway.to_string(),
        frontier_snapshot: dir.join("queue.snap"),
        workers: 2,
        ..Default::default()
    };
    let fetcher = Arc::new(CannedFetcher {
        pages: HashMap::from([(EXAMPLE.to_string(), EXAMPLE_PAGE.to_string())]),
    });
    CrawlManager::with_fetcher(config, bus.clone(), stop_words(), fetcher)
        .start()
        .await
        .unwrap()
}

/// Wait for the first notification matching `pred`.
async fn wait_for<F>(rx: &mut UnboundedReceiver<Notification>, pred: F) -> Notification
where
    F: Fn(&Notification) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match rx.recv().await {
                Some(n) if pred(&n) => return n,
                Some(_) => continue,
                None => panic!("notification channel closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for notification")
}

async fn wait_until<F: Fn() -> bool>(what: &str, cond: F) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {}", what));
}

fn replica_ids(list: &[ReplicaInfo]) -> Vec<u32> {
    list.iter().map(|r| r.id).collect()
}

#[tokio::test]
async fn test_crawl_index_and_search() {
    let dir = TempDir::new().unwrap();
    let bus = BroadcastBus::local();
    let gw = start_gateway(dir.path()).await;
    let client = GatewayClient::new(&gw.url());

    let (callback, mut rx) = CallbackServer::start("127.0.0.1:0".parse().unwrap(), "127.0.0.1")
        .await
        .unwrap();
    client.subscribe(callback.address()).await.unwrap();

    let downloader = start_downloader(&gw.url(), dir.path(), &bus).await;

    // No barrel yet: the caller is told and nothing is queued
    let err = client
        .submit_url(EXAMPLE, Some(callback.address()))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoReplicas), "unexpected error: {err:?}");
    let msg = wait_for(&mut rx, |n| matches!(n, Notification::Message(_))).await;
    assert_eq!(
        msg,
        Notification::Message("Downloader Manager or barrels not active".into())
    );
    assert!(downloader.frontier().is_empty());

    // Register a barrel; subscribers get the new list
    let replica = start_replica(&gw.url(), dir.path(), &bus).await;
    assert_eq!(replica.id(), 1);
    let pushed = wait_for(&mut rx, |n| matches!(n, Notification::Replicas(_))).await;
    match pushed {
        Notification::Replicas(list) => assert_eq!(replica_ids(&list), vec![1]),
        other => panic!("unexpected notification: {other:?}"),
    }

    client
        .submit_url(EXAMPLE, Some(callback.address()))
        .await
        .unwrap();

    let store = replica.store().clone();
    wait_until("the page to be indexed", || {
        store
            .with_index(|index| index.page(EXAMPLE).is_some())
            .unwrap_or(false)
    })
    .await;

    let hits = client.search("illustrative").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].url, EXAMPLE);
    assert_eq!(hits[0].title, "Example Domain");
    assert_eq!(
        hits[0].citation,
        "This domain is for use in illustrative examples"
    );

    // The search pushed the barrel's counters
    let stats = wait_for(&mut rx, |n| matches!(n, Notification::Stats(_))).await;
    assert_eq!(
        stats,
        Notification::Stats(vec![QueryCount {
            term: "illustrative".into(),
            count: 1,
        }])
    );

    // AND semantics and stop words
    assert!(client.search("illustrative missing").await.unwrap().is_empty());
    assert_eq!(client.search("the example").await.unwrap().len(), 1);

    assert_eq!(
        client.sub_links("http://example.com/more").await.unwrap(),
        vec![EXAMPLE.to_string()]
    );
    assert!(matches!(
        client.sub_links("example.com").await,
        Err(Error::InvalidUrl(_))
    ));

    let active = client.active_replicas().await.unwrap();
    assert_eq!(replica_ids(&active), vec![1]);

    let reported: RegisterReplicaResponse = reqwest::get(format!("{}/id", replica.address()))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reported.id, 1);

    downloader.stop().await.unwrap();
    replica.stop().await.unwrap();
    assert!(matches!(
        client.active_replicas().await,
        Err(Error::NoReplicas)
    ));

    client.unsubscribe(callback.address()).await.unwrap();
    callback.shutdown().await;
    gw.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_query_counts_are_exact() {
    let dir = TempDir::new().unwrap();
    let bus = BroadcastBus::local();
    let gw = start_gateway(dir.path()).await;
    let client = GatewayClient::new(&gw.url());
    let replica = start_replica(&gw.url(), dir.path(), &bus).await;

    for _ in 0..4 {
        assert!(client.search("foo").await.unwrap().is_empty());
    }
    client.search("bar").await.unwrap();

    let top = client.top_queries().await.unwrap();
    assert_eq!(
        top,
        vec![
            QueryCount {
                term: "foo".into(),
                count: 4
            },
            QueryCount {
                term: "bar".into(),
                count: 1
            },
        ]
    );

    replica.stop().await.unwrap();
    gw.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unreachable_barrel_is_evicted() {
    let dir = TempDir::new().unwrap();
    let gw = start_gateway(dir.path()).await;
    let client = GatewayClient::new(&gw.url());

    // Register an address nobody listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let id = client.register_replica(&dead).await.unwrap();
    assert_eq!(id, 1);

    let err = client.search("anything").await.unwrap_err();
    assert!(err.is_peer_failure(), "unexpected error: {err:?}");
    assert!(matches!(
        client.active_replicas().await,
        Err(Error::NoReplicas)
    ));

    // The freed id is handed out again
    assert_eq!(client.register_replica(&dead).await.unwrap(), 1);

    gw.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_second_downloader_rejected() {
    let dir = TempDir::new().unwrap();
    let bus = BroadcastBus::local();
    let gw = start_gateway(dir.path()).await;

    let first = start_downloader(&gw.url(), dir.path(), &bus).await;

    let config = CrawlerConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        gateway_url: gw.url(),
        frontier_snapshot: dir.path().join("other.snap"),
        ..Default::default()
    };
    let fetcher = Arc::new(CannedFetcher {
        pages: HashMap::new(),
    });
    let second = CrawlManager::with_fetcher(config, bus.clone(), stop_words(), fetcher)
        .start()
        .await;
    assert!(matches!(second, Err(Error::CrawlManagerAlreadyRegistered)));

    first.stop().await.unwrap();
    assert!(!gw.service().has_crawl_manager().await);
    gw.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_gateway_shutdown_stops_peers() {
    let dir = TempDir::new().unwrap();
    let bus = BroadcastBus::local();
    let gw = start_gateway(dir.path()).await;
    let replica = start_replica(&gw.url(), dir.path(), &bus).await;
    let downloader = start_downloader(&gw.url(), dir.path(), &bus).await;

    let (callback, mut rx) = CallbackServer::start("127.0.0.1:0".parse().unwrap(), "127.0.0.1")
        .await
        .unwrap();
    GatewayClient::new(&gw.url())
        .subscribe(callback.address())
        .await
        .unwrap();

    gw.shutdown().await.unwrap();

    let msg = wait_for(&mut rx, |n| matches!(n, Notification::Message(_))).await;
    assert_eq!(msg, Notification::Message("Gateway shutting down.".into()));

    // Both peers stop on their own after the shutdown signal
    tokio::time::timeout(Duration::from_secs(5), replica.wait())
        .await
        .expect("barrel did not stop")
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), downloader.wait())
        .await
        .expect("downloader did not stop")
        .unwrap();

    callback.shutdown().await;
}

#[tokio::test]
async fn test_barrel_stops_when_channel_fails() {
    let dir = TempDir::new().unwrap();
    let gw = start_gateway(dir.path()).await;
    let client = GatewayClient::new(&gw.url());

    // The barrel holds the only handle on this bus; once it is dropped the
    // listener sees a closed channel
    let config = ReplicaConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        gateway_url: gw.url(),
        data_dir: dir.path().join("barrels"),
        ..Default::default()
    };
    let replica = ReplicaServer::new(config, BroadcastBus::local(), stop_words())
        .start()
        .await
        .unwrap();
    assert_eq!(replica.id(), 1);

    tokio::time::timeout(Duration::from_secs(5), replica.wait())
        .await
        .expect("barrel kept running after a channel failure")
        .unwrap();

    assert!(matches!(
        client.active_replicas().await,
        Err(Error::NoReplicas)
    ));
    assert!(matches!(
        client.search("anything").await,
        Err(Error::NoReplicas)
    ));

    gw.shutdown().await.unwrap();
}
