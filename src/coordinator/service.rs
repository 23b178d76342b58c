//! Gateway operations
//!
//! Lock order is barrels before clients. Registry changes and the
//! notification push they trigger run under the registry lock, so two
//! registrations can never interleave their id allocation or their pushes.
//! A transport failure on any peer call evicts that peer; nothing is retried.

use crate::api::{QueryCount, ReplicaId, ReplicaInfo, SearchHit, Severity, SHUTDOWN_MESSAGE};
use crate::common::{base_url, validate_url, Error, Result};
use crate::coordinator::peers::{ClientPeer, CrawlManagerPeer, PeerConnector, ReplicaPeer};
use crate::coordinator::registry::{ClientRegistry, ReplicaRegistry};
use futures_util::future::join_all;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

const NOT_ACTIVE: &str = "Downloader Manager or barrels not active";
const INVALID_URL: &str = "Invalid URL";

type Replicas = ReplicaRegistry<Arc<dyn ReplicaPeer>>;
type Clients = ClientRegistry<Arc<dyn ClientPeer>>;

/// The barrel chosen for one read.
struct Picked {
    id: ReplicaId,
    address: String,
    peer: Arc<dyn ReplicaPeer>,
}

struct CrawlerSlot {
    address: String,
    peer: Arc<dyn CrawlManagerPeer>,
}

pub struct CoordinatorService {
    replicas: Mutex<Replicas>,
    clients: Mutex<Clients>,
    crawler: Mutex<Option<CrawlerSlot>>,
    connector: Arc<dyn PeerConnector>,
}

impl CoordinatorService {
    pub fn new(connector: Arc<dyn PeerConnector>) -> Self {
        Self {
            replicas: Mutex::new(ReplicaRegistry::new()),
            clients: Mutex::new(ClientRegistry::new()),
            crawler: Mutex::new(None),
            connector,
        }
    }

    // === Client operations ===

    /// Forward `url` to the downloader. Problems are pushed to `client` as a
    /// message and returned.
    pub async fn submit_url(&self, url: &str, client: Option<&str>) -> Result<()> {
        let url = match validate_url(url) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Invalid URL: {}", url);
                self.reply(client, INVALID_URL).await;
                return Err(e);
            }
        };

        let crawler = self
            .crawler
            .lock()
            .await
            .as_ref()
            .map(|slot| slot.peer.clone());
        let no_replicas = self.replicas.lock().await.is_empty();

        let peer = match crawler {
            Some(peer) if !no_replicas => peer,
            crawler => {
                tracing::warn!("{}", NOT_ACTIVE);
                self.reply(client, NOT_ACTIVE).await;
                return Err(if crawler.is_none() {
                    Error::NoCrawlManager
                } else {
                    Error::NoReplicas
                });
            }
        };

        tracing::info!("Sending download request to the downloader: {}", url);
        if let Err(e) = peer.enqueue(&url).await {
            let e = self.crawl_manager_failed(e).await;
            self.reply(client, &format!("Could not queue {}: {}", url, e))
                .await;
            return Err(e);
        }
        Ok(())
    }

    pub async fn subscribe(&self, callback: &str) -> Result<()> {
        let address = callback_address(callback)?;
        let peer = self.connector.client(&address);
        if self.clients.lock().await.subscribe(&address, peer) {
            tracing::info!("Client subscribed: {}", address);
        } else {
            tracing::debug!("Client {} already subscribed", address);
        }
        Ok(())
    }

    /// Unsubscribing an unknown client is a no-op.
    pub async fn unsubscribe(&self, callback: &str) -> Result<()> {
        let address = callback_address(callback)?;
        if self.clients.lock().await.unsubscribe(&address) {
            tracing::info!("Client unsubscribed: {}", address);
        } else {
            tracing::warn!("Client not found in the subscription list: {}", address);
        }
        Ok(())
    }

    /// Search on a random barrel, then push that barrel's query counters to
    /// every subscribed client.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        if query.trim().is_empty() {
            return Err(Error::InvalidArgument("empty query".into()));
        }

        let picked = self.pick_replica().await?;
        let hits = match picked.peer.search(query).await {
            Ok(hits) => hits,
            Err(e) => return Err(self.replica_failed(&picked, e).await),
        };

        match picked.peer.top_queries().await {
            Ok(stats) => self.push_stats(stats).await,
            Err(e) => {
                let e = self.replica_failed(&picked, e).await;
                tracing::warn!("Could not refresh query stats: {}", e);
            }
        }
        Ok(hits)
    }

    pub async fn find_sub_links(&self, url: &str) -> Result<Vec<String>> {
        let url = validate_url(url)?;
        let picked = self.pick_replica().await?;
        match picked.peer.sub_links(&url).await {
            Ok(links) => Ok(links),
            Err(e) => Err(self.replica_failed(&picked, e).await),
        }
    }

    pub async fn top_queries(&self) -> Result<Vec<QueryCount>> {
        let picked = self.pick_replica().await?;
        match picked.peer.top_queries().await {
            Ok(stats) => Ok(stats),
            Err(e) => Err(self.replica_failed(&picked, e).await),
        }
    }

    pub async fn active_replicas(&self) -> Result<Vec<ReplicaInfo>> {
        let replicas = self.replicas.lock().await;
        if replicas.is_empty() {
            tracing::warn!("No barrels available");
            return Err(Error::NoReplicas);
        }
        Ok(replicas.list())
    }

    // === Barrel operations ===

    pub async fn register_replica(&self, address: &str) -> Result<ReplicaId> {
        if address.trim().is_empty() {
            tracing::warn!("Attempted to add a null barrel");
            return Err(Error::InvalidArgument("cannot add a null barrel".into()));
        }
        let address = base_url(address.trim());
        let peer = self.connector.replica(&address);

        let mut replicas = self.replicas.lock().await;
        let id = replicas.register(&address, peer);
        tracing::info!("Barrel added with ID: {} ({})", id, address);

        let list = replicas.list();
        self.push_replicas(list).await;
        Ok(id)
    }

    /// Remove the barrel registered at `address`; its stored id is freed.
    pub async fn deregister_replica(&self, address: &str, id: ReplicaId) -> Result<()> {
        let address = base_url(address.trim());

        let mut replicas = self.replicas.lock().await;
        match replicas.deregister(&address) {
            Some(removed) => {
                if removed != id {
                    tracing::warn!(
                        "Barrel at {} claimed ID {} but was registered as {}",
                        address,
                        id,
                        removed
                    );
                }
                tracing::info!("Barrel removed: {}", removed);
                let list = replicas.list();
                self.push_replicas(list).await;
            }
            None => tracing::warn!("Barrel not found: {} ({})", id, address),
        }
        Ok(())
    }

    pub async fn relay_replica_message(&self, text: &str) {
        tracing::warn!("{}", text);
    }

    // === Downloader operations ===

    /// `false` without effect when a downloader is already registered.
    pub async fn register_crawl_manager(&self, address: &str) -> Result<bool> {
        if address.trim().is_empty() {
            return Err(Error::InvalidArgument("cannot add a null downloader".into()));
        }
        let address = base_url(address.trim());

        let mut slot = self.crawler.lock().await;
        if let Some(current) = slot.as_ref() {
            tracing::warn!("Downloader Manager already active at {}", current.address);
            return Ok(false);
        }
        *slot = Some(CrawlerSlot {
            peer: self.connector.crawl_manager(&address),
            address,
        });
        tracing::info!("Downloader Manager active");
        Ok(true)
    }

    pub async fn deregister_crawl_manager(&self) {
        match self.crawler.lock().await.take() {
            Some(slot) => tracing::info!("Downloader Manager removed: {}", slot.address),
            None => tracing::warn!("Downloader Manager not found"),
        }
    }

    pub async fn relay_crawl_message(&self, text: &str, severity: Severity) {
        match severity {
            Severity::Error => tracing::warn!("{}", text),
            Severity::Info => tracing::info!("{}", text),
        }
    }

    // === Lifecycle ===

    /// Tell the downloader, every barrel and every client that the gateway is
    /// going away, then drop all registrations.
    pub async fn shutdown(&self) {
        tracing::info!("Gateway shutting down...");

        if let Some(slot) = self.crawler.lock().await.take() {
            if let Err(e) = slot.peer.shutdown(SHUTDOWN_MESSAGE).await {
                tracing::warn!("Could not notify the downloader: {}", e);
            }
        }

        let mut replicas = self.replicas.lock().await;
        let mut clients = self.clients.lock().await;

        let barrel_calls = replicas.peers().into_iter().map(|(id, peer)| async move {
            if let Err(e) = peer.shutdown(SHUTDOWN_MESSAGE).await {
                tracing::warn!("Could not notify barrel {}: {}", id, e);
            }
        });
        let client_calls = clients.peers().into_iter().map(|(address, peer)| async move {
            if let Err(e) = peer.notify_message(SHUTDOWN_MESSAGE).await {
                tracing::warn!("Could not notify client {}: {}", address, e);
            }
        });
        join_all(client_calls).await;
        join_all(barrel_calls).await;

        replicas.clear();
        clients.clear();
    }

    pub async fn replica_count(&self) -> usize {
        self.replicas.lock().await.len()
    }

    pub async fn client_count(&self) -> usize {
        self.clients.lock().await.len()
    }

    pub async fn has_crawl_manager(&self) -> bool {
        self.crawler.lock().await.is_some()
    }

    // === Internals ===

    async fn pick_replica(&self) -> Result<Picked> {
        match self.replicas.lock().await.pick_random() {
            Some((id, address, peer)) => Ok(Picked { id, address, peer }),
            None => {
                tracing::warn!("No barrels available");
                Err(Error::NoReplicas)
            }
        }
    }

    /// Evict the picked barrel if `err` means it is gone. Its id may have been
    /// freed and reused while the call was in flight; only the same barrel is
    /// removed. Returns the error to report.
    async fn replica_failed(&self, picked: &Picked, err: Error) -> Error {
        let id = picked.id;
        if !err.is_peer_failure() {
            return err;
        }
        tracing::warn!("Barrel crashed: {} ({})", id, err);

        let mut replicas = self.replicas.lock().await;
        if replicas.remove_if(id, &picked.address) {
            let list = replicas.list();
            self.push_replicas(list).await;
        }
        Error::PeerUnavailable(format!("barrel {} did not answer", id))
    }

    async fn crawl_manager_failed(&self, err: Error) -> Error {
        if !err.is_peer_failure() {
            return err;
        }
        tracing::warn!("Downloader Manager crashed: {}", err);
        self.crawler.lock().await.take();
        Error::PeerUnavailable("downloader did not answer".into())
    }

    /// Push a message to the submitting client, or log it if there is none.
    async fn reply(&self, client: Option<&str>, text: &str) {
        let Some(address) = client else {
            tracing::warn!("No client to notify: {}", text);
            return;
        };
        let peer = self.connector.client(&base_url(address));
        if let Err(e) = peer.notify_message(text).await {
            tracing::warn!("Could not notify client {}: {}", address, e);
        }
    }

    async fn push_replicas(&self, list: Vec<ReplicaInfo>) {
        let mut clients = self.clients.lock().await;
        fan_out(&mut clients, |peer| {
            let list = list.clone();
            async move { peer.notify_replicas(&list).await }
        })
        .await;
    }

    async fn push_stats(&self, stats: Vec<QueryCount>) {
        let mut clients = self.clients.lock().await;
        fan_out(&mut clients, |peer| {
            let stats = stats.clone();
            async move { peer.notify_stats(&stats).await }
        })
        .await;
    }
}

fn callback_address(callback: &str) -> Result<String> {
    let callback = callback.trim();
    if callback.is_empty() {
        return Err(Error::InvalidArgument("empty callback address".into()));
    }
    Ok(base_url(callback))
}

/// Notify every client concurrently; clients whose callback fails are dropped.
async fn fan_out<F, Fut>(clients: &mut Clients, notify: F)
where
    F: Fn(Arc<dyn ClientPeer>) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let calls = clients.peers().into_iter().map(|(address, peer)| {
        let call = notify(peer);
        async move { (address, call.await) }
    });
    for (address, outcome) in join_all(calls).await {
        if let Err(e) = outcome {
            tracing::warn!("Dropping client {}: {}", address, e);
            clients.unsubscribe(&address);
        }
    }
}
