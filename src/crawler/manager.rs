//! Downloader (crawl manager) lifecycle
//!
//! Startup: restore the frontier snapshot, bind the API, open the broadcast
//! publisher, register with the gateway (rejection is fatal), start the
//! worker pool. Shutdown stops the workers, snapshots the frontier and
//! deregisters.

use crate::broadcast::BroadcastBus;
use crate::client::GatewayClient;
use crate::common::{CrawlerConfig, Error, Result, StopWords};
use crate::crawler::fetch::{HttpFetcher, PageFetcher};
use crate::crawler::frontier::Frontier;
use crate::crawler::http::{create_router, CrawlerState};
use crate::crawler::worker::{WorkerContext, WorkerPool};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct CrawlManager {
    config: CrawlerConfig,
    bus: BroadcastBus,
    stop_words: Arc<StopWords>,
    fetcher: Arc<dyn PageFetcher>,
    gateway: GatewayClient,
}

impl CrawlManager {
    pub fn new(config: CrawlerConfig, bus: BroadcastBus, stop_words: Arc<StopWords>) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new(&config.user_agent)?);
        Ok(Self::with_fetcher(config, bus, stop_words, fetcher))
    }

    pub fn with_fetcher(
        config: CrawlerConfig,
        bus: BroadcastBus,
        stop_words: Arc<StopWords>,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Self {
        let gateway = GatewayClient::new(&config.gateway_url);
        Self {
            config,
            bus,
            stop_words,
            fetcher,
            gateway,
        }
    }

    pub async fn start(self) -> Result<RunningCrawlManager> {
        tracing::info!("Starting downloader with {} workers", self.config.workers);

        let frontier = Arc::new(Frontier::new(self.config.dedup));
        let snapshot = self.config.frontier_snapshot.clone();
        match frontier.restore(&snapshot) {
            Ok(0) => {}
            Ok(n) => tracing::info!("Restored {} queued URLs from {}", n, snapshot.display()),
            Err(e) => tracing::warn!("Ignoring unreadable frontier snapshot: {}", e),
        }

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        let port = listener.local_addr()?.port();
        let address = format!("http://{}:{}", self.config.advertise_host, port);

        let publisher = self.bus.publisher().await?;

        if !self.gateway.register_crawl_manager(&address).await? {
            tracing::error!("Another downloader is already registered with the gateway");
            return Err(Error::CrawlManagerAlreadyRegistered);
        }
        tracing::info!("Downloader registered at {}", address);

        let cancel = CancellationToken::new();
        let ctx = Arc::new(WorkerContext {
            frontier: frontier.clone(),
            fetcher: self.fetcher,
            publisher: Mutex::new(publisher),
            stop_words: self.stop_words,
            reporter: Arc::new(self.gateway.clone()),
            cancel: cancel.clone(),
        });
        let pool = WorkerPool::spawn(self.config.workers, ctx);

        let router = create_router(CrawlerState {
            frontier: frontier.clone(),
            shutdown: cancel.clone(),
        });

        let task = tokio::spawn(run(
            listener,
            router,
            pool,
            frontier.clone(),
            snapshot,
            self.gateway,
            cancel.clone(),
        ));

        tracing::info!("✓ Downloader ready");

        Ok(RunningCrawlManager {
            address,
            frontier,
            cancel,
            task,
        })
    }

    /// Run until ctrl-c or the gateway's shutdown signal.
    pub async fn serve(self) -> Result<()> {
        let running = self.start().await?;
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Downloader interrupted, shutting down");
                running.shutdown();
            }
            _ = running.cancel.cancelled() => {}
        }
        running.wait().await
    }
}

pub struct RunningCrawlManager {
    address: String,
    frontier: Arc<Frontier>,
    cancel: CancellationToken,
    task: JoinHandle<Result<()>>,
}

impl RunningCrawlManager {
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn frontier(&self) -> &Arc<Frontier> {
        &self.frontier
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Wait until workers stopped, the frontier is saved and the downloader
    /// deregistered.
    pub async fn wait(self) -> Result<()> {
        self.task
            .await
            .map_err(|e| Error::Internal(format!("downloader task failed: {}", e)))?
    }

    pub async fn stop(self) -> Result<()> {
        self.shutdown();
        self.wait().await
    }
}

async fn run(
    listener: tokio::net::TcpListener,
    router: axum::Router,
    pool: WorkerPool,
    frontier: Arc<Frontier>,
    snapshot: PathBuf,
    gateway: GatewayClient,
    cancel: CancellationToken,
) -> Result<()> {
    let token = cancel.clone();
    let served = axum::serve(listener, router)
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await;
    if let Err(e) = &served {
        tracing::error!("Downloader HTTP server error: {}", e);
    }

    pool.shutdown().await;
    frontier.close();

    let saved = {
        let frontier = frontier.clone();
        let snapshot = snapshot.clone();
        tokio::task::spawn_blocking(move || frontier.save_snapshot(&snapshot)).await
    };
    match saved {
        Ok(Ok(true)) => tracing::info!(
            "Saved {} queued URLs to {}",
            frontier.len(),
            snapshot.display()
        ),
        Ok(Ok(false)) => tracing::info!("Frontier empty, no snapshot written"),
        Ok(Err(e)) => tracing::warn!("Failed to save frontier snapshot: {}", e),
        Err(e) => tracing::warn!("Frontier snapshot task failed: {}", e),
    }

    match gateway.deregister_crawl_manager().await {
        Ok(()) => tracing::info!("Downloader deregistered"),
        Err(e) => tracing::warn!("Downloader could not deregister: {}", e),
    }
    served?;
    Ok(())
}
