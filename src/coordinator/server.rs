//! Gateway server

use crate::common::snapshot::remove_snapshot;
use crate::common::{CoordinatorConfig, Error, Result};
use crate::coordinator::http::{create_router, CoordState};
use crate::coordinator::peers::{HttpConnector, PeerConnector};
use crate::coordinator::service::CoordinatorService;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct Coordinator {
    config: CoordinatorConfig,
    connector: Arc<dyn PeerConnector>,
}

impl Coordinator {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self::with_connector(config, Arc::new(HttpConnector::new()))
    }

    pub fn with_connector(config: CoordinatorConfig, connector: Arc<dyn PeerConnector>) -> Self {
        Self { config, connector }
    }

    /// Bind the API and start serving in the background.
    pub async fn start(self) -> Result<RunningCoordinator> {
        tracing::info!("Starting gateway");
        tracing::info!("  HTTP API: {}", self.config.bind_addr);

        // A frontier snapshot only survives a downloader restart, not a full restart
        match remove_snapshot(&self.config.frontier_snapshot) {
            Ok(true) => tracing::info!(
                "Removed stale frontier snapshot {}",
                self.config.frontier_snapshot.display()
            ),
            Ok(false) => {}
            Err(e) => tracing::warn!("Failed to delete frontier snapshot: {}", e),
        }

        let service = Arc::new(CoordinatorService::new(self.connector));
        let router = create_router(CoordState {
            service: service.clone(),
        });

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        let local_addr = listener.local_addr()?;

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await
                .map_err(Error::from)
        });

        tracing::info!("✓ Gateway ready on {}", local_addr);

        Ok(RunningCoordinator {
            local_addr,
            service,
            cancel,
            task,
        })
    }

    /// Run until ctrl-c, then notify every peer and stop.
    pub async fn serve(self) -> Result<()> {
        let running = self.start().await?;
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
        }
        running.shutdown().await
    }
}

pub struct RunningCoordinator {
    local_addr: SocketAddr,
    service: Arc<CoordinatorService>,
    cancel: CancellationToken,
    task: JoinHandle<Result<()>>,
}

impl RunningCoordinator {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Base URL peers and clients use to reach the gateway.
    pub fn url(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    pub fn service(&self) -> &Arc<CoordinatorService> {
        &self.service
    }

    /// Push the shutdown message to every peer, then stop serving.
    pub async fn shutdown(self) -> Result<()> {
        self.service.shutdown().await;
        self.cancel.cancel();
        self.task
            .await
            .map_err(|e| Error::Internal(format!("gateway task failed: {}", e)))?
    }
}
