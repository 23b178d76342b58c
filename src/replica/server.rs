//! Barrel server lifecycle
//!
//! Startup: bind the HTTP API, join the broadcast channel, register with the
//! gateway, restore snapshots. Shutdown (ctrl-c, the gateway's shutdown call
//! or a listener crash) stops the listener and the API, then deregisters.
//! Deregistration runs on every exit path once registration succeeded.

use crate::api::ReplicaId;
use crate::broadcast::{BroadcastBus, Subscriber};
use crate::client::GatewayClient;
use crate::common::{Error, ReplicaConfig, Result, StopWords};
use crate::replica::http::{create_router, ReplicaState};
use crate::replica::store::ReplicaStore;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct ReplicaServer {
    config: ReplicaConfig,
    bus: BroadcastBus,
    stop_words: Arc<StopWords>,
    gateway: GatewayClient,
}

impl ReplicaServer {
    pub fn new(config: ReplicaConfig, bus: BroadcastBus, stop_words: Arc<StopWords>) -> Self {
        let gateway = GatewayClient::new(&config.gateway_url);
        Self {
            config,
            bus,
            stop_words,
            gateway,
        }
    }

    /// Register with the gateway and start serving in the background.
    /// Failing to reach the gateway is fatal.
    pub async fn start(self) -> Result<RunningReplica> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        let port = listener.local_addr()?.port();
        let address = format!("http://{}:{}", self.config.advertise_host, port);

        // Join before registering so no record sent after registration is missed
        let subscriber = self.bus.subscribe().await?;

        let id = self.gateway.register_replica(&address).await?;
        tracing::info!("Barrel {} registered at {}", id, address);

        let store = match self.open_store(id).await {
            Ok(store) => store,
            Err(e) => {
                deregister(&self.gateway, &address, id).await;
                return Err(e);
            }
        };

        let cancel = CancellationToken::new();
        let router = create_router(ReplicaState {
            id,
            store: store.clone(),
            shutdown: cancel.clone(),
        });

        let listen_task = tokio::spawn(listen(
            id,
            subscriber,
            store.clone(),
            self.gateway.clone(),
            cancel.clone(),
        ));

        let task = tokio::spawn(run(
            id,
            address.clone(),
            listener,
            router,
            listen_task,
            self.gateway,
            cancel.clone(),
        ));

        tracing::info!("✓ Barrel {} ready", id);

        Ok(RunningReplica {
            id,
            address,
            store,
            cancel,
            task,
        })
    }

    /// Run until ctrl-c or a shutdown signal from the gateway.
    pub async fn serve(self) -> Result<()> {
        let running = self.start().await?;
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Barrel {} interrupted, shutting down", running.id);
                running.shutdown();
            }
            _ = running.cancel.cancelled() => {}
        }
        running.wait().await
    }

    async fn open_store(&self, id: ReplicaId) -> Result<Arc<ReplicaStore>> {
        let dir = self.config.data_dir.join(format!("replica-{}", id));
        if let Err(e) = tokio::fs::create_dir_all(&dir).await {
            tracing::warn!("Cannot create {}: {} (snapshots disabled)", dir.display(), e);
        }
        tracing::info!("  Data path: {}", dir.display());

        let stop_words = self.stop_words.clone();
        let store = tokio::task::spawn_blocking(move || ReplicaStore::open(dir, stop_words))
            .await
            .map_err(|e| Error::Internal(format!("store open task failed: {}", e)))?;
        Ok(Arc::new(store))
    }
}

/// Handle on a started barrel.
pub struct RunningReplica {
    id: ReplicaId,
    address: String,
    store: Arc<ReplicaStore>,
    cancel: CancellationToken,
    task: JoinHandle<Result<()>>,
}

impl RunningReplica {
    pub fn id(&self) -> ReplicaId {
        self.id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn store(&self) -> &Arc<ReplicaStore> {
        &self.store
    }

    /// Signal the barrel to stop; see [`RunningReplica::wait`].
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Wait until the barrel has stopped and deregistered.
    pub async fn wait(self) -> Result<()> {
        self.task
            .await
            .map_err(|e| Error::Internal(format!("barrel task failed: {}", e)))?
    }

    pub async fn stop(self) -> Result<()> {
        self.shutdown();
        self.wait().await
    }
}

async fn run(
    id: ReplicaId,
    address: String,
    listener: TcpListener,
    router: axum::Router,
    listen_task: JoinHandle<()>,
    gateway: GatewayClient,
    cancel: CancellationToken,
) -> Result<()> {
    let token = cancel.clone();
    let served = axum::serve(listener, router)
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await;
    if let Err(e) = &served {
        tracing::error!("Barrel {} HTTP server error: {}", id, e);
    }

    cancel.cancel();
    if let Err(e) = listen_task.await {
        tracing::error!("Barrel {} listener task failed: {}", id, e);
    }

    deregister(&gateway, &address, id).await;
    served?;
    Ok(())
}

async fn deregister(gateway: &GatewayClient, address: &str, id: ReplicaId) {
    match gateway.deregister_replica(address, id).await {
        Ok(()) => tracing::info!("Barrel {} deregistered", id),
        Err(e) => tracing::warn!("Barrel {} could not deregister: {}", id, e),
    }
}

/// Apply broadcast records one at a time until cancelled.
/// A malformed record is skipped; any other failure stops the barrel.
async fn listen(
    id: ReplicaId,
    mut subscriber: Subscriber,
    store: Arc<ReplicaStore>,
    gateway: GatewayClient,
    cancel: CancellationToken,
) {
    loop {
        let received = tokio::select! {
            _ = cancel.cancelled() => break,
            received = subscriber.recv() => received,
        };

        let outcome = match received {
            Ok(record) => {
                let store = store.clone();
                tokio::task::spawn_blocking(move || store.apply_record(&record))
                    .await
                    .unwrap_or_else(|e| Err(Error::Internal(format!("apply task failed: {}", e))))
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(doc) => tracing::debug!("Barrel {} indexed {}", id, doc.url),
            Err(Error::MalformedRecord(reason)) => {
                tracing::warn!("Barrel {} dropped malformed record: {}", id, reason);
            }
            Err(e) => {
                tracing::error!("Barrel {} listener failed: {}", id, e);
                if let Err(e) = gateway
                    .relay_replica_message(&format!("Replica {} crashed", id))
                    .await
                {
                    tracing::warn!("Could not report crash of barrel {}: {}", id, e);
                }
                cancel.cancel();
                break;
            }
        }
    }
    tracing::info!("Barrel {} stopped listening", id);
}
