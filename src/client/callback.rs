//! Client notification callback API
//!
//! A subscribed client exposes three endpoints the gateway pushes to. Every
//! push is forwarded as a [`Notification`] on an unbounded channel; once the
//! receiving side is dropped the endpoints answer `410 Gone` and the gateway
//! drops the subscription.

use crate::api::{MessageNotification, QueryCount, ReplicaInfo};
use crate::common::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Replicas(Vec<ReplicaInfo>),
    Stats(Vec<QueryCount>),
    Message(String),
}

type Sink = mpsc::UnboundedSender<Notification>;

pub fn create_router(sink: Sink) -> Router {
    Router::new()
        .route("/notify/replicas", post(notify_replicas))
        .route("/notify/stats", post(notify_stats))
        .route("/notify/message", post(notify_message))
        .layer(TraceLayer::new_for_http())
        .with_state(sink)
}

async fn notify_replicas(State(sink): State<Sink>, Json(list): Json<Vec<ReplicaInfo>>) -> StatusCode {
    forward(&sink, Notification::Replicas(list))
}

async fn notify_stats(State(sink): State<Sink>, Json(stats): Json<Vec<QueryCount>>) -> StatusCode {
    forward(&sink, Notification::Stats(stats))
}

async fn notify_message(
    State(sink): State<Sink>,
    Json(msg): Json<MessageNotification>,
) -> StatusCode {
    forward(&sink, Notification::Message(msg.text))
}

fn forward(sink: &Sink, notification: Notification) -> StatusCode {
    match sink.send(notification) {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(_) => StatusCode::GONE,
    }
}

/// A running callback listener.
pub struct CallbackServer {
    address: String,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl CallbackServer {
    /// Bind the callback API and start serving it in the background.
    /// Returns the server and the stream of received notifications.
    pub async fn start(
        bind_addr: SocketAddr,
        advertise_host: &str,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Notification>)> {
        let listener = tokio::net::TcpListener::bind(bind_addr).await?;
        let port = listener.local_addr()?.port();
        let address = format!("http://{}:{}", advertise_host, port);

        let (tx, rx) = mpsc::unbounded_channel();
        let router = create_router(tx);
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            let server = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await });
            if let Err(e) = server.await {
                tracing::error!("Callback server error: {}", e);
            }
        });

        tracing::debug!("Callback API listening on {}", address);
        Ok((
            Self {
                address,
                cancel,
                task,
            },
            rx,
        ))
    }

    /// Base URL to hand to the gateway when subscribing.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::warn!("Callback server task failed: {}", e);
        }
    }
}
