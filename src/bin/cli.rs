//! googol command-line client

use clap::{Parser, Subcommand};
use googol::api::{render_hits, render_top_queries, SHUTDOWN_MESSAGE};
use googol::client::{CallbackServer, GatewayClient, Notification};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

#[derive(Parser)]
#[command(name = "googol")]
#[command(about = "googol search engine CLI")]
#[command(version)]
struct Cli {
    /// Gateway URL
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    gateway: String,

    /// Bind address for the notification callback listener
    #[arg(long, default_value = "0.0.0.0:0")]
    callback_bind: SocketAddr,

    /// Host name the gateway uses to reach the callback listener
    #[arg(long, default_value = "127.0.0.1")]
    callback_host: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Queue a URL for crawling
    Index {
        url: String,

        /// How long to wait for an error notification
        #[arg(long, default_value = "2")]
        wait_secs: u64,
    },

    /// Search the index
    Search {
        /// Query terms
        #[arg(required = true)]
        terms: Vec<String>,
    },

    /// Pages linking to a URL
    Sublinks { url: String },

    /// Most searched terms
    Top,

    /// Active barrels
    Replicas,

    /// Subscribe and print notifications until ctrl-c
    Watch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();
    let gateway = GatewayClient::new(&cli.gateway);

    match cli.command {
        Commands::Index { url, wait_secs } => {
            let (callback, mut notifications) =
                CallbackServer::start(cli.callback_bind, &cli.callback_host).await?;

            let submitted = gateway.submit_url(&url, Some(callback.address())).await;

            if let Some(text) =
                pushed_error(&submitted, &mut notifications, Duration::from_secs(wait_secs)).await
            {
                println!("{}", text);
            }
            callback.shutdown().await;

            match submitted {
                Ok(()) => println!("Queued {}", url),
                Err(e) => anyhow::bail!("{}", e),
            }
        }

        Commands::Search { terms } => {
            let hits = gateway.search(&terms.join(" ")).await?;
            if hits.is_empty() {
                println!("No results.");
            } else {
                print!("{}", render_hits(&hits));
            }
        }

        Commands::Sublinks { url } => {
            let links = gateway.sub_links(&url).await?;
            if links.is_empty() {
                println!("No pages link to {}.", url);
            } else {
                println!("{}", links.join("\n"));
            }
        }

        Commands::Top => {
            let top = gateway.top_queries().await?;
            print!("{}", render_top_queries(&top));
        }

        Commands::Replicas => {
            for replica in gateway.active_replicas().await? {
                println!(
                    "Barrel {} at {} (since {})",
                    replica.id, replica.address, replica.registered_at
                );
            }
        }

        Commands::Watch => {
            let (callback, mut notifications) =
                CallbackServer::start(cli.callback_bind, &cli.callback_host).await?;
            gateway.subscribe(callback.address()).await?;
            println!("Subscribed as {}, waiting for notifications...", callback.address());

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    notification = notifications.recv() => match notification {
                        Some(Notification::Replicas(list)) => {
                            let ids: Vec<String> = list.iter().map(|r| r.id.to_string()).collect();
                            println!("Active barrels: [{}]", ids.join(", "));
                        }
                        Some(Notification::Stats(stats)) => {
                            println!("Top searches:");
                            print!("{}", render_top_queries(&stats));
                        }
                        Some(Notification::Message(text)) => {
                            println!("{}", text);
                            if text == SHUTDOWN_MESSAGE {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }

            if let Err(e) = gateway.unsubscribe(callback.address()).await {
                tracing::debug!("Unsubscribe failed: {}", e);
            }
            callback.shutdown().await;
        }
    }

    Ok(())
}

/// The message the gateway pushes alongside a failed submission. A successful
/// submission pushes nothing, so there is nothing to wait for.
async fn pushed_error<T, E>(
    submitted: &Result<T, E>,
    notifications: &mut UnboundedReceiver<Notification>,
    wait: Duration,
) -> Option<String> {
    if submitted.is_ok() {
        return None;
    }
    match tokio::time::timeout(wait, notifications.recv()).await {
        Ok(Some(Notification::Message(text))) => Some(text),
        _ => None,
    }
}
