//! Downloader binary

use clap::Parser;
use googol::common::{Config, StopWords};
use googol::{BroadcastBus, CrawlManager};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "googol-downloader")]
#[command(about = "googol downloader: crawl frontier and worker pool")]
#[command(version)]
struct Args {
    /// Configuration file (TOML); missing file means defaults
    #[arg(long, default_value = "googol.toml")]
    config: PathBuf,

    /// Gateway base URL
    #[arg(long)]
    gateway: Option<String>,

    /// Bind address for the downloader API (port 0 picks a free port)
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Host name the gateway uses to reach this downloader
    #[arg(long)]
    advertise_host: Option<String>,

    /// Number of download workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Skip URLs that were already queued once
    #[arg(long)]
    dedup: bool,

    /// Frontier snapshot path
    #[arg(long)]
    frontier_snapshot: Option<PathBuf>,

    /// Stop-word list
    #[arg(long)]
    stop_words: Option<PathBuf>,

    /// Multicast group
    #[arg(long)]
    multicast_group: Option<Ipv4Addr>,

    /// Multicast port
    #[arg(long)]
    multicast_port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::load_from(&args.config)?;
    let log_level = args.log_level.clone().unwrap_or(config.log_level.clone());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut crawler_config = config.downloader.unwrap_or_default();
    if let Some(gateway) = args.gateway {
        crawler_config.gateway_url = gateway;
    }
    if let Some(bind) = args.bind {
        crawler_config.bind_addr = bind;
    }
    if let Some(host) = args.advertise_host {
        crawler_config.advertise_host = host;
    }
    if let Some(workers) = args.workers {
        crawler_config.workers = workers;
    }
    if args.dedup {
        crawler_config.dedup = true;
    }
    if let Some(path) = args.frontier_snapshot {
        crawler_config.frontier_snapshot = path;
    }
    if let Some(path) = args.stop_words {
        crawler_config.stop_words = path;
    }
    if let Some(group) = args.multicast_group {
        crawler_config.multicast.group = group;
    }
    if let Some(port) = args.multicast_port {
        crawler_config.multicast.port = port;
    }

    tracing::info!("googol downloader {}", googol::VERSION);
    tracing::info!("Gateway: {}", crawler_config.gateway_url);
    tracing::info!(
        "Multicast: {}:{}",
        crawler_config.multicast.group,
        crawler_config.multicast.port
    );

    let stop_words = Arc::new(StopWords::load(&crawler_config.stop_words)?);
    let bus = BroadcastBus::multicast(crawler_config.multicast.clone());

    CrawlManager::new(crawler_config, bus, stop_words)?
        .serve()
        .await?;

    Ok(())
}
