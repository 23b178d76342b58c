//! Barrel binary: one or more index replicas in one process

use clap::Parser;
use futures_util::future::join_all;
use googol::common::{Config, StopWords};
use googol::{BroadcastBus, ReplicaServer};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "googol-barrel")]
#[command(about = "googol barrel: index replica fed by the crawl broadcast")]
#[command(version)]
struct Args {
    /// Configuration file (TOML); missing file means defaults
    #[arg(long, default_value = "googol.toml")]
    config: PathBuf,

    /// Gateway base URL
    #[arg(long)]
    gateway: Option<String>,

    /// Bind address for the barrel API (port 0 picks a free port)
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Host name the gateway uses to reach this barrel
    #[arg(long)]
    advertise_host: Option<String>,

    /// Directory for index snapshots
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Stop-word list
    #[arg(long)]
    stop_words: Option<PathBuf>,

    /// Multicast group
    #[arg(long)]
    multicast_group: Option<Ipv4Addr>,

    /// Multicast port
    #[arg(long)]
    multicast_port: Option<u16>,

    /// Number of barrels to run in this process
    #[arg(long, default_value = "1")]
    count: u16,

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

    let mut barrel_config = config.barrel.unwrap_or_default();
    if let Some(gateway) = args.gateway {
        barrel_config.gateway_url = gateway;
    }
    if let Some(bind) = args.bind {
        barrel_config.bind_addr = bind;
    }
    if let Some(host) = args.advertise_host {
        barrel_config.advertise_host = host;
    }
    if let Some(dir) = args.data_dir {
        barrel_config.data_dir = dir;
    }
    if let Some(path) = args.stop_words {
        barrel_config.stop_words = path;
    }
    if let Some(group) = args.multicast_group {
        barrel_config.multicast.group = group;
    }
    if let Some(port) = args.multicast_port {
        barrel_config.multicast.port = port;
    }

    tracing::info!("googol barrel {}", googol::VERSION);
    tracing::info!("Gateway: {}", barrel_config.gateway_url);
    tracing::info!(
        "Multicast: {}:{}",
        barrel_config.multicast.group,
        barrel_config.multicast.port
    );

    let stop_words = Arc::new(StopWords::load(&barrel_config.stop_words)?);
    let bus = BroadcastBus::multicast(barrel_config.multicast.clone());

    // A fixed base port is shifted per barrel; port 0 stays ephemeral
    let base_port = barrel_config.bind_addr.port();
    let servers = (0..args.count.max(1)).map(|n| {
        let mut config = barrel_config.clone();
        if base_port != 0 {
            config.bind_addr.set_port(base_port.saturating_add(n));
        }
        ReplicaServer::new(config, bus.clone(), stop_words.clone()).serve()
    });

    let mut failed = None;
    for result in join_all(servers).await {
        if let Err(e) = result {
            tracing::error!("Barrel failed: {}", e);
            failed.get_or_insert(e);
        }
    }
    if let Some(e) = failed {
        return Err(e.into());
    }

    Ok(())
}
