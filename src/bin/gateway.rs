//! Gateway binary

use clap::Parser;
use googol::common::Config;
use googol::Coordinator;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "googol-gateway")]
#[command(about = "googol gateway: barrel registry, query routing and client notifications")]
#[command(version)]
struct Args {
    /// Configuration file (TOML); missing file means defaults
    #[arg(long, default_value = "googol.toml")]
    config: PathBuf,

    /// Bind address for the HTTP API
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Frontier snapshot to delete on startup
    #[arg(long)]
    frontier_snapshot: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load config from file, then override with CLI arguments
    let config = Config::load_from(&args.config)?;
    let log_level = args.log_level.clone().unwrap_or(config.log_level.clone());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut gateway_config = config.gateway.unwrap_or_default();
    if let Some(bind) = args.bind {
        gateway_config.bind_addr = bind;
    }
    if let Some(path) = args.frontier_snapshot {
        gateway_config.frontier_snapshot = path;
    }

    tracing::info!("googol gateway {}", googol::VERSION);
    Coordinator::new(gateway_config).serve().await?;

    Ok(())
}
