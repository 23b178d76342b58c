//! Configuration for googol components
//!
//! Every component receives its configuration struct through its constructor;
//! nothing is read from global state. Binaries build these from an optional
//! TOML file (see [`Config::load_from`]) and then apply CLI overrides.

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

/// File-level configuration, one optional section per component.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<CoordinatorConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub barrel: Option<ReplicaConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub downloader: Option<CrawlerConfig>,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file, with `GOOGOL__SECTION__KEY`
    /// environment variables taking precedence. A missing file yields defaults.
    pub fn load_from(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix("GOOGOL")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;
        let config: Config = settings.try_deserialize()?;
        Ok(config)
    }
}

/// Broadcast channel settings shared by the downloader and the barrels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MulticastConfig {
    /// Multicast group address
    #[serde(default = "default_multicast_group")]
    pub group: Ipv4Addr,

    /// Multicast port
    #[serde(default = "default_multicast_port")]
    pub port: u16,

    /// Local interface used to join the group
    #[serde(default = "default_multicast_interface")]
    pub interface: Ipv4Addr,

    /// Datagram TTL (hops)
    #[serde(default = "default_multicast_ttl")]
    pub ttl: u32,
}

fn default_multicast_group() -> Ipv4Addr {
    Ipv4Addr::new(224, 3, 2, 1)
}
fn default_multicast_port() -> u16 {
    4321
}
fn default_multicast_interface() -> Ipv4Addr {
    Ipv4Addr::UNSPECIFIED
}
fn default_multicast_ttl() -> u32 {
    1
}

impl Default for MulticastConfig {
    fn default() -> Self {
        Self {
            group: default_multicast_group(),
            port: default_multicast_port(),
            interface: default_multicast_interface(),
            ttl: default_multicast_ttl(),
        }
    }
}

/// Gateway (coordinator) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Bind address for the HTTP API
    #[serde(default = "default_gateway_addr")]
    pub bind_addr: SocketAddr,

    /// Frontier snapshot left behind by a previous downloader run.
    /// Deleted on gateway startup so that it only survives a downloader restart.
    #[serde(default = "default_frontier_snapshot")]
    pub frontier_snapshot: PathBuf,
}

fn default_gateway_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8000))
}
fn default_frontier_snapshot() -> PathBuf {
    PathBuf::from("./assets/queue.snap")
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_gateway_addr(),
            frontier_snapshot: default_frontier_snapshot(),
        }
    }
}

/// Barrel (index replica) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicaConfig {
    /// Bind address for the barrel HTTP API (port 0 picks a free port)
    #[serde(default = "default_ephemeral_addr")]
    pub bind_addr: SocketAddr,

    /// Host name the gateway should use to reach this barrel
    #[serde(default = "default_advertise_host")]
    pub advertise_host: String,

    /// Gateway base URL
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,

    /// Directory holding per-barrel snapshots
    #[serde(default = "default_barrel_data")]
    pub data_dir: PathBuf,

    /// Stop-word list
    #[serde(default = "default_stop_words")]
    pub stop_words: PathBuf,

    #[serde(default)]
    pub multicast: MulticastConfig,
}

fn default_ephemeral_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 0))
}
fn default_advertise_host() -> String {
    "127.0.0.1".to_string()
}
fn default_gateway_url() -> String {
    "http://127.0.0.1:8000".to_string()
}
fn default_barrel_data() -> PathBuf {
    PathBuf::from("./assets/barrels")
}
fn default_stop_words() -> PathBuf {
    PathBuf::from("./assets/stop_words.txt")
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_ephemeral_addr(),
            advertise_host: default_advertise_host(),
            gateway_url: default_gateway_url(),
            data_dir: default_barrel_data(),
            stop_words: default_stop_words(),
            multicast: MulticastConfig::default(),
        }
    }
}

/// Downloader (crawl manager) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Bind address for the downloader HTTP API
    #[serde(default = "default_ephemeral_addr")]
    pub bind_addr: SocketAddr,

    /// Host name the gateway should use to reach this downloader
    #[serde(default = "default_advertise_host")]
    pub advertise_host: String,

    /// Gateway base URL
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,

    /// Number of concurrent download workers
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Frontier snapshot written on shutdown and restored on startup
    #[serde(default = "default_frontier_snapshot")]
    pub frontier_snapshot: PathBuf,

    /// Stop-word list
    #[serde(default = "default_stop_words")]
    pub stop_words: PathBuf,

    /// Skip URLs that were already queued once
    #[serde(default)]
    pub dedup: bool,

    /// User agent sent with every fetch
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default)]
    pub multicast: MulticastConfig,
}

fn default_workers() -> usize {
    4
}
fn default_user_agent() -> String {
    concat!("googol/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_ephemeral_addr(),
            advertise_host: default_advertise_host(),
            gateway_url: default_gateway_url(),
            workers: default_workers(),
            frontier_snapshot: default_frontier_snapshot(),
            stop_words: default_stop_words(),
            dedup: false,
            user_agent: default_user_agent(),
            multicast: MulticastConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = Config::load_from("/nonexistent/googol.toml").unwrap();
        assert!(config.gateway.is_none());
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "[downloader]\nworkers = 8\n\n[barrel]\ngateway_url = \"http://gw:9000\"\n[barrel.multicast]\nport = 5555"
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        let downloader = config.downloader.unwrap();
        assert_eq!(downloader.workers, 8);
        assert!(!downloader.dedup);

        let barrel = config.barrel.unwrap();
        assert_eq!(barrel.gateway_url, "http://gw:9000");
        assert_eq!(barrel.multicast.port, 5555);
        assert_eq!(barrel.multicast.group, Ipv4Addr::new(224, 3, 2, 1));
    }
}
