//! Gateway (coordinator)
//!
//! The gateway is the single rendezvous point:
//! - Barrel registry (id allocation with reuse)
//! - Downloader slot (at most one)
//! - Read load balancing across barrels (uniform random)
//! - Push notifications to subscribed clients
//! - Crash detection through failed peer calls

pub mod http;
pub mod peers;
pub mod registry;
pub mod server;
pub mod service;

pub use peers::{ClientPeer, CrawlManagerPeer, HttpConnector, PeerConnector, ReplicaPeer};
pub use server::{Coordinator, RunningCoordinator};
pub use service::CoordinatorService;
