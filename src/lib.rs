//! # googol
//!
//! A distributed web search engine:
//! - A gateway that registers barrels and the downloader, load-balances reads
//!   and pushes notifications to subscribed clients
//! - Index barrels, each holding a full inverted index and link graph
//! - A downloader running a pool of crawl workers over a shared frontier
//! - A multicast broadcast channel carrying crawled pages to every barrel
//!
//! ## Architecture

#![allow(clippy::result_large_err)]
//!
//! ```text
//!            ┌──────────────────────────────┐
//!  clients ─▶│           Gateway            │◀─ push callbacks
//!            │  barrel registry, downloader │
//!            │  slot, random read balancing │
//!            └──────┬───────────────┬───────┘
//!                   │ HTTP          │ HTTP
//!          ┌────────▼───┐     ┌─────▼──────┐
//!          │ Downloader │     │  Barrels   │
//!          │  frontier  │     │  index +   │
//!          │  + workers │     │  links     │
//!          └─────┬──────┘     └─────▲──────┘
//!                │   UDP multicast  │
//!                └──────────────────┘
//! ```
//!
//! ## Usage
//!
//! ### Start the gateway
//! ```bash
//! googol-gateway --bind 0.0.0.0:8000
//! ```
//!
//! ### Start barrels
//! ```bash
//! googol-barrel --gateway http://127.0.0.1:8000 --count 2
//! ```
//!
//! ### Start the downloader
//! ```bash
//! googol-downloader --gateway http://127.0.0.1:8000 --workers 8
//! ```
//!
//! ### Use the CLI
//! ```bash
//! googol index https://example.com
//! googol search "example domain"
//! googol sublinks https://www.iana.org/domains/example
//! googol top
//! googol watch
//! ```

pub mod api;
pub mod broadcast;
pub mod client;
pub mod common;
pub mod coordinator;
pub mod crawler;
pub mod replica;

// Re-export commonly used types
pub use broadcast::BroadcastBus;
pub use common::{Config, Error, Result};
pub use coordinator::Coordinator;
pub use crawler::CrawlManager;
pub use replica::ReplicaServer;

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
