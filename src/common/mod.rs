//! Common utilities and types shared across googol

pub mod config;
pub mod error;
pub mod snapshot;
pub mod text;
pub mod utils;
pub mod wire;

pub use config::{Config, CoordinatorConfig, CrawlerConfig, MulticastConfig, ReplicaConfig};
pub use error::{Error, ErrorBody, Result};
pub use text::{normalize_word, tokenize, StopWords};
pub use utils::{base_url, crc32, is_valid_url, validate_url};
pub use wire::{Document, MAX_RECORD_SIZE};
