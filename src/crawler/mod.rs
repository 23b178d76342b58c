//! Downloader: crawl frontier, worker pool and their manager

pub mod fetch;
pub mod frontier;
pub mod http;
pub mod manager;
pub mod worker;

pub use fetch::{parse_page, HttpFetcher, PageFetcher};
pub use frontier::Frontier;
pub use manager::{CrawlManager, RunningCrawlManager};
pub use worker::{CrawlReporter, WorkerContext, WorkerPool};
