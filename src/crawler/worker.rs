//! Download workers
//!
//! Each worker loops: wait for a URL, fetch, parse, re-queue every outbound
//! link, publish the record. Publishing goes through one send lock so records
//! never interleave. A worker that panics is restarted under the same name by
//! its supervisor; the URL it was working on is lost.

use crate::api::Severity;
use crate::broadcast::Publisher;
use crate::client::GatewayClient;
use crate::common::StopWords;
use crate::crawler::fetch::{parse_page, PageFetcher};
use crate::crawler::frontier::Frontier;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Where workers send their progress messages.
#[async_trait]
pub trait CrawlReporter: Send + Sync {
    async fn report(&self, text: &str, severity: Severity);
}

#[async_trait]
impl CrawlReporter for GatewayClient {
    async fn report(&self, text: &str, severity: Severity) {
        match severity {
            Severity::Info => tracing::info!("{}", text),
            Severity::Error => tracing::warn!("{}", text),
        }
        if let Err(e) = self.relay_crawl_message(text, severity).await {
            tracing::debug!("Could not relay message to the gateway: {}", e);
        }
    }
}

/// State shared by every worker of one downloader.
pub struct WorkerContext {
    pub frontier: Arc<Frontier>,
    pub fetcher: Arc<dyn PageFetcher>,
    pub publisher: Mutex<Publisher>,
    pub stop_words: Arc<StopWords>,
    pub reporter: Arc<dyn CrawlReporter>,
    pub cancel: CancellationToken,
}

pub struct WorkerPool {
    supervisors: Vec<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl WorkerPool {
    /// Start `workers` supervised workers (at least one).
    pub fn spawn(workers: usize, ctx: Arc<WorkerContext>) -> Self {
        let supervisors = (1..=workers.max(1))
            .map(|n| supervise(format!("Downloader-{}", n), ctx.clone()))
            .collect();
        Self {
            supervisors,
            cancel: ctx.cancel.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.supervisors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.supervisors.is_empty()
    }

    /// Stop waiting workers and let busy ones finish their current page.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for supervisor in self.supervisors {
            if let Err(e) = supervisor.await {
                tracing::error!("Worker supervisor failed: {}", e);
            }
        }
    }
}

fn supervise(name: String, ctx: Arc<WorkerContext>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let worker = tokio::spawn(run_worker(name.clone(), ctx.clone()));
            match worker.await {
                Ok(()) => break,
                Err(e) if e.is_panic() => {
                    ctx.reporter
                        .report(&format!("{} crashed. Restarting...", name), Severity::Error)
                        .await;
                    if ctx.cancel.is_cancelled() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!("{} aborted: {}", name, e);
                    break;
                }
            }
        }
    })
}

async fn run_worker(name: String, ctx: Arc<WorkerContext>) {
    loop {
        if ctx.frontier.is_empty() {
            ctx.reporter
                .report(
                    &format!("{}: No URLs to download. Waiting...", name),
                    Severity::Info,
                )
                .await;
        }

        // Once cancelled, never start another page
        let url = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => break,
            url = ctx.frontier.pop() => match url {
                Some(url) => url,
                None => break,
            },
        };

        crawl(&name, &ctx, &url).await;
    }
    tracing::debug!("{} stopped", name);
}

/// Download one page and publish it. Failures are reported, never retried.
async fn crawl(name: &str, ctx: &WorkerContext, url: &str) {
    ctx.reporter
        .report(&format!("{}: Downloading URL: {}", name, url), Severity::Info)
        .await;

    let page = match ctx.fetcher.fetch(url).await {
        Ok(html) => parse_page(url, &html, &ctx.stop_words),
        Err(e) => Err(e),
    };
    let doc = match page {
        Ok(doc) => doc,
        Err(e) => {
            ctx.reporter
                .report(
                    &format!("Error: Failed to extract content from {}: {}", url, e),
                    Severity::Error,
                )
                .await;
            return;
        }
    };

    for link in &doc.outlinks {
        ctx.frontier.push(link.as_str());
    }
    ctx.reporter
        .report(
            &format!("{}: Download complete for URL: {}", name, url),
            Severity::Info,
        )
        .await;

    let record = doc.encode();
    let publisher = ctx.publisher.lock().await;
    if let Err(e) = publisher.publish(record.as_bytes()).await {
        ctx.reporter
            .report(
                &format!("Error: Failed to broadcast {}: {}", url, e),
                Severity::Error,
            )
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::BroadcastBus;
    use crate::common::{Document, Error, Result};
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    /// Serves canned pages; panics on URLs containing "panic".
    struct StaticFetcher {
        pages: HashMap<String, String>,
    }

    #[async_trait]
    impl PageFetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> Result<String> {
            if url.contains("panic") {
                panic!("fetcher blew up on {}", url);
            }
            self.pages.get(url).cloned().ok_or_else(|| Error::Fetch {
                url: url.to_string(),
                reason: "404 Not Found".into(),
            })
        }
    }

    #[derive(Default)]
    struct Collector {
        messages: StdMutex<Vec<(String, Severity)>>,
    }

    #[async_trait]
    impl CrawlReporter for Collector {
        async fn report(&self, text: &str, severity: Severity) {
            self.messages
                .lock()
                .unwrap()
                .push((text.to_string(), severity));
        }
    }

    async fn context(
        bus: &BroadcastBus,
        pages: &[(&str, &str)],
    ) -> (Arc<WorkerContext>, Arc<Collector>) {
        let collector = Arc::new(Collector::default());
        let ctx = WorkerContext {
            frontier: Arc::new(Frontier::new(false)),
            fetcher: Arc::new(StaticFetcher {
                pages: pages
                    .iter()
                    .map(|(url, html)| (url.to_string(), html.to_string()))
                    .collect(),
            }),
            publisher: Mutex::new(bus.publisher().await.unwrap()),
            stop_words: Arc::new(StopWords::from_words(["the"])),
            reporter: collector.clone(),
            cancel: CancellationToken::new(),
        };
        (Arc::new(ctx), collector)
    }

    async fn next_doc(sub: &mut crate::broadcast::Subscriber) -> Document {
        let record = tokio::time::timeout(Duration::from_secs(5), sub.recv())
            .await
            .unwrap()
            .unwrap();
        Document::decode(std::str::from_utf8(&record).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_pages_published_and_links_requeued() {
        let bus = BroadcastBus::local();
        let mut sub = bus.subscribe().await.unwrap();
        let (ctx, collector) = context(
            &bus,
            &[(
                "http://a.com/",
                "<title>A</title><p>hello world</p><a href=\"/b\">b</a>",
            )],
        )
        .await;
        ctx.frontier.push("http://a.com/");

        let pool = WorkerPool::spawn(2, ctx.clone());
        let doc = next_doc(&mut sub).await;
        assert_eq!(doc.url, "http://a.com/");
        assert_eq!(doc.title, "A");
        assert_eq!(doc.outlinks, vec!["http://a.com/b"]);

        pool.shutdown().await;
        // The link was queued: either still waiting or already attempted
        let attempted = collector
            .messages
            .lock()
            .unwrap()
            .iter()
            .any(|(text, _)| text.ends_with("Downloading URL: http://a.com/b"));
        let queued = ctx.frontier.snapshot().contains(&"http://a.com/b".to_string());
        assert!(attempted || queued);
    }

    #[tokio::test]
    async fn test_fetch_failure_reported_not_requeued() {
        let bus = BroadcastBus::local();
        let (ctx, collector) = context(&bus, &[]).await;
        ctx.frontier.push("http://missing.com/");

        let pool = WorkerPool::spawn(1, ctx.clone());
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let failed = collector
                    .messages
                    .lock()
                    .unwrap()
                    .iter()
                    .any(|(text, severity)| {
                        *severity == Severity::Error && text.contains("http://missing.com/")
                    });
                if failed {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        pool.shutdown().await;
        assert!(ctx.frontier.is_empty());
    }

    #[tokio::test]
    async fn test_panicking_worker_restarted() {
        let bus = BroadcastBus::local();
        let mut sub = bus.subscribe().await.unwrap();
        let (ctx, collector) =
            context(&bus, &[("http://ok.com/", "<title>OK</title>")]).await;
        ctx.frontier.push("http://panic.com/");
        ctx.frontier.push("http://ok.com/");

        let pool = WorkerPool::spawn(1, ctx.clone());
        let doc = next_doc(&mut sub).await;
        assert_eq!(doc.url, "http://ok.com/");

        pool.shutdown().await;
        let messages = collector.messages.lock().unwrap();
        assert!(messages
            .iter()
            .any(|(text, _)| text == "Downloader-1 crashed. Restarting..."));
    }
}
