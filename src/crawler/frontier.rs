//! Crawl frontier: the queue of URLs awaiting download
//!
//! A `VecDeque` behind a mutex plus a semaphore holding one permit per queued
//! entry. Workers block on the semaphore, so an empty frontier costs nothing.
//! The same URL may be queued many times unless de-duplication is enabled.

use crate::common::snapshot::{read_snapshot, remove_snapshot, write_snapshot};
use crate::common::Result;
use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Semaphore;

const FRONTIER_MAGIC: &[u8; 8] = b"GGLFRNT1";

pub struct Frontier {
    queue: Mutex<VecDeque<String>>,
    permits: Semaphore,
    seen: Option<Mutex<HashSet<String>>>,
}

impl Frontier {
    /// With `dedup`, a URL is only ever queued once per process lifetime.
    pub fn new(dedup: bool) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            permits: Semaphore::new(0),
            seen: dedup.then(|| Mutex::new(HashSet::new())),
        }
    }

    // A panic while holding the lock cannot leave the queue half-updated
    fn queue(&self) -> MutexGuard<'_, VecDeque<String>> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append `url` and release one permit. `false` if de-duplication skipped it.
    pub fn push(&self, url: impl Into<String>) -> bool {
        let url = url.into();
        if let Some(seen) = &self.seen {
            let mut seen = seen.lock().unwrap_or_else(|e| e.into_inner());
            if !seen.insert(url.clone()) {
                return false;
            }
        }
        self.queue().push_back(url);
        self.permits.add_permits(1);
        true
    }

    /// Wait for the next URL. `None` once the frontier is closed.
    pub async fn pop(&self) -> Option<String> {
        let permit = self.permits.acquire().await.ok()?;
        permit.forget();
        self.queue().pop_front()
    }

    /// Next URL if one is queued right now.
    pub fn try_pop(&self) -> Option<String> {
        let permit = self.permits.try_acquire().ok()?;
        permit.forget();
        self.queue().pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue().is_empty()
    }

    /// Wake every waiting worker with `None`.
    pub fn close(&self) {
        self.permits.close();
    }

    /// Queued URLs in order.
    pub fn snapshot(&self) -> Vec<String> {
        self.queue().iter().cloned().collect()
    }

    /// Persist the queue. An empty queue removes any stale snapshot instead.
    /// Returns whether a snapshot was written.
    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<bool> {
        let path = path.as_ref();
        let urls = self.snapshot();
        if urls.is_empty() {
            remove_snapshot(path)?;
            return Ok(false);
        }
        write_snapshot(path, FRONTIER_MAGIC, &urls)?;
        Ok(true)
    }

    /// Queue every URL of a snapshot, one permit each. Returns how many were read.
    pub fn restore(&self, path: impl AsRef<Path>) -> Result<usize> {
        let urls: Vec<String> = match read_snapshot(path.as_ref(), FRONTIER_MAGIC)? {
            Some(urls) => urls,
            None => return Ok(0),
        };
        let count = urls.len();
        for url in urls {
            self.push(url);
        }
        Ok(count)
    }
}
