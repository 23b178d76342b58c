//! Barrel state shared between the channel listener and the query handlers
//!
//! Exactly one listener mutates the index (write lock); query handlers take
//! read locks. Query counters live behind their own mutex so searches never
//! wait on an index update for longer than the read lock.

use crate::api::{QueryCount, SearchHit};
use crate::common::{tokenize, Document, Error, Result, StopWords};
use crate::replica::index::{Index, QueryStats};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

const INDEX_FILE: &str = "index.snap";
const STATS_FILE: &str = "queries.snap";

pub struct ReplicaStore {
    dir: PathBuf,
    index: RwLock<Index>,
    stats: Mutex<QueryStats>,
    /// Bumped under the stats lock on every recorded search.
    stats_generation: AtomicU64,
    /// Generation of the counters last written to disk.
    stats_saved: Mutex<u64>,
    stop_words: Arc<StopWords>,
}

impl ReplicaStore {
    /// Open the store in `dir`, restoring any snapshots found there.
    /// An unreadable snapshot is logged and the barrel starts empty.
    pub fn open(dir: impl AsRef<Path>, stop_words: Arc<StopWords>) -> Self {
        let dir = dir.as_ref().to_path_buf();

        let index = match Index::load_snapshot(dir.join(INDEX_FILE)) {
            Ok(Some(index)) => {
                tracing::info!(
                    "Restored index snapshot from {} ({} terms, {} pages)",
                    dir.display(),
                    index.term_count(),
                    index.page_count()
                );
                index
            }
            Ok(None) => Index::new(),
            Err(e) => {
                tracing::warn!("Ignoring unreadable index snapshot in {}: {}", dir.display(), e);
                Index::new()
            }
        };

        let stats = match QueryStats::load_snapshot(dir.join(STATS_FILE)) {
            Ok(Some(stats)) => stats,
            Ok(None) => QueryStats::new(),
            Err(e) => {
                tracing::warn!("Ignoring unreadable query stats in {}: {}", dir.display(), e);
                QueryStats::new()
            }
        };

        Self {
            dir,
            index: RwLock::new(index),
            stats: Mutex::new(stats),
            stats_generation: AtomicU64::new(0),
            stats_saved: Mutex::new(0),
            stop_words,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Decode one broadcast record, merge it and persist a full snapshot.
    /// A malformed record is rejected without touching the index.
    pub fn apply_record(&self, record: &[u8]) -> Result<Document> {
        let text = String::from_utf8_lossy(record);
        let doc = Document::decode(&text)?;
        self.apply(&doc)?;
        Ok(doc)
    }

    pub fn apply(&self, doc: &Document) -> Result<()> {
        {
            let mut index = self.index.write().map_err(|_| poisoned("index"))?;
            index.apply(doc, &self.stop_words);
        }

        let index = self.index.read().map_err(|_| poisoned("index"))?;
        if let Err(e) = index.save_snapshot(self.dir.join(INDEX_FILE)) {
            tracing::warn!("Failed to persist index snapshot: {}", e);
        }
        Ok(())
    }

    /// Tokenize `query`, count every surviving term, then run the AND search.
    pub fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let terms = tokenize(query, &self.stop_words);

        if !terms.is_empty() {
            let (generation, counters) = {
                let mut stats = self.stats.lock().map_err(|_| poisoned("stats"))?;
                stats.record(&terms);
                let generation = self.stats_generation.fetch_add(1, Ordering::Relaxed) + 1;
                (generation, stats.clone())
            };
            self.persist_stats(generation, &counters)?;
        }

        let index = self.index.read().map_err(|_| poisoned("index"))?;
        Ok(index.search(&terms))
    }

    /// Write `counters` unless newer ones already reached the disk.
    fn persist_stats(&self, generation: u64, counters: &QueryStats) -> Result<()> {
        let mut saved = self.stats_saved.lock().map_err(|_| poisoned("stats"))?;
        if *saved >= generation {
            return Ok(());
        }
        match counters.save_snapshot(self.dir.join(STATS_FILE)) {
            Ok(()) => *saved = generation,
            Err(e) => tracing::warn!("Failed to persist query stats: {}", e),
        }
        Ok(())
    }

    pub fn sub_links(&self, url: &str) -> Result<Vec<String>> {
        let index = self.index.read().map_err(|_| poisoned("index"))?;
        Ok(index.sub_links(url.trim()))
    }

    pub fn top_queries(&self) -> Result<Vec<QueryCount>> {
        let stats = self.stats.lock().map_err(|_| poisoned("stats"))?;
        Ok(stats.top())
    }

    /// Run a closure against the index under a read lock.
    pub fn with_index<T>(&self, f: impl FnOnce(&Index) -> T) -> Result<T> {
        let index = self.index.read().map_err(|_| poisoned("index"))?;
        Ok(f(&index))
    }
}

fn poisoned(what: &str) -> Error {
    Error::Internal(format!("{} lock poisoned", what))
}
