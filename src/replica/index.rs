//! In-memory inverted index, link graph and query counters of one barrel
//!
//! The index grows monotonically: every record received on the broadcast
//! channel adds postings and link edges, nothing is ever removed.
//! Backlinks are maintained incrementally, so for every known page `u`,
//! `backlinks[v]` contains `u` exactly when `v` is in `outlinks[u]`.

use crate::api::{QueryCount, SearchHit};
use crate::common::snapshot::{read_snapshot, write_snapshot};
use crate::common::{tokenize, Document, Result, StopWords};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::path::Path;

const INDEX_MAGIC: &[u8; 8] = b"GGLINDX1";
const STATS_MAGIC: &[u8; 8] = b"GGLSTAT1";

/// Title and citation recorded for a page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub title: String,
    pub citation: String,
}

impl PageInfo {
    /// Non-empty incoming values replace stored ones; empty ones keep them.
    fn merge(&mut self, title: &str, citation: &str) {
        if !title.is_empty() {
            self.title = title.to_string();
        }
        if !citation.is_empty() {
            self.citation = citation.to_string();
        }
    }
}

/// Inverted index plus link graph
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Index {
    postings: HashMap<String, HashSet<String>>,
    pages: HashMap<String, PageInfo>,
    outlinks: HashMap<String, HashSet<String>>,
    backlinks: HashMap<String, HashSet<String>>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one crawled page into the index.
    ///
    /// Keywords are re-normalized and stop words dropped, so a stop word
    /// never gets a posting set even if a publisher let one through.
    pub fn apply(&mut self, doc: &Document, stop_words: &StopWords) {
        self.pages
            .entry(doc.url.clone())
            .or_default()
            .merge(&doc.title, &doc.citation);

        for keyword in &doc.keywords {
            for term in tokenize(keyword, stop_words) {
                self.add_posting(term, &doc.url);
            }
        }

        for link in &doc.outlinks {
            self.add_link(&doc.url, link);
        }
    }

    pub fn add_posting(&mut self, term: String, url: &str) {
        self.postings
            .entry(term)
            .or_default()
            .insert(url.to_string());
    }

    /// Record the edge `from -> to` and its reverse backlink.
    pub fn add_link(&mut self, from: &str, to: &str) {
        let to = to.trim();
        if to.is_empty() {
            return;
        }
        let inserted = self
            .outlinks
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
        if inserted {
            self.backlinks
                .entry(to.to_string())
                .or_default()
                .insert(from.to_string());
        }
    }

    pub fn posting(&self, term: &str) -> Option<&HashSet<String>> {
        self.postings.get(term)
    }

    pub fn page(&self, url: &str) -> Option<&PageInfo> {
        self.pages.get(url)
    }

    pub fn outlinks(&self, url: &str) -> Option<&HashSet<String>> {
        self.outlinks.get(url)
    }

    pub fn backlinks(&self, url: &str) -> Option<&HashSet<String>> {
        self.backlinks.get(url)
    }

    pub fn backlink_count(&self, url: &str) -> usize {
        self.backlinks.get(url).map_or(0, HashSet::len)
    }

    /// Number of distinct terms
    pub fn term_count(&self) -> usize {
        self.postings.len()
    }

    /// Number of pages with a recorded title/citation
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// AND across `terms`, ranked by backlink count (ties by URL).
    /// Empty when `terms` is empty or any term is unknown.
    pub fn search(&self, terms: &[String]) -> Vec<SearchHit> {
        let mut sets = Vec::with_capacity(terms.len());
        for term in terms {
            match self.postings.get(term) {
                Some(set) => sets.push(set),
                None => return Vec::new(),
            }
        }
        sets.sort_by_key(|set| set.len());

        let Some((smallest, rest)) = sets.split_first() else {
            return Vec::new();
        };
        let mut matches: Vec<&String> = smallest
            .iter()
            .filter(|url| rest.iter().all(|set| set.contains(*url)))
            .collect();

        matches.sort_by(|a, b| {
            (Reverse(self.backlink_count(a)), a).cmp(&(Reverse(self.backlink_count(b)), b))
        });

        matches
            .into_iter()
            .map(|url| {
                let info = self.pages.get(url).cloned().unwrap_or_default();
                SearchHit {
                    url: url.clone(),
                    title: info.title,
                    citation: info.citation,
                }
            })
            .collect()
    }

    /// Pages linking to `url`, sorted.
    pub fn sub_links(&self, url: &str) -> Vec<String> {
        let mut links: Vec<String> = self
            .backlinks
            .get(url)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        links.sort();
        links
    }

    /// Save the whole index as a snapshot file.
    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<()> {
        write_snapshot(path.as_ref(), INDEX_MAGIC, self)
    }

    /// Load an index snapshot; `None` when no snapshot exists yet.
    pub fn load_snapshot(path: impl AsRef<Path>) -> Result<Option<Self>> {
        read_snapshot(path.as_ref(), INDEX_MAGIC)
    }
}

/// Per-term search counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryStats {
    counts: HashMap<String, u64>,
}

impl QueryStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count every term once per call, found in the index or not.
    pub fn record(&mut self, terms: &[String]) {
        for term in terms {
            *self.counts.entry(term.clone()).or_insert(0) += 1;
        }
    }

    pub fn count(&self, term: &str) -> u64 {
        self.counts.get(term).copied().unwrap_or(0)
    }

    /// All counters, highest first (ties by term).
    pub fn top(&self) -> Vec<QueryCount> {
        let mut top: Vec<QueryCount> = self
            .counts
            .iter()
            .map(|(term, count)| QueryCount {
                term: term.clone(),
                count: *count,
            })
            .collect();
        top.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.term.cmp(&b.term)));
        top
    }

    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<()> {
        write_snapshot(path.as_ref(), STATS_MAGIC, self)
    }

    pub fn load_snapshot(path: impl AsRef<Path>) -> Result<Option<Self>> {
        read_snapshot(path.as_ref(), STATS_MAGIC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn doc(url: &str, keywords: &[&str], links: &[&str]) -> Document {
        Document {
            url: url.to_string(),
            title: format!("Title of {}", url),
            citation: format!("About {}", url),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            outlinks: links.iter().map(|l| l.to_string()).collect(),
        }
    }

    fn terms(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn stop_words() -> StopWords {
        StopWords::from_words(["the", "and", "of"])
    }

    #[test]
    fn test_search_is_and_across_terms() {
        let stop = stop_words();
        let mut index = Index::new();
        index.apply(&doc("http://a.com", &["rust", "search"], &[]), &stop);
        index.apply(&doc("http://b.com", &["python"], &[]), &stop);

        assert_eq!(index.search(&terms(&["rust"])).len(), 1);
        assert!(index.search(&terms(&["rust", "python"])).is_empty());
        assert!(index.search(&terms(&["rust", "unknown"])).is_empty());
        assert!(index.search(&[]).is_empty());

        let hits = index.search(&terms(&["search", "rust"]));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].url, "http://a.com");
        assert_eq!(hits[0].title, "Title of http://a.com");
    }

    #[test]
    fn test_ranked_by_backlinks() {
        let stop = stop_words();
        let mut index = Index::new();
        index.apply(&doc("http://a.com", &["rust"], &["http://c.com"]), &stop);
        index.apply(
            &doc("http://b.com", &["rust"], &["http://c.com", "http://a.com"]),
            &stop,
        );
        index.apply(&doc("http://c.com", &["rust"], &[]), &stop);
        index.apply(&doc("http://d.com", &["rust"], &[]), &stop);

        let urls: Vec<String> = index
            .search(&terms(&["rust"]))
            .into_iter()
            .map(|h| h.url)
            .collect();
        // c has 2 backlinks, a has 1, b and d have none (tie broken by URL)
        assert_eq!(
            urls,
            vec!["http://c.com", "http://a.com", "http://b.com", "http://d.com"]
        );
    }

    #[test]
    fn test_backlink_invariant_holds_for_late_pages() {
        let stop = stop_words();
        let mut index = Index::new();
        // c is crawled before anything links to it
        index.apply(&doc("http://c.com", &["x"], &[]), &stop);
        index.apply(&doc("http://a.com", &["x"], &["http://c.com"]), &stop);
        index.apply(&doc("http://b.com", &["x"], &["http://c.com"]), &stop);

        assert_eq!(index.sub_links("http://c.com"), vec!["http://a.com", "http://b.com"]);
        for (from, targets) in &index.outlinks {
            for to in targets {
                assert!(index.backlinks(to).unwrap().contains(from));
            }
        }
        for (to, sources) in &index.backlinks {
            for from in sources {
                assert!(index.outlinks(from).unwrap().contains(to));
            }
        }
    }

    #[test]
    fn test_stop_word_keyword_not_indexed() {
        let stop = stop_words();
        let mut index = Index::new();
        index.apply(&doc("http://a.com", &["The"], &[]), &stop);

        assert_eq!(index.term_count(), 0);
        assert!(index.posting("the").is_none());
        assert_eq!(index.page_count(), 1);
    }

    #[test]
    fn test_page_info_merge() {
        let stop = stop_words();
        let mut index = Index::new();
        index.apply(&doc("http://a.com", &[], &[]), &stop);

        let mut update = doc("http://a.com", &[], &[]);
        update.title = "New title".into();
        update.citation = String::new();
        index.apply(&update, &stop);

        let info = index.page("http://a.com").unwrap();
        assert_eq!(info.title, "New title");
        assert_eq!(info.citation, "About http://a.com");
    }

    #[test]
    fn test_unknown_sub_links_empty() {
        let index = Index::new();
        assert!(index.sub_links("http://nowhere.com").is_empty());
    }

    #[test]
    fn test_index_snapshot_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.snap");
        let stop = stop_words();

        let mut index = Index::new();
        index.apply(&doc("http://a.com", &["rust"], &["http://b.com"]), &stop);
        index.save_snapshot(&path).unwrap();

        let loaded = Index::load_snapshot(&path).unwrap().unwrap();
        assert_eq!(loaded.search(&terms(&["rust"])).len(), 1);
        assert_eq!(loaded.sub_links("http://b.com"), vec!["http://a.com"]);
        assert!(Index::load_snapshot(dir.path().join("none.snap"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_query_stats_ordering() {
        let mut stats = QueryStats::new();
        for _ in 0..3 {
            stats.record(&terms(&["rust"]));
        }
        stats.record(&terms(&["search", "engine"]));

        let top = stats.top();
        assert_eq!(top[0].term, "rust");
        assert_eq!(top[0].count, 3);
        assert_eq!(top[1].term, "engine");
        assert_eq!(top[2].term, "search");
        assert_eq!(stats.count("missing"), 0);
    }
}
