//! Page download and HTML extraction

use crate::common::{tokenize, Document, Error, Result, StopWords};
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Source of raw page HTML.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Fetches pages over HTTP(S). No timeout, no retry.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let fail = |reason: String| Error::Fetch {
            url: url.to_string(),
            reason,
        };
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;
        let resp = resp.error_for_status().map_err(|e| fail(e.to_string()))?;
        resp.text().await.map_err(|e| fail(e.to_string()))
    }
}

/// Extract title, description, absolute outbound links and keywords.
///
/// Links are resolved against `url`; anything that does not resolve to an
/// http(s) URL is dropped, as are fragments. Keywords are the page's visible
/// text run through [`tokenize`], first occurrence of each term kept.
pub fn parse_page(url: &str, html: &str, stop_words: &StopWords) -> Result<Document> {
    let base = Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{}: {}", url, e)))?;
    let document = Html::parse_document(html);

    let title = document
        .select(&selector("title")?)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .unwrap_or_default();

    let citation = document
        .select(&selector("meta[name=description]")?)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(collapse_whitespace)
        .unwrap_or_default();

    let mut outlinks = Vec::new();
    let mut seen_links = HashSet::new();
    for el in document.select(&selector("a[href]")?) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        let Ok(mut link) = base.join(href.trim()) else {
            continue;
        };
        if !matches!(link.scheme(), "http" | "https") {
            continue;
        }
        link.set_fragment(None);
        let link = link.to_string();
        if seen_links.insert(link.clone()) {
            outlinks.push(link);
        }
    }

    let mut seen_terms = HashSet::new();
    let keywords = tokenize(&visible_text(&document), stop_words)
        .into_iter()
        .filter(|term| seen_terms.insert(term.clone()))
        .collect();

    Ok(Document {
        url: url.to_string(),
        title,
        citation,
        keywords,
        outlinks,
    })
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::Internal(format!("invalid selector {}: {:?}", css, e)))
}

/// All text nodes outside script/style, space separated.
fn visible_text(document: &Html) -> String {
    let mut text = String::new();
    for node in document.root_element().descendants() {
        let Some(chunk) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor.value().as_element().is_some_and(|el| {
                matches!(el.name(), "script" | "style" | "noscript" | "template")
            })
        });
        if !hidden {
            text.push_str(chunk);
            text.push(' ');
        }
    }
    text
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <title>  Rust   Search </title>
    <meta name="description" content="A crawler written
      in Rust">
    <style>.hidden { color: red }</style>
  </head>
  <body>
    <h1>The Rust crawler</h1>
    <p>Crawling the web, café style. Crawling again!</p>
    <a href="/docs#intro">Docs</a>
    <a href="https://other.org/page">Other</a>
    <a href="/docs">Docs again</a>
    <a href="mailto:someone@example.com">Mail</a>
    <script>var hidden = "secretword";</script>
  </body>
</html>"#;

    fn stop_words() -> StopWords {
        StopWords::from_words(["the", "a", "in"])
    }

    #[test]
    fn test_extracts_page_fields() {
        let doc = parse_page("http://example.com/index.html", PAGE, &stop_words()).unwrap();

        assert_eq!(doc.url, "http://example.com/index.html");
        assert_eq!(doc.title, "Rust Search");
        assert_eq!(doc.citation, "A crawler written in Rust");
        assert_eq!(
            doc.outlinks,
            vec!["http://example.com/docs", "https://other.org/page"]
        );
    }

    #[test]
    fn test_keywords_normalized_and_unique() {
        let doc = parse_page("http://example.com/", PAGE, &stop_words()).unwrap();

        assert!(doc.keywords.contains(&"rust".to_string()));
        assert!(doc.keywords.contains(&"cafe".to_string()));
        assert!(doc.keywords.contains(&"crawling".to_string()));
        assert!(!doc.keywords.contains(&"the".to_string()));
        assert!(!doc.keywords.contains(&"secretword".to_string()));
        assert!(!doc.keywords.iter().any(|k| k.contains("hidden")));

        let unique: HashSet<&String> = doc.keywords.iter().collect();
        assert_eq!(unique.len(), doc.keywords.len());
    }

    #[test]
    fn test_page_without_metadata() {
        let doc = parse_page("http://example.com/", "<p>just text</p>", &stop_words()).unwrap();
        assert_eq!(doc.title, "");
        assert_eq!(doc.citation, "");
        assert!(doc.outlinks.is_empty());
        assert_eq!(doc.keywords, vec!["just", "text"]);
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            parse_page("not a url", PAGE, &stop_words()),
            Err(Error::InvalidUrl(_))
        ));
    }
}
