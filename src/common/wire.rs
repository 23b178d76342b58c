//! Broadcast wire record
//!
//! One record per crawled page, five newline-separated fields in fixed order:
//!
//! ```text
//! URL: http://example.com
//! Title: Example Domain
//! Citation: This domain is for use in illustrative examples
//! Keywords: [example, domain, illustrative]
//! Links: [https://www.iana.org/domains/example]
//! ```
//!
//! A record must fit in one datagram (see [`MAX_RECORD_SIZE`]); larger records
//! are truncated by the publisher and usually fail to decode on the receiver.

use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};

/// Largest UDP payload over IPv4. Hard ceiling for one encoded record.
pub const MAX_RECORD_SIZE: usize = 65_507;

const FIELD_URL: &str = "URL: ";
const FIELD_TITLE: &str = "Title: ";
const FIELD_CITATION: &str = "Citation: ";
const FIELD_KEYWORDS: &str = "Keywords: ";
const FIELD_LINKS: &str = "Links: ";
const LIST_SEPARATOR: &str = ", ";

/// A crawled page as published by a download worker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub url: String,
    pub title: String,
    pub citation: String,
    pub keywords: Vec<String>,
    pub outlinks: Vec<String>,
}

impl Document {
    /// Encode as a wire record.
    pub fn encode(&self) -> String {
        format!(
            "{}{}\n{}{}\n{}{}\n{}{}\n{}{}",
            FIELD_URL,
            single_line(&self.url),
            FIELD_TITLE,
            single_line(&self.title),
            FIELD_CITATION,
            single_line(&self.citation),
            FIELD_KEYWORDS,
            encode_list(&self.keywords),
            FIELD_LINKS,
            encode_list(&self.outlinks),
        )
    }

    /// Decode a wire record. Anything other than exactly five fields is rejected.
    pub fn decode(record: &str) -> Result<Self> {
        let fields: Vec<&str> = record.trim_end_matches('\n').split('\n').collect();
        if fields.len() != 5 {
            return Err(Error::MalformedRecord(format!(
                "expected 5 fields, got {}",
                fields.len()
            )));
        }

        let url = field(fields[0], FIELD_URL)?.trim().to_string();
        if url.is_empty() {
            return Err(Error::MalformedRecord("empty URL field".into()));
        }

        Ok(Self {
            url,
            title: field(fields[1], FIELD_TITLE)?.to_string(),
            citation: field(fields[2], FIELD_CITATION)?.to_string(),
            keywords: decode_list(field(fields[3], FIELD_KEYWORDS)?)?,
            outlinks: decode_list(field(fields[4], FIELD_LINKS)?)?,
        })
    }
}

fn single_line(s: &str) -> String {
    s.split(['\n', '\r'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn encode_list(items: &[String]) -> String {
    let items: Vec<String> = items
        .iter()
        .map(|item| single_line(item))
        .filter(|item| !item.is_empty())
        .collect();
    format!("[{}]", items.join(LIST_SEPARATOR))
}

fn field<'a>(line: &'a str, prefix: &str) -> Result<&'a str> {
    line.strip_prefix(prefix)
        .or_else(|| line.strip_prefix(prefix.trim_end()))
        .ok_or_else(|| Error::MalformedRecord(format!("expected field '{}'", prefix.trim_end())))
}

fn decode_list(raw: &str) -> Result<Vec<String>> {
    let inner = raw
        .trim()
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| Error::MalformedRecord(format!("unbracketed list: {}", raw)))?;

    Ok(inner
        .split(LIST_SEPARATOR)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect())
}

/// Cut an encoded record down to the datagram ceiling, on a char boundary.
pub fn truncate_record(record: &[u8]) -> &[u8] {
    if record.len() <= MAX_RECORD_SIZE {
        return record;
    }
    let mut end = MAX_RECORD_SIZE;
    // Step back over UTF-8 continuation bytes
    while end > 0 && (record[end] & 0xC0) == 0x80 {
        end -= 1;
    }
    &record[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        Document {
            url: "http://example.com".into(),
            title: "Example Domain".into(),
            citation: "Illustrative examples".into(),
            keywords: vec!["example".into(), "domain".into()],
            outlinks: vec!["https://www.iana.org/domains/example".into()],
        }
    }

    #[test]
    fn test_encode_layout() {
        let record = sample().encode();
        let lines: Vec<&str> = record.lines().collect();
        assert_eq!(lines[0], "URL: http://example.com");
        assert_eq!(lines[1], "Title: Example Domain");
        assert_eq!(lines[2], "Citation: Illustrative examples");
        assert_eq!(lines[3], "Keywords: [example, domain]");
        assert_eq!(lines[4], "Links: [https://www.iana.org/domains/example]");
        assert_eq!(Document::decode(&record).unwrap(), sample());
    }

    #[test]
    fn test_multiline_title_stays_one_field() {
        let mut doc = sample();
        doc.title = "Line one\nLine two\r\n".into();
        doc.citation = String::new();
        doc.outlinks.clear();

        let decoded = Document::decode(&doc.encode()).unwrap();
        assert_eq!(decoded.title, "Line one Line two");
        assert_eq!(decoded.citation, "");
        assert!(decoded.outlinks.is_empty());
    }

    #[test]
    fn test_wrong_field_count_rejected() {
        let err = Document::decode("URL: http://a.com\nTitle: x").unwrap_err();
        assert!(matches!(err, Error::MalformedRecord(_)));

        let mut record = sample().encode();
        record.push_str("\nExtra: field");
        assert!(Document::decode(&record).is_err());
    }

    #[test]
    fn test_missing_prefix_rejected() {
        let record = "URL: http://a.com\nHeading: x\nCitation: y\nKeywords: []\nLinks: []";
        assert!(Document::decode(record).is_err());
    }

    #[test]
    fn test_truncate_record() {
        let small = b"URL: x";
        assert_eq!(truncate_record(small).len(), small.len());

        let big = "é".repeat(MAX_RECORD_SIZE);
        let cut = truncate_record(big.as_bytes());
        assert!(cut.len() <= MAX_RECORD_SIZE);
        assert!(std::str::from_utf8(cut).is_ok());
    }
}
