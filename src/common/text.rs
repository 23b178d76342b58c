//! Text normalization shared by the download workers and the barrels
//!
//! Page text and query text go through the same pipeline so that a query term
//! matches the keyword the worker extracted: whitespace split, ASCII
//! punctuation removed, stop words dropped, then accents stripped and the
//! result lower-cased.

use std::collections::HashSet;
use std::path::Path;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Decompose, drop combining marks, lower-case.
pub fn normalize_word(word: &str) -> String {
    word.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

/// Remove ASCII punctuation characters.
pub fn strip_punctuation(word: &str) -> String {
    word.chars().filter(|c| !c.is_ascii_punctuation()).collect()
}

/// Stop-word list, compared after normalization.
#[derive(Debug, Clone, Default)]
pub struct StopWords {
    words: HashSet<String>,
}

impl StopWords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from an iterator of words (normalized on insertion).
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = words
            .into_iter()
            .map(|w| normalize_word(w.as_ref().trim()))
            .filter(|w| !w.is_empty())
            .collect();
        Self { words }
    }

    /// Load a newline-separated stop-word file.
    pub fn load(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::InvalidConfig(format!(
                "cannot read stop words from {}: {}",
                path.display(),
                e
            ))
        })?;
        let stop_words = Self::from_words(content.lines());
        tracing::debug!(
            "Loaded {} stop words from {}",
            stop_words.len(),
            path.display()
        );
        Ok(stop_words)
    }

    pub fn is_stop_word(&self, word: &str) -> bool {
        self.words.contains(&normalize_word(word))
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Split text into normalized, stop-word-free terms, keeping order and duplicates.
pub fn tokenize(text: &str, stop_words: &StopWords) -> Vec<String> {
    text.split_whitespace()
        .map(strip_punctuation)
        .filter(|word| !word.is_empty() && !stop_words.is_stop_word(word))
        .map(|word| normalize_word(&word))
        .filter(|word| !word.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_accents() {
        assert_eq!(normalize_word("Ação"), "acao");
        assert_eq!(normalize_word("CAFÉ"), "cafe");
        assert_eq!(normalize_word("naïve"), "naive");
        assert_eq!(normalize_word("plain"), "plain");
    }

    #[test]
    fn test_strip_punctuation() {
        assert_eq!(strip_punctuation("hello,"), "hello");
        assert_eq!(strip_punctuation("(don't)"), "dont");
        assert_eq!(strip_punctuation("..."), "");
        assert_eq!(strip_punctuation("açaí!"), "açaí");
    }

    #[test]
    fn test_stop_words_compare_normalized() {
        let stop = StopWords::from_words(["the", "É", "  ", "não"]);
        assert_eq!(stop.len(), 3);
        assert!(stop.is_stop_word("The"));
        assert!(stop.is_stop_word("e"));
        assert!(stop.is_stop_word("NAO"));
        assert!(!stop.is_stop_word("rust"));
    }

    #[test]
    fn test_tokenize() {
        let stop = StopWords::from_words(["the", "of", "a"]);
        let tokens = tokenize("The History of Açores, a  Rust-y tale!  the", &stop);
        assert_eq!(tokens, vec!["history", "acores", "rusty", "tale"]);
    }

    #[test]
    fn test_tokenize_only_stop_words() {
        let stop = StopWords::from_words(["the", "and"]);
        assert!(tokenize("The and THE ,,, ", &stop).is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let result = StopWords::load("/nonexistent/stop_words.txt");
        assert!(matches!(result, Err(crate::Error::InvalidConfig(_))));
    }
}
