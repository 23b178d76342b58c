//! Utility functions for googol

use url::Url;

/// Is `s` a well-formed absolute http(s) URL with a host?
pub fn is_valid_url(s: &str) -> bool {
    match Url::parse(s.trim()) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.has_host(),
        Err(_) => false,
    }
}

/// Validate a URL, returning it trimmed or `Error::InvalidUrl`.
pub fn validate_url(s: &str) -> crate::Result<String> {
    if is_valid_url(s) {
        Ok(s.trim().to_string())
    } else {
        Err(crate::Error::InvalidUrl(s.to_string()))
    }
}

/// Strip any trailing slash from a peer base URL so paths can be appended.
pub fn base_url(address: &str) -> String {
    address.trim().trim_end_matches('/').to_string()
}

/// Compute CRC32 checksum
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_validation() {
        assert!(is_valid_url("http://example.com"));
        assert!(is_valid_url("https://example.com/a/b?c=d"));
        assert!(is_valid_url("  http://example.com/  "));
        assert!(!is_valid_url("example.com"));
        assert!(!is_valid_url("http//example.com"));
        assert!(!is_valid_url("mailto:someone@example.com"));
        assert!(!is_valid_url(""));
    }

    #[test]
    fn test_validate_url_error() {
        assert_eq!(
            validate_url(" http://example.com ").unwrap(),
            "http://example.com"
        );
        assert!(matches!(
            validate_url("not a url"),
            Err(crate::Error::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_base_url() {
        assert_eq!(base_url("http://127.0.0.1:8000/"), "http://127.0.0.1:8000");
        assert_eq!(base_url("http://host:1"), "http://host:1");
    }

    #[test]
    fn test_crc32() {
        let data = b"hello world";
        let crc = crc32(data);
        assert_eq!(crc, crc32(data));
        assert_ne!(crc, crc32(b"hello worle"));
    }
}
