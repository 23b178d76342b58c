//! Error types for googol

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Persistence Errors ===
    #[error("Corrupted data: {0}")]
    Corrupted(String),

    #[error("Checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("Serialization error: {0}")]
    Serialization(String),

    // === Input Errors ===
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    // === Registry Errors ===
    #[error("No replicas available")]
    NoReplicas,

    #[error("No crawl manager registered")]
    NoCrawlManager,

    #[error("A crawl manager is already registered")]
    CrawlManagerAlreadyRegistered,

    // === Network Errors ===
    #[error("Peer unavailable: {0}")]
    PeerUnavailable(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Broadcast channel closed")]
    ChannelClosed,

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Generic ===
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(String),
}

/// JSON body carried by every non-2xx response of the googol HTTP APIs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl Error {
    /// Did a remote peer fail to answer? Treated as a crash signal by the caller.
    pub fn is_peer_failure(&self) -> bool {
        matches!(self, Error::ConnectionFailed(_) | Error::PeerUnavailable(_))
    }

    /// Stable machine-readable code used on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidUrl(_) => "invalid_url",
            Error::InvalidArgument(_) => "invalid_argument",
            Error::NoReplicas => "no_replicas",
            Error::NoCrawlManager => "no_crawl_manager",
            Error::CrawlManagerAlreadyRegistered => "crawl_manager_registered",
            Error::PeerUnavailable(_) | Error::ConnectionFailed(_) => "peer_unavailable",
            Error::MalformedRecord(_) => "malformed_record",
            _ => "internal",
        }
    }

    /// Convert to HTTP status code
    pub fn to_http_status(&self) -> StatusCode {
        match self {
            Error::InvalidUrl(_) | Error::InvalidArgument(_) | Error::MalformedRecord(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::NoReplicas | Error::NoCrawlManager => StatusCode::SERVICE_UNAVAILABLE,
            Error::CrawlManagerAlreadyRegistered => StatusCode::CONFLICT,
            Error::PeerUnavailable(_) | Error::ConnectionFailed(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code().to_string(),
            message: self.to_string(),
        }
    }

    /// Rebuild an error received from a peer's error body.
    pub fn from_body(body: ErrorBody) -> Self {
        match body.code.as_str() {
            "invalid_url" => Error::InvalidUrl(
                body.message
                    .trim_start_matches("Invalid URL: ")
                    .to_string(),
            ),
            "invalid_argument" => Error::InvalidArgument(
                body.message
                    .trim_start_matches("Invalid argument: ")
                    .to_string(),
            ),
            "no_replicas" => Error::NoReplicas,
            "no_crawl_manager" => Error::NoCrawlManager,
            "crawl_manager_registered" => Error::CrawlManagerAlreadyRegistered,
            "peer_unavailable" => Error::PeerUnavailable(body.message),
            "malformed_record" => Error::MalformedRecord(body.message),
            _ => Error::Http(body.message),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        (self.to_http_status(), axum::Json(self.to_body())).into_response()
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_request() || e.is_timeout() {
            Error::ConnectionFailed(e.to_string())
        } else {
            Error::Http(e.to_string())
        }
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::InvalidConfig(e.to_string())
    }
}

// Implement From for common error types
impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Other(e.to_string())
    }
}
