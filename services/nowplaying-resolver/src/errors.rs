//!
//! src/errors.rs
//!
//! Defines enums and methods of error conversion for the resolver.
//! `ResolverError` is request-fatal, `SearchFailure` is always absorbed
//! into an unmatched track by the reconciliation engine.
//!

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("config error: {0}")]
    Config(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("unexpected status {status} from {url}")]
    Status { url: String, status: u16 },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("cache error: {0}")]
    Cache(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error)
}

impl From<reqwest::Error> for ResolverError {
    fn from(e: reqwest::Error) -> Self { ResolverError::Http(e.to_string()) }
}

impl From<serde_json::Error> for ResolverError {
    fn from(e: serde_json::Error) -> Self { ResolverError::Parse(e.to_string()) }
}

/// Metadata database failures. Never surfaced past the engine.
#[derive(Error, Debug)]
pub enum SearchFailure {
    #[error("transport: {0}")]
    Transport(String),
    #[error("status {0}")]
    Status(u16),
    #[error("decode: {0}")]
    Decode(String)
}

impl From<ResolverError> for SearchFailure {
    fn from(e: ResolverError) -> Self {
        match e {
            ResolverError::Status { status, .. } => SearchFailure::Status(status),
            ResolverError::Parse(msg) => SearchFailure::Decode(msg),
            other => SearchFailure::Transport(other.to_string())
        }
    }
}

impl From<serde_json::Error> for SearchFailure {
    fn from(e: serde_json::Error) -> Self { SearchFailure::Decode(e.to_string()) }
}
