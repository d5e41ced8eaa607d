use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type SourceResult<T> = Result<T, SourceError>;

/// Failure of a single upstream lookup. Never surfaced by `Resolve`; the
/// resolver logs it and moves on to the next state.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request to {endpoint} timed out")]
    Timeout { endpoint: &'static str },
    #[error("{endpoint} responded with HTTP {status}")]
    Status { endpoint: &'static str, status: u16 },
    #[error("request to {endpoint} failed: {message}")]
    Transport {
        endpoint: &'static str,
        message: String,
    },
    #[error("could not decode {endpoint} response: {message}")]
    Decode {
        endpoint: &'static str,
        message: String,
    },
    #[error("no API key configured for {platform}")]
    MissingApiKey { platform: &'static str },
    #[error("{endpoint} returned no usable duration")]
    NoDuration { endpoint: &'static str },
    #[error("video {id} not found")]
    NotFound { id: String },
}

impl SourceError {
    pub fn from_reqwest(endpoint: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout { endpoint }
        } else if err.is_decode() {
            SourceError::Decode {
                endpoint,
                message: err.to_string(),
            }
        } else if let Some(status) = err.status() {
            SourceError::Status {
                endpoint,
                status: status.as_u16(),
            }
        } else {
            SourceError::Transport {
                endpoint,
                message: err.to_string(),
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache store unavailable: {0}")]
    Unavailable(String),
    #[error("cache value for {key} is malformed: {message}")]
    Malformed { key: String, message: String },
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to access catalog {path}: {source}")]
    Io { source: io::Error, path: PathBuf },
    #[error("failed to parse catalog {path}: {source}")]
    Parse {
        source: serde_json::Error,
        path: PathBuf,
    },
    #[error("catalog item {0} not found")]
    UnknownItem(i64),
    #[error("catalog write rejected for item {id}: {message}")]
    Rejected { id: i64, message: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io { source: io::Error, path: PathBuf },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        source: toml::de::Error,
        path: PathBuf,
    },
}
