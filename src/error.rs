//! Crate-wide error type.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("gRPC error: {0}")]
    Grpc(String),

    #[error("stream ended")]
    StreamEnded,

    #[error("format error: {0}")]
    Format(String),

    /// An instruction referenced an account position the transaction does not resolve.
    /// For v0 transactions this usually means the lookup-table addresses were not loaded.
    #[error("account index {index} out of range ({len} resolved accounts)")]
    AccountIndexOutOfRange { index: usize, len: usize },

    #[error("decode error: {0}")]
    Decode(String),

    /// Transport-level failure: the request never got a response.
    #[error("network error: {0}")]
    Network(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("sink error: {0}")]
    Sink(String),
}

impl IndexerError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            IndexerError::Network(_) | IndexerError::Timeout(_) => true,
            IndexerError::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, IndexerError>;
