//! Error taxonomy for the vector store, the language-model boundary, and
//! retrieval-augmented search.
//!
//! Library code returns these typed errors so callers can tell a missing
//! index (recoverable: build one) from a corrupted one or a model change.
//! The CLI wraps them in `anyhow` for reporting.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no index found at {0} (run `docsage build` first)")]
    NotFound(PathBuf),

    #[error("index at {path} is corrupt: {reason}")]
    Corruption { path: PathBuf, reason: String },

    #[error(
        "index was built with embedding model '{stored}' ({stored_dims} dims) but the configured model is '{configured}' ({configured_dims} dims); rebuild the index"
    )]
    VersionMismatch {
        stored: String,
        stored_dims: usize,
        configured: String,
        configured_dims: usize,
    },

    #[error("index build failed: {0}")]
    Build(String),

    #[error("vector store is not initialized; build or load it first")]
    NotInitialized,

    #[error("top_k must be >= 1 (got {0})")]
    InvalidTopK(usize),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} API error {status}: {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("{0} environment variable not set")]
    MissingApiKey(String),

    #[error("malformed response from {provider}: {reason}")]
    MalformedResponse {
        provider: &'static str,
        reason: String,
    },

    #[error("empty response from {provider}")]
    EmptyResponse { provider: &'static str },

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("query must not be empty")]
    InvalidQuery,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("language model call failed: {0}")]
    Llm(#[from] LlmError),
}
