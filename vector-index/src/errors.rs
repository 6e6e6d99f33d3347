//! Error types for embedding and store operations.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbedError {
    /// Vector length differs from the dimension fixed for this run.
    #[error("vector size mismatch: got {got}, want {want}")]
    DimMismatch { got: usize, want: usize },

    /// Remote provider failure (already normalized to a message).
    #[error("embedding provider error: {0}")]
    Provider(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Another writer holds the store lock.
    #[error("store is locked by another writer: {0}")]
    Locked(String),

    /// Record dimension differs from what the store already holds.
    #[error("mixed vector dimensions: record {got}, store {want}")]
    DimMismatch { got: usize, want: usize },
}
