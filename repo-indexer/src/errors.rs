//! Indexer error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error(transparent)]
    Platform(#[from] platform_client::PlatformError),

    #[error(transparent)]
    Store(#[from] vector_index::StoreError),

    #[error("indexing cancelled")]
    Cancelled,
}
