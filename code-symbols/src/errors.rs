//! Error hierarchy for symbol extraction.

use thiserror::Error;

/// Convenient alias for crate-wide results.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The file extension maps to no supported language.
    #[error("unsupported language for path: {0}")]
    UnsupportedLanguage(String),

    /// Tree-sitter rejected the grammar (version mismatch etc.).
    #[error("grammar error: {0}")]
    Grammar(String),

    /// The parser produced no usable tree.
    #[error("parse failed for {0}")]
    ParseFailed(String),

    /// Invalid internal state (bug guard).
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
}
