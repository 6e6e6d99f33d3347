//! Crate-wide error hierarchy for the review pipeline.
//!
//! Only *fatal* conditions surface as `Err` from the orchestrator: missing
//! credentials, a PR that cannot be fetched, an unwritable report path.
//! Everything else is downgraded to a diagnostic on the report.

use thiserror::Error;

/// Convenient alias for crate-wide results.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Platform failure during a fatal phase (fetch, auth).
    #[error(transparent)]
    Platform(#[from] platform_client::PlatformError),

    /// Report or summary file could not be written.
    #[error("report io error: {0}")]
    ReportIo(#[from] std::io::Error),

    /// Report serialization failure.
    #[error("report serde error: {0}")]
    ReportSerde(#[from] serde_json::Error),

    /// Configuration problems (bad env values, missing token).
    #[error("config error: {0}")]
    Config(String),

    /// Input validation (bad repo slug, unsupported combination).
    #[error("validation error: {0}")]
    Validation(String),

    /// The run was cancelled before the report could be assembled.
    #[error("run cancelled")]
    Cancelled,
}
