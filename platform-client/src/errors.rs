//! Platform error hierarchy with retry classification.
//!
//! HTTP statuses map onto variants (401→Unauthorized, 429→RateLimited,
//! 5xx→Server, …); `resilience` uses the classification to decide whether a
//! call is retried. Auth errors are fatal for the whole run.

use resilience::{Classify, RetryClass};
use thiserror::Error;

/// Convenient alias for crate-wide results.
pub type PlatformResult<T> = Result<T, PlatformError>;

#[derive(Debug, Error)]
pub enum PlatformError {
    /// Unauthorized (HTTP 401): bad or missing token.
    #[error("unauthorized (check PLATFORM_TOKEN)")]
    Unauthorized,

    /// Forbidden (HTTP 403) that is not a rate limit.
    #[error("forbidden")]
    Forbidden,

    /// Not found (HTTP 404): missing repo, PR, path or ref.
    #[error("not found: {0}")]
    NotFound(String),

    /// Rate limited (HTTP 429, or 403 with exhausted quota headers).
    #[error("rate limited")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Server error (HTTP 5xx).
    #[error("server error: status {0}")]
    Server(u16),

    /// Other HTTP status not covered above.
    #[error("http status error: {0}")]
    HttpStatus(u16),

    /// Timeout at transport level.
    #[error("timeout")]
    Timeout,

    /// Network failure without a status (DNS/connect/reset).
    #[error("network error: {0}")]
    Network(String),

    /// JSON deserialization error.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Unexpected/invalid shape of a provider response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Configuration problems (missing token, bad base URL).
    #[error("config error: {0}")]
    Config(String),

    /// Retries were exhausted; wraps the final error's message.
    #[error("retries exhausted: {0}")]
    RetriesExhausted(String),

    /// The run's cancellation token fired mid-call.
    #[error("cancelled")]
    Cancelled,
}

impl PlatformError {
    /// True for errors that must terminate the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized | Self::Forbidden | Self::Config(_)
        )
    }
}

impl Classify for PlatformError {
    fn classify(&self) -> RetryClass {
        match self {
            Self::RateLimited { retry_after_secs } => RetryClass::RateLimited {
                retry_after_secs: *retry_after_secs,
            },
            Self::Timeout | Self::Network(_) | Self::Server(_) => RetryClass::Transient,
            _ => RetryClass::Fatal,
        }
    }
}

impl From<reqwest::Error> for PlatformError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return Self::Timeout;
        }
        if let Some(status) = e.status() {
            let code = status.as_u16();
            return match code {
                401 => Self::Unauthorized,
                403 => Self::Forbidden,
                404 => Self::NotFound(String::new()),
                429 => Self::RateLimited {
                    retry_after_secs: None,
                },
                500..=599 => Self::Server(code),
                _ => Self::HttpStatus(code),
            };
        }
        Self::Network(e.to_string())
    }
}

impl<E> From<resilience::RetryError<E>> for PlatformError
where
    E: Into<PlatformError> + std::fmt::Display + std::fmt::Debug,
{
    fn from(e: resilience::RetryError<E>) -> Self {
        match e {
            resilience::RetryError::Permanent(inner) => inner.into(),
            resilience::RetryError::Exhausted { last, attempts } => {
                Self::RetriesExhausted(format!("{last} (after {attempts} attempts)"))
            }
            resilience::RetryError::Cancelled => Self::Cancelled,
        }
    }
}
