//! Unified error type plus small env-var reading helpers.
//!
//! Error messages carry the `[llm-service]` suffix so bubbled-up failures
//! can be attributed to this crate in mixed logs.

use resilience::{Classify, RetryClass};
use thiserror::Error;

/// Convenient result alias for this crate.
pub type Result<T> = std::result::Result<T, LlmError>;

/// All failures the LLM service can produce.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Required environment variable is missing or empty.
    #[error("[llm-service] missing required environment variable: {0}")]
    MissingVar(&'static str),

    /// A numeric env var failed to parse.
    #[error("[llm-service] invalid number in {var}: {reason}")]
    InvalidNumber {
        var: &'static str,
        reason: &'static str,
    },

    /// Endpoint did not look like an HTTP(S) URL.
    #[error("[llm-service] invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Provider returned 401/403.
    #[error("[llm-service] unauthorized (check LLM_API_KEY)")]
    Unauthorized,

    /// Provider returned 429 or an explicit quota message.
    #[error("[llm-service] rate limited / quota exhausted")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Provider returned 5xx.
    #[error("[llm-service] server error: status {0}")]
    Server(u16),

    /// Any other non-success HTTP status. `snippet` is a clipped body excerpt.
    #[error("[llm-service] http status {status}: {snippet}")]
    HttpStatus { status: u16, snippet: String },

    /// Transport-level timeout.
    #[error("[llm-service] request timed out")]
    Timeout,

    /// Network failure without an HTTP status (DNS, connect, reset).
    #[error("[llm-service] network error: {0}")]
    Network(String),

    /// Response body did not match the expected shape.
    #[error("[llm-service] decode error: {0}")]
    Decode(String),

    /// The model returned no choices / no embedding data.
    #[error("[llm-service] provider returned an empty result")]
    EmptyResult,
}

impl LlmError {
    /// True when the provider is out of quota; the pipeline switches to the
    /// fallback generator for the rest of the run on this.
    pub fn is_quota_exhausted(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

impl Classify for LlmError {
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

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return Self::Timeout;
        }
        if let Some(status) = e.status() {
            let code = status.as_u16();
            return match code {
                401 | 403 => Self::Unauthorized,
                429 => Self::RateLimited {
                    retry_after_secs: None,
                },
                500..=599 => Self::Server(code),
                _ => Self::HttpStatus {
                    status: code,
                    snippet: String::new(),
                },
            };
        }
        Self::Network(e.to_string())
    }
}

/* ------------------------ Env helpers ------------------------ */

/// Fetches a required, non-empty environment variable.
pub fn must_env(name: &'static str) -> Result<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(LlmError::MissingVar(name)),
    }
}

/// Fetches an optional env var (`None` if unset or empty).
pub fn opt_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Parses an optional `u64` from env.
pub fn opt_env_u64(name: &'static str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => {
            v.parse::<u64>()
                .map(Some)
                .map_err(|_| LlmError::InvalidNumber {
                    var: name,
                    reason: "expected u64",
                })
        }
        _ => Ok(None),
    }
}

/// Clips a response body to a log-friendly snippet.
pub fn make_snippet(body: &str) -> String {
    const MAX: usize = 300;
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX {
        return trimmed.to_string();
    }
    trimmed.chars().take(MAX).collect::<String>() + "…"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_detection_only_for_rate_limit() {
        assert!(
            LlmError::RateLimited {
                retry_after_secs: None
            }
            .is_quota_exhausted()
        );
        assert!(!LlmError::Timeout.is_quota_exhausted());
    }

    #[test]
    fn classification_maps_statuses() {
        assert_eq!(
            LlmError::Server(502).classify(),
            resilience::RetryClass::Transient
        );
        assert_eq!(
            LlmError::Unauthorized.classify(),
            resilience::RetryClass::Fatal
        );
        assert_eq!(
            LlmError::RateLimited {
                retry_after_secs: Some(9)
            }
            .classify(),
            resilience::RetryClass::RateLimited {
                retry_after_secs: Some(9)
            }
        );
    }

    #[test]
    fn snippet_is_clipped() {
        let long = "x".repeat(1000);
        let s = make_snippet(&long);
        assert!(s.chars().count() <= 301);
        assert!(s.ends_with('…'));
    }
}
