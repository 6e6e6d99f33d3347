//! Environment-driven configuration for the LLM service.

use std::time::Duration;

use crate::error::{LlmError, Result, opt_env, opt_env_u64};

/// Default delay between sequential review calls; sized for free-tier quotas.
pub const DEFAULT_INTER_REQUEST_DELAY_MS: u64 = 35_000;

/// Complete configuration for one provider connection.
///
/// One config drives both chat completions and embeddings; the two model
/// names may differ (`embed_model` defaults to a small embedding model).
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// API base, e.g. "https://api.openai.com". Paths are derived from it.
    pub endpoint: String,
    /// Bearer token. The pipeline runs its fallback path when absent.
    pub api_key: String,
    /// Chat model used for review, merge and summary calls.
    pub model: String,
    /// Embedding model.
    pub embed_model: String,
    /// Expected embedding dimension; mixed dimensions are rejected upstream.
    pub embed_dim: usize,
    /// Sampling temperature, if the caller wants to pin one.
    pub temperature: Option<f32>,
    /// Completion token cap.
    pub max_tokens: Option<u32>,
    /// Per-request wall-clock budget.
    pub timeout: Duration,
    /// Mandatory pause between sequential review requests.
    pub inter_request_delay: Duration,
}

impl LlmConfig {
    /// Builds a config from the environment.
    ///
    /// Returns `Ok(None)` when `LLM_API_KEY` is unset, the documented
    /// signal that the run should use deterministic fallbacks only.
    pub fn from_env() -> Result<Option<Self>> {
        match opt_env("LLM_API_KEY") {
            Some(key) => Self::with_key(key).map(Some),
            None => Ok(None),
        }
    }

    /// Builds a config with an explicit key (CLI `--llm-key` override),
    /// taking every other knob from the environment or its default.
    pub fn with_key(api_key: String) -> Result<Self> {
        let endpoint =
            opt_env("LLM_ENDPOINT").unwrap_or_else(|| "https://api.openai.com".to_string());
        validate_endpoint(&endpoint)?;

        let delay_ms =
            opt_env_u64("LLM_INTER_REQUEST_DELAY_MS")?.unwrap_or(DEFAULT_INTER_REQUEST_DELAY_MS);
        let timeout_secs = opt_env_u64("LLM_TIMEOUT_SECS")?.unwrap_or(120);
        let embed_dim = opt_env_u64("LLM_EMBED_DIM")?.unwrap_or(1536) as usize;

        Ok(Self {
            endpoint,
            api_key,
            model: opt_env("LLM_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            embed_model: opt_env("LLM_EMBED_MODEL")
                .unwrap_or_else(|| "text-embedding-3-small".to_string()),
            embed_dim,
            temperature: Some(0.1),
            max_tokens: None,
            timeout: Duration::from_secs(timeout_secs),
            inter_request_delay: Duration::from_millis(delay_ms),
        })
    }
}

fn validate_endpoint(endpoint: &str) -> Result<()> {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        Ok(())
    } else {
        Err(LlmError::InvalidEndpoint(endpoint.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_must_be_http() {
        assert!(validate_endpoint("https://api.openai.com").is_ok());
        assert!(validate_endpoint("ftp://nope").is_err());
        assert!(validate_endpoint("").is_err());
    }
}
