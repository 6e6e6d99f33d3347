//! Run configuration assembled from environment variables and CLI flags.

use std::path::PathBuf;
use std::time::Duration;

use llm_service::{LlmConfig, opt_env};

use crate::errors::{PipelineError, PipelineResult};

/// Default similarity threshold for duplicate detection.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.82;

/// Everything one review/index run needs to know.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Platform token; required for any remote call.
    pub platform_token: String,
    /// API base (public default or an Enterprise `…/api/v3`).
    pub platform_base: String,
    /// LLM connection; `None` runs the deterministic fallback path.
    pub llm: Option<LlmConfig>,
    /// Duplicate similarity threshold in `[0,1]`.
    pub similarity_threshold: f32,
    /// Vector store location.
    pub vector_store_path: PathBuf,
    /// Report JSON location.
    pub report_path: PathBuf,
    /// Post comments back to the platform after the run.
    pub post_comments: bool,
    /// Optional wall-clock budget for the whole run.
    pub run_deadline: Option<Duration>,
}

impl RunConfig {
    /// Reads the environment. `token_override` / `llm_key_override` come
    /// from the CLI (`--token`, `--llm-key`); `enterprise_base` from
    /// `--enterprise`.
    pub fn from_env(
        token_override: Option<String>,
        llm_key_override: Option<String>,
        enterprise_base: Option<String>,
    ) -> PipelineResult<Self> {
        let platform_token = token_override
            .or_else(|| opt_env("PLATFORM_TOKEN"))
            .ok_or_else(|| {
                PipelineError::Config("PLATFORM_TOKEN is required for remote calls".into())
            })?;

        let platform_base = enterprise_base
            .map(|host| normalize_enterprise_base(&host))
            .or_else(|| opt_env("PLATFORM_API_BASE"))
            .unwrap_or_else(|| platform_client::client::DEFAULT_API_BASE.to_string());

        let llm = match llm_key_override {
            Some(key) => Some(
                LlmConfig::with_key(key).map_err(|e| PipelineError::Config(e.to_string()))?,
            ),
            None => LlmConfig::from_env().map_err(|e| PipelineError::Config(e.to_string()))?,
        };

        let similarity_threshold = match opt_env("SIMILARITY_THRESHOLD") {
            Some(raw) => raw
                .parse::<f32>()
                .ok()
                .filter(|v| (0.0..=1.0).contains(v))
                .ok_or_else(|| {
                    PipelineError::Config(format!(
                        "SIMILARITY_THRESHOLD must be a number in [0,1], got {raw}"
                    ))
                })?,
            None => DEFAULT_SIMILARITY_THRESHOLD,
        };

        Ok(Self {
            platform_token,
            platform_base,
            llm,
            similarity_threshold,
            vector_store_path: opt_env("VECTOR_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./.code-embeddings.json")),
            report_path: opt_env("REPORT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./report.json")),
            post_comments: false,
            run_deadline: None,
        })
    }

    /// Offline config for local analysis and tests: no token, no LLM.
    pub fn offline() -> Self {
        Self {
            platform_token: String::new(),
            platform_base: platform_client::client::DEFAULT_API_BASE.to_string(),
            llm: None,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            vector_store_path: PathBuf::from("./.code-embeddings.json"),
            report_path: PathBuf::from("./report.json"),
            post_comments: false,
            run_deadline: None,
        }
    }
}

/// `acme.example.com` or a full URL → `https://acme.example.com/api/v3`.
fn normalize_enterprise_base(host: &str) -> String {
    let trimmed = host.trim_end_matches('/');
    let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    if with_scheme.ends_with("/api/v3") {
        with_scheme
    } else {
        format!("{with_scheme}/api/v3")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enterprise_base_normalization() {
        assert_eq!(
            normalize_enterprise_base("ghe.acme.com"),
            "https://ghe.acme.com/api/v3"
        );
        assert_eq!(
            normalize_enterprise_base("https://ghe.acme.com/api/v3"),
            "https://ghe.acme.com/api/v3"
        );
        assert_eq!(
            normalize_enterprise_base("http://ghe.acme.com/"),
            "http://ghe.acme.com/api/v3"
        );
    }
}
