//! Thin LLM client crate: one OpenAI-compatible service handling both text
//! completion (review calls, summaries, merges) and embeddings.
//!
//! The service is constructed from [`LlmConfig`], usually via
//! [`LlmConfig::from_env`]. When no API key is present the caller is
//! expected to run its fallback path; this crate never fabricates output.

pub mod config;
pub mod error;
pub mod service;

pub use config::LlmConfig;
pub use error::{LlmError, must_env, opt_env, opt_env_u64};
pub use service::LlmService;
