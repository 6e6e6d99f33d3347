//! OpenAI-compatible service for chat completions and embeddings.
//!
//! Non-streaming client around the REST API:
//! - POST {endpoint}/v1/chat/completions — review / merge / summary calls
//! - POST {endpoint}/v1/embeddings       — embedding retrieval
//!
//! Errors are normalized into [`LlmError`]; retry scheduling is the caller's
//! job (through `resilience::retry`), which is why every method performs
//! exactly one HTTP request.

use std::time::Instant;

use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::LlmConfig;
use crate::error::{LlmError, Result, make_snippet};

/// Thin client over one provider connection.
#[derive(Debug, Clone)]
pub struct LlmService {
    client: reqwest::Client,
    cfg: LlmConfig,
    url_chat: String,
    url_embeddings: String,
}

impl LlmService {
    /// Creates a service from the given config.
    ///
    /// # Errors
    /// - [`LlmError::InvalidEndpoint`] when the endpoint scheme is wrong
    /// - [`LlmError::Network`] when the HTTP client cannot be built
    pub fn new(cfg: LlmConfig) -> Result<Self> {
        let endpoint = cfg.endpoint.trim();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(LlmError::InvalidEndpoint(cfg.endpoint.clone()));
        }

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", cfg.api_key))
                .map_err(|e| LlmError::Decode(format!("invalid API key header: {e}")))?,
        );
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| LlmError::Network(e.to_string()))?;

        let base = endpoint.trim_end_matches('/').to_string();
        let url_chat = format!("{base}/v1/chat/completions");
        let url_embeddings = format!("{base}/v1/embeddings");

        info!(
            model = %cfg.model,
            embed_model = %cfg.embed_model,
            endpoint = %cfg.endpoint,
            "LlmService initialized"
        );

        Ok(Self {
            client,
            cfg,
            url_chat,
            url_embeddings,
        })
    }

    /// Configured embedding dimension.
    pub fn embed_dim(&self) -> usize {
        self.cfg.embed_dim
    }

    /// Mandatory pause between sequential review calls.
    pub fn inter_request_delay(&self) -> std::time::Duration {
        self.cfg.inter_request_delay
    }

    /// Performs one non-streaming chat completion.
    pub async fn generate(&self, prompt: &str, system: Option<&str>) -> Result<String> {
        let started = Instant::now();
        let body = ChatCompletionRequest::from_cfg(&self.cfg, prompt, system);

        debug!(
            model = %self.cfg.model,
            prompt_len = prompt.len(),
            has_system = system.is_some(),
            "POST {}", self.url_chat
        );

        let resp = self.client.post(&self.url_chat).json(&body).send().await?;
        let resp = check_status(resp, &self.url_chat).await?;

        let out: ChatCompletionResponse = resp.json().await.map_err(|e| {
            error!(error = %e, "failed to decode chat completion response");
            LlmError::Decode(format!(
                "serde error: {e}; expected `choices[0].message.content`"
            ))
        })?;

        let content = out
            .choices
            .into_iter()
            .find_map(|c| c.message.content)
            .ok_or(LlmError::EmptyResult)?;

        info!(
            model = %self.cfg.model,
            latency_ms = started.elapsed().as_millis(),
            "chat completion completed"
        );

        Ok(content)
    }

    /// Retrieves one embedding vector.
    ///
    /// The vector length is checked against the configured dimension so a
    /// misconfigured model fails loudly instead of poisoning the store.
    pub async fn embed(&self, input: &str) -> Result<Vec<f32>> {
        let started = Instant::now();
        let body = EmbeddingsRequest {
            model: &self.cfg.embed_model,
            input,
        };

        debug!(
            model = %self.cfg.embed_model,
            input_len = input.len(),
            "POST {}", self.url_embeddings
        );

        let resp = self
            .client
            .post(&self.url_embeddings)
            .json(&body)
            .send()
            .await?;
        let resp = check_status(resp, &self.url_embeddings).await?;

        let out: EmbeddingsResponse = resp.json().await.map_err(|e| {
            error!(error = %e, "failed to decode embeddings response");
            LlmError::Decode(format!("serde error: {e}; expected `data[0].embedding`"))
        })?;

        let first = out.data.into_iter().next().ok_or(LlmError::EmptyResult)?;
        if first.embedding.len() != self.cfg.embed_dim {
            return Err(LlmError::Decode(format!(
                "embedding dimension {} does not match configured {}",
                first.embedding.len(),
                self.cfg.embed_dim
            )));
        }

        debug!(
            latency_ms = started.elapsed().as_millis(),
            dim = first.embedding.len(),
            "embedding completed"
        );

        Ok(first.embedding)
    }
}

/// Maps a non-success response to the right [`LlmError`] variant, keeping a
/// body snippet and any `Retry-After` hint.
async fn check_status(resp: reqwest::Response, url: &str) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let retry_after = resp
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    let text = resp.text().await.unwrap_or_default();
    let snippet = make_snippet(&text);
    error!(%status, %url, %snippet, "LLM endpoint returned non-success status");

    Err(match status.as_u16() {
        401 | 403 => LlmError::Unauthorized,
        429 => LlmError::RateLimited {
            retry_after_secs: retry_after,
        },
        code @ 500..=599 => LlmError::Server(code),
        code => LlmError::HttpStatus {
            status: code,
            snippet,
        },
    })
}

/* ===========================================================================
HTTP payloads
======================================================================== */

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

impl<'a> ChatCompletionRequest<'a> {
    fn from_cfg(cfg: &'a LlmConfig, prompt: &'a str, system: Option<&'a str>) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(sys) = system {
            messages.push(ChatMessage {
                role: "system",
                content: sys,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        Self {
            model: &cfg.model,
            messages,
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageOut,
}

#[derive(Debug, Deserialize)]
struct ChatMessageOut {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}
