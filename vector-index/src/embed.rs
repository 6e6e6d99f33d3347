//! Embedding providers behind one enum (no trait objects).
//!
//! - [`EmbeddingClient::Remote`] calls the model endpoint through
//!   `llm-service`.
//! - [`EmbeddingClient::Hash`] is a deterministic feature-hashing
//!   projection: no credential, no network, stable across runs. Matches
//!   found through it are advisory; callers lower the confidence.
//!
//! The dimension is fixed per run; mixing is an error.

use llm_service::LlmService;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::errors::EmbedError;

/// Default dimension of the hash projection.
pub const HASH_DIM: usize = 256;

/// Enum-dispatch embedding client.
#[derive(Debug, Clone)]
pub enum EmbeddingClient {
    Remote(LlmService),
    Hash(HashEmbedder),
}

impl EmbeddingClient {
    /// Remote client when a service is configured, hash fallback otherwise.
    pub fn from_service(service: Option<LlmService>) -> Self {
        match service {
            Some(s) => Self::Remote(s),
            None => Self::Hash(HashEmbedder::new(HASH_DIM)),
        }
    }

    /// Embeds one text. Deterministic for a given input within a run.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        match self {
            Self::Remote(svc) => {
                let v = svc
                    .embed(text)
                    .await
                    .map_err(|e| EmbedError::Provider(e.to_string()))?;
                if v.len() != svc.embed_dim() {
                    return Err(EmbedError::DimMismatch {
                        got: v.len(),
                        want: svc.embed_dim(),
                    });
                }
                Ok(v)
            }
            Self::Hash(h) => Ok(h.embed(text)),
        }
    }

    /// Fixed dimension for this run.
    pub fn dim(&self) -> usize {
        match self {
            Self::Remote(svc) => svc.embed_dim(),
            Self::Hash(h) => h.dim,
        }
    }

    /// True for the local hash projection (advisory-quality vectors).
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Hash(_))
    }
}

/// Deterministic hash-projection embedder.
///
/// Tokenizes to lowercase identifier-ish words, hashes each token into a
/// signed bucket, and L2-normalizes the accumulated histogram.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    pub dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        debug!("hash embedder initialized, dim={dim}");
        Self { dim: dim.max(8) }
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dim];
        for token in tokenize(text) {
            let digest = Sha256::digest(token.as_bytes());
            let bucket =
                u64::from_le_bytes(digest[..8].try_into().expect("8 bytes")) as usize % self.dim;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        }
        l2_normalize(&mut v);
        v
    }
}

/// Lowercased identifier/number tokens of the input.
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
        .map(str::to_ascii_lowercase)
}

fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Cosine similarity in `[-1, 1]`; zero vectors yield 0.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na <= f32::EPSILON || nb <= f32::EPSILON {
        return 0.0;
    }
    (dot / (na * nb)).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_embedding_is_deterministic() {
        let h = HashEmbedder::new(64);
        let a = h.embed("public int total(int tax) { return subtotal(); }");
        let b = h.embed("public int total(int tax) { return subtotal(); }");
        assert_eq!(a, b);
        assert!((cosine(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn similar_text_scores_higher_than_unrelated() {
        let h = HashEmbedder::new(128);
        let base = h.embed("fn parse_config(path: &str) -> Config { read(path) }");
        let near = h.embed("fn parse_config(file: &str) -> Config { read(file) }");
        let far = h.embed("SELECT id FROM users WHERE name = ?");
        assert!(cosine(&base, &near) > cosine(&base, &far));
    }

    #[test]
    fn vectors_are_normalized() {
        let h = HashEmbedder::new(32);
        let v = h.embed("alpha beta gamma");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn cosine_handles_degenerate_inputs() {
        assert_eq!(cosine(&[], &[]), 0.0);
        assert_eq!(cosine(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine(&[0.0, 0.0], &[0.0, 0.0]), 0.0);
    }
}
