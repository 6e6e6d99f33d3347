//! File-based cache for large PR bundles (JSON on disk).
//!
//! Why cache?
//! - Large PRs burn platform API quota and take time to parse.
//! - Re-running the pipeline on the same `head_sha` should be O(1).
//!
//! Key (stable across re-runs): SHA256("github:{repo}:{pr}:{head_sha}")
//! Layout: $PR_REVIEWER_CACHE_DIR/<repo_sanitized>/<pr>-<hash12>.json
//! Default cache dir: "code_data/pr_cache".

use std::path::{Path, PathBuf};

use platform_client::{PrBundle, PrId};
use sha2::{Digest, Sha256};
use tokio::fs;

use crate::errors::PipelineResult;

/// Returns the root directory for the cache (env-overridable).
fn cache_root() -> PathBuf {
    std::env::var("PR_REVIEWER_CACHE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("code_data/pr_cache"))
}

/// Filesystem-safe replacement for the repo slug.
fn sanitize(s: &str) -> String {
    s.replace('/', "_")
}

/// Computes the deterministic cache path for a bundle.
fn key_path(id: &PrId, head_sha: &str) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(format!("github:{}:{}:{}", id.repo, id.number, head_sha));
    let digest = format!("{:x}", hasher.finalize());
    cache_root()
        .join(sanitize(&id.repo))
        .join(format!("{}-{}.json", id.number, &digest[..12]))
}

/// Loads a bundle from the cache if present.
pub async fn load_bundle(id: &PrId, head_sha: &str) -> PipelineResult<Option<PrBundle>> {
    let path = key_path(id, head_sha);
    if !Path::new(&path).exists() {
        return Ok(None);
    }
    let data = fs::read(&path).await?;
    let bundle: PrBundle = serde_json::from_slice(&data)?;
    Ok(Some(bundle))
}

/// Stores a bundle if it is considered "large".
///
/// Heuristics:
/// - many files (> 200)
/// - huge raw patch bytes (> 5 MiB)
/// - the platform flagged truncation
pub async fn maybe_store_bundle(
    id: &PrId,
    head_sha: &str,
    bundle: &PrBundle,
) -> PipelineResult<()> {
    let files = bundle.changes.files.len();
    let bytes: usize = bundle
        .changes
        .files
        .iter()
        .filter_map(|f| f.patch.as_ref())
        .map(|p| p.len())
        .sum();
    let is_large = files > 200 || bytes > 5 * 1024 * 1024 || bundle.changes.is_truncated;
    if !is_large {
        return Ok(());
    }

    let path = key_path(id, head_sha);
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).await?;
    }
    let json = serde_json::to_vec(bundle)?;
    fs::write(path, json).await?;
    Ok(())
}
