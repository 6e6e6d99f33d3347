//! Codebase indexer: `(repo, branch)` → symbols → embeddings → store.
//!
//! Flow:
//! 1. list the branch tree through the platform client,
//! 2. keep files with a supported language extension (size-capped),
//! 3. fetch contents with bounded concurrency (the platform tolerates it),
//! 4. extract symbols per file,
//! 5. embed symbol bodies (bounded concurrency as well),
//! 6. clear the scope and upsert; re-indexing the same scope replaces
//!    prior entries, which makes the operation idempotent.
//!
//! Batch progress is shown with a progress bar and mirrored into logs.

pub mod errors;

pub use errors::IndexError;

use code_symbols::{Language, Symbol, parse_source};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use platform_client::GitHubClient;
use resilience::CancellationToken;
use tracing::{debug, info, warn};
use vector_index::{EmbeddingClient, EmbeddingRecord, VectorStore};

/// Tuning knobs for one indexing run.
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Parallel content fetches / embedding calls.
    pub concurrency: usize,
    /// Files larger than this are skipped (bytes, when the tree reports a size).
    pub max_file_bytes: u64,
    /// Snippet clamp for stored bodies.
    pub snippet_max_chars: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            max_file_bytes: 512 * 1024,
            snippet_max_chars: 4_000,
        }
    }
}

/// Outcome counters of one indexing run.
#[derive(Debug, Clone, Default)]
pub struct IndexSummary {
    pub files_seen: usize,
    pub files_indexed: usize,
    pub files_skipped: usize,
    pub symbols_indexed: usize,
}

/// Indexes one branch into the vector store.
///
/// Per-file fetch or parse failures are logged and skipped; only
/// tree-listing and store failures abort.
pub async fn index_branch(
    client: &GitHubClient,
    repo: &str,
    branch: &str,
    embedder: &EmbeddingClient,
    store: &mut VectorStore,
    cancel: &CancellationToken,
    opts: &IndexOptions,
) -> Result<IndexSummary, IndexError> {
    info!("indexing {repo}@{branch} into {}", store.path().display());

    let tree = client.get_tree(repo, branch).await?;
    let mut summary = IndexSummary {
        files_seen: tree.len(),
        ..Default::default()
    };

    let candidates: Vec<_> = tree
        .into_iter()
        .filter(|e| Language::supports_path(&e.path))
        .filter(|e| match e.size {
            Some(s) if s > opts.max_file_bytes => {
                debug!("skipping oversized file {} ({} bytes)", e.path, s);
                false
            }
            _ => true,
        })
        .collect();

    info!(
        "{} of {} tree entries are indexable source files",
        candidates.len(),
        summary.files_seen
    );

    let bar = ProgressBar::new(candidates.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{prefix} [{bar:30}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.set_prefix("index");

    // Stage 1: fetch + parse with bounded concurrency.
    let parsed: Vec<(String, Vec<Symbol>)> = stream::iter(candidates.into_iter())
        .map(|entry| {
            let bar = bar.clone();
            async move {
                if cancel.is_cancelled() {
                    return None;
                }
                let path = entry.path;
                let text = match client.get_file(repo, branch, &path).await {
                    Ok(Some(t)) => t,
                    Ok(None) => {
                        warn!("{path}: vanished between tree listing and fetch");
                        bar.inc(1);
                        return None;
                    }
                    Err(e) => {
                        warn!("{path}: fetch failed ({e}), skipping");
                        bar.inc(1);
                        return None;
                    }
                };
                let out = match parse_source(&path, &text) {
                    Ok(parsed) => Some((path.clone(), parsed.symbols)),
                    Err(e) => {
                        warn!("{path}: extraction failed ({e}), skipping");
                        None
                    }
                };
                bar.inc(1);
                bar.set_message(path);
                out
            }
        })
        .buffer_unordered(opts.concurrency.max(1))
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .flatten()
        .collect();
    bar.finish_and_clear();

    if cancel.is_cancelled() {
        return Err(IndexError::Cancelled);
    }

    summary.files_indexed = parsed.len();
    summary.files_skipped = summary.files_seen - summary.files_indexed;

    let symbols: Vec<Symbol> = parsed.into_iter().flat_map(|(_, syms)| syms).collect();
    info!("extracted {} symbols, embedding…", symbols.len());

    // Stage 2: embed with the same concurrency bound.
    let records: Vec<EmbeddingRecord> = stream::iter(symbols.into_iter())
        .map(|symbol| async move {
            if cancel.is_cancelled() {
                return None;
            }
            match embedder.embed(&symbol.body).await {
                Ok(vector) => Some(EmbeddingRecord::from_symbol(
                    repo,
                    branch,
                    &symbol,
                    vector,
                    opts.snippet_max_chars,
                )),
                Err(e) => {
                    warn!("embedding failed for {} ({e}), skipping", symbol.qualified_name);
                    None
                }
            }
        })
        .buffer_unordered(opts.concurrency.max(1))
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .flatten()
        .collect();

    if cancel.is_cancelled() {
        return Err(IndexError::Cancelled);
    }

    summary.symbols_indexed = records.len();

    // Replace the scope atomically from the store's point of view.
    let removed = store.clear_scope(repo, branch)?;
    store.upsert(records)?;
    info!(
        "index complete: {} symbols stored for {repo}@{branch} (replaced {removed})",
        summary.symbols_indexed
    );

    Ok(summary)
}
