//! GitHub REST client plus the unified-diff machinery the pipeline needs.
//!
//! Capability set:
//! - read PR metadata + changed files (patches parsed into hunks/lines),
//! - fetch raw file contents at a ref,
//! - list a branch tree,
//! - post inline review comments and PR-level summary comments.
//!
//! Every call goes through the shared `resilience` retry helper; auth
//! failures are fatal, rate limits and 5xx are retried with backoff.

pub mod client;
pub mod diff;
pub mod errors;
pub mod types;

pub use client::GitHubClient;
pub use errors::{PlatformError, PlatformResult};
pub use types::{
    ChangeSet, ChangedLines, DiffHunk, DiffLine, FileChange, FileStatus, PrBundle, PrId,
    PullRequest, TreeEntry,
};
