//! Provider-agnostic data model for pull requests and diffs.
//!
//! These types are the normalized output of the fetch step and are consumed
//! by every later stage (symbol extraction, analyzers, comment planning).

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A unique reference to a pull request.
///
/// `repo` is "owner/name"; `number` is the PR number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrId {
    pub repo: String,
    pub number: u64,
}

/// High-level PR metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub id: PrId,
    pub title: String,
    pub body: Option<String>,
    pub author: Option<String>,
    pub state: String,
    pub web_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub head_sha: String,
    pub base_sha: String,
    pub head_branch: String,
    pub base_branch: String,
}

/// File-level change status as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Added,
    Modified,
    Removed,
    Renamed,
}

/// One changed line inside a diff hunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DiffLine {
    Added {
        new_line: u32,
        content: String,
    },
    Removed {
        old_line: u32,
        content: String,
    },
    Context {
        old_line: u32,
        new_line: u32,
        content: String,
    },
}

/// A diff hunk (continuous block of changes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffHunk {
    pub old_start: u32,
    pub old_lines: u32,
    pub new_start: u32,
    pub new_lines: u32,
    pub lines: Vec<DiffLine>,
}

/// File-level change and its parsed hunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChange {
    /// Path on the head side.
    pub path: String,
    /// Old path when renamed.
    pub previous_path: Option<String>,
    pub status: FileStatus,
    pub is_binary: bool,
    pub hunks: Vec<DiffHunk>,
    /// Raw unified diff text as delivered by the platform.
    pub patch: Option<String>,
}

/// The full set of changes for a PR.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeSet {
    pub files: Vec<FileChange>,
    /// True if the platform truncated the file list due to size limits.
    pub is_truncated: bool,
}

/// All data needed by later phases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrBundle {
    pub meta: PullRequest,
    pub changes: ChangeSet,
}

impl PrBundle {
    /// Paths changed on the head side (removed files excluded).
    pub fn changed_paths(&self) -> Vec<&str> {
        self.changes
            .files
            .iter()
            .filter(|f| f.status != FileStatus::Removed)
            .map(|f| f.path.as_str())
            .collect()
    }
}

/// One entry of a branch tree listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    /// Blob size in bytes when reported.
    pub size: Option<u64>,
}

/// Added/changed head-side line numbers per file, for inline eligibility
/// and anchor validation.
#[derive(Debug, Clone, Default)]
pub struct ChangedLines {
    per_file: BTreeMap<String, BTreeSet<u32>>,
}

impl ChangedLines {
    /// Builds the changed-line sets from a parsed change set.
    pub fn from_changes(changes: &ChangeSet) -> Self {
        let mut per_file: BTreeMap<String, BTreeSet<u32>> = BTreeMap::new();
        for file in &changes.files {
            let entry = per_file.entry(file.path.clone()).or_default();
            for hunk in &file.hunks {
                for line in &hunk.lines {
                    if let DiffLine::Added { new_line, .. } = line {
                        entry.insert(*new_line);
                    }
                }
            }
        }
        Self { per_file }
    }

    /// True when `line` is an added/changed head-side line of `path`.
    pub fn contains(&self, path: &str, line: u32) -> bool {
        self.per_file
            .get(path)
            .map(|s| s.contains(&line))
            .unwrap_or(false)
    }

    /// All changed lines of one file.
    pub fn lines_for(&self, path: &str) -> Option<&BTreeSet<u32>> {
        self.per_file.get(path)
    }

    /// Files with at least one added line.
    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.per_file.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changed_lines_only_track_added() {
        let changes = ChangeSet {
            files: vec![FileChange {
                path: "a.java".into(),
                previous_path: None,
                status: FileStatus::Modified,
                is_binary: false,
                hunks: vec![DiffHunk {
                    old_start: 1,
                    old_lines: 2,
                    new_start: 1,
                    new_lines: 2,
                    lines: vec![
                        DiffLine::Context {
                            old_line: 1,
                            new_line: 1,
                            content: "x".into(),
                        },
                        DiffLine::Removed {
                            old_line: 2,
                            content: "old".into(),
                        },
                        DiffLine::Added {
                            new_line: 2,
                            content: "new".into(),
                        },
                    ],
                }],
                patch: None,
            }],
            is_truncated: false,
        };
        let lines = ChangedLines::from_changes(&changes);
        assert!(lines.contains("a.java", 2));
        assert!(!lines.contains("a.java", 1));
        assert!(!lines.contains("b.java", 2));
    }
}
