//! Comment poster: plan first, then post.
//!
//! Planning is pure and fully testable:
//! - inline-eligible: severity high, or medium with category ∈
//!   {architecture, breaking-change}, capped at 3 medium inline per file;
//! - an inline comment must target an added/changed head-side line, else
//!   it is downgraded into the file's summary comment;
//! - everything else lands in per-file summary comments; empty summaries
//!   are never posted.
//!
//! Posting embeds a hidden HTML marker per comment and pre-loads existing
//! markers, so re-running with `--post` never duplicates. Throttled to at
//! most one comment per second; permanent per-comment failures are logged
//! and recorded, never fatal.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use platform_client::{ChangedLines, GitHubClient, PrId};
use resilience::CancellationToken;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::findings::{Category, Finding, Severity};
use crate::report::{Diagnostic, DiagnosticKind};

/// Hidden marker prefix embedded in every posted comment body.
const MARKER_PREFIX: &str = "<!-- pr-reviewer:key=";
const MARKER_SUFFIX: &str = " -->";

/// Maximum medium-severity inline comments per file.
const MAX_MEDIUM_INLINE_PER_FILE: usize = 3;

/// Minimum spacing between two posts.
const POST_THROTTLE: Duration = Duration::from_secs(1);

/// One planned inline comment.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineComment {
    pub path: String,
    pub line: u32,
    pub body: String,
    pub marker_key: String,
}

/// One planned per-file summary comment.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryComment {
    pub path: String,
    pub body: String,
    pub marker_key: String,
}

/// Complete posting plan for a run.
#[derive(Debug, Clone, Default)]
pub struct CommentPlan {
    pub inline: Vec<InlineComment>,
    pub summaries: Vec<SummaryComment>,
}

impl CommentPlan {
    pub fn is_empty(&self) -> bool {
        self.inline.is_empty() && self.summaries.is_empty()
    }
}

/// Builds the posting plan from normalized findings.
pub fn plan_comments(findings: &[Finding], changed: &ChangedLines) -> CommentPlan {
    let mut plan = CommentPlan::default();
    let mut medium_inline_per_file: BTreeMap<&str, usize> = BTreeMap::new();
    let mut summary_items: BTreeMap<String, Vec<&Finding>> = BTreeMap::new();

    for f in findings {
        let medium_slot = medium_inline_per_file.entry(f.file.as_str()).or_default();
        let inline_eligible = match f.severity {
            Severity::High => true,
            Severity::Medium
                if matches!(f.category, Category::Architecture | Category::BreakingChange) =>
            {
                *medium_slot < MAX_MEDIUM_INLINE_PER_FILE
            }
            _ => false,
        };

        // Inline must land on a line present in the PR patch.
        if inline_eligible && changed.contains(&f.file, f.line) {
            if f.severity == Severity::Medium {
                *medium_slot += 1;
            }
            plan.inline.push(InlineComment {
                path: f.file.clone(),
                line: f.line,
                body: render_inline(f),
                marker_key: marker_key(&f.file, Some(f.line), &f.message),
            });
        } else {
            summary_items.entry(f.file.clone()).or_default().push(f);
        }
    }

    for (path, items) in summary_items {
        if items.is_empty() {
            continue;
        }
        let body = render_summary(&path, &items);
        let key = marker_key(&path, None, &body);
        plan.summaries.push(SummaryComment {
            path,
            body,
            marker_key: key,
        });
    }

    plan
}

/// Posts the plan. Returns the number of comments created plus diagnostics
/// for skipped/failed posts.
pub async fn post_comments(
    client: &GitHubClient,
    pr: &PrId,
    head_sha: &str,
    plan: &CommentPlan,
    cancel: &CancellationToken,
) -> (usize, Vec<Diagnostic>) {
    let mut posted = 0usize;
    let mut diagnostics = Vec::new();

    // Idempotency: collect markers already present on the PR.
    let existing: HashSet<String> = match client.existing_comment_bodies(pr).await {
        Ok(bodies) => bodies.iter().filter_map(|b| extract_marker(b)).collect(),
        Err(e) => {
            warn!("could not list existing comments ({e}); posting without dedup");
            diagnostics.push(Diagnostic::new(
                "post",
                None,
                DiagnosticKind::Failure,
                format!("existing-comment listing failed: {e}"),
            ));
            HashSet::new()
        }
    };
    info!(
        "posting plan: {} inline, {} summaries ({} existing markers)",
        plan.inline.len(),
        plan.summaries.len(),
        existing.len()
    );

    let mut first = true;
    for comment in &plan.inline {
        if cancel.is_cancelled() {
            break;
        }
        if existing.contains(&comment.marker_key) {
            debug!("skip duplicate inline {}:{}", comment.path, comment.line);
            continue;
        }
        throttle(&mut first, cancel).await;
        let body = format!(
            "{}\n\n{MARKER_PREFIX}{}{MARKER_SUFFIX}",
            comment.body, comment.marker_key
        );
        match client
            .post_inline(pr, head_sha, &comment.path, comment.line, &body)
            .await
        {
            Ok(()) => posted += 1,
            Err(e) => {
                warn!(
                    "inline comment on {}:{} failed ({e}); continuing",
                    comment.path, comment.line
                );
                diagnostics.push(Diagnostic::new(
                    "post",
                    Some(format!("{}:{}", comment.path, comment.line)),
                    DiagnosticKind::Failure,
                    e.to_string(),
                ));
            }
        }
    }

    for summary in &plan.summaries {
        if cancel.is_cancelled() {
            break;
        }
        if existing.contains(&summary.marker_key) {
            debug!("skip duplicate summary for {}", summary.path);
            continue;
        }
        throttle(&mut first, cancel).await;
        let body = format!(
            "{}\n\n{MARKER_PREFIX}{}{MARKER_SUFFIX}",
            summary.body, summary.marker_key
        );
        match client.post_summary(pr, &body).await {
            Ok(()) => posted += 1,
            Err(e) => {
                warn!("summary comment for {} failed ({e}); continuing", summary.path);
                diagnostics.push(Diagnostic::new(
                    "post",
                    Some(summary.path.clone()),
                    DiagnosticKind::Failure,
                    e.to_string(),
                ));
            }
        }
    }

    (posted, diagnostics)
}

async fn throttle(first: &mut bool, cancel: &CancellationToken) {
    if *first {
        *first = false;
        return;
    }
    tokio::select! {
        _ = cancel.cancelled() => {}
        _ = tokio::time::sleep(POST_THROTTLE) => {}
    }
}

/// Inline comment body: severity tag, category, message, suggestion block.
fn render_inline(f: &Finding) -> String {
    let mut body = format!(
        "**[{}] {}**\n\n{}",
        severity_word(f.severity),
        category_word(f.category),
        f.message
    );
    if let Some(s) = &f.suggestion {
        body.push_str("\n\n```suggestion\n");
        body.push_str(s);
        body.push_str("\n```");
    }
    body
}

/// Per-file summary comment with a heading prefix.
fn render_summary(path: &str, items: &[&Finding]) -> String {
    let mut body = format!("### Review notes for `{path}`\n\n");
    for f in items {
        body.push_str(&format!(
            "- **{}** ({}) line {}: {}\n",
            severity_word(f.severity),
            category_word(f.category),
            f.line,
            f.message
        ));
    }
    body
}

fn severity_word(s: Severity) -> &'static str {
    match s {
        Severity::High => "high",
        Severity::Medium => "medium",
        Severity::Low => "low",
    }
}

fn category_word(c: Category) -> &'static str {
    match c {
        Category::Security => "security",
        Category::Performance => "performance",
        Category::Correctness => "correctness",
        Category::Style => "style",
        Category::Duplicate => "duplicate",
        Category::BreakingChange => "breaking-change",
        Category::Architecture => "architecture",
        Category::Observability => "observability",
        Category::Documentation => "documentation",
        Category::Test => "test",
    }
}

/// Stable short key for idempotent posting.
fn marker_key(path: &str, line: Option<u32>, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    hasher.update(b":");
    if let Some(l) = line {
        hasher.update(l.to_le_bytes());
    }
    hasher.update(text.lines().next().unwrap_or("").as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("{}@{}", path_tag(path), &digest[..12])
}

fn path_tag(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Pulls the marker key out of a posted comment body.
fn extract_marker(body: &str) -> Option<String> {
    let start = body.find(MARKER_PREFIX)? + MARKER_PREFIX.len();
    let rest = &body[start..];
    let end = rest.find(MARKER_SUFFIX)?;
    Some(rest[..end].trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform_client::{ChangeSet, DiffHunk, DiffLine, FileChange, FileStatus};

    fn changed(path: &str, lines: &[u32]) -> ChangedLines {
        let hunk = DiffHunk {
            old_start: 1,
            old_lines: 0,
            new_start: lines.first().copied().unwrap_or(1),
            new_lines: lines.len() as u32,
            lines: lines
                .iter()
                .map(|l| DiffLine::Added {
                    new_line: *l,
                    content: "x".into(),
                })
                .collect(),
        };
        ChangedLines::from_changes(&ChangeSet {
            files: vec![FileChange {
                path: path.into(),
                previous_path: None,
                status: FileStatus::Modified,
                is_binary: false,
                hunks: vec![hunk],
                patch: None,
            }],
            is_truncated: false,
        })
    }

    fn finding(file: &str, line: u32, sev: Severity, cat: Category) -> Finding {
        Finding {
            file: file.into(),
            line,
            severity: sev,
            category: cat,
            message: format!("issue at {line}"),
            suggestion: None,
            confidence: Some(0.8),
            source: "llm".into(),
            related: vec![],
        }
    }

    #[test]
    fn high_goes_inline_low_goes_summary() {
        let lines = changed("a.java", &[10, 11, 12]);
        let findings = vec![
            finding("a.java", 10, Severity::High, Category::Security),
            finding("a.java", 11, Severity::Low, Category::Style),
        ];
        let plan = plan_comments(&findings, &lines);
        assert_eq!(plan.inline.len(), 1);
        assert_eq!(plan.inline[0].line, 10);
        assert_eq!(plan.summaries.len(), 1);
        assert!(plan.summaries[0].body.contains("issue at 11"));
    }

    #[test]
    fn medium_inline_only_for_special_categories_with_cap() {
        let lines = changed("a.java", &[1, 2, 3, 4, 5, 6]);
        let findings = vec![
            finding("a.java", 1, Severity::Medium, Category::Architecture),
            finding("a.java", 2, Severity::Medium, Category::BreakingChange),
            finding("a.java", 3, Severity::Medium, Category::Architecture),
            finding("a.java", 4, Severity::Medium, Category::BreakingChange),
            finding("a.java", 5, Severity::Medium, Category::Correctness),
        ];
        let plan = plan_comments(&findings, &lines);
        // Cap of 3 medium inline; the 4th special-category and the plain
        // correctness finding fall into the summary.
        assert_eq!(plan.inline.len(), 3);
        assert_eq!(plan.summaries.len(), 1);
        let summary = &plan.summaries[0].body;
        assert!(summary.contains("issue at 4"));
        assert!(summary.contains("issue at 5"));
    }

    #[test]
    fn inline_on_unchanged_line_downgrades_to_summary() {
        let lines = changed("a.java", &[10]);
        let findings = vec![finding("a.java", 99, Severity::High, Category::Security)];
        let plan = plan_comments(&findings, &lines);
        assert!(plan.inline.is_empty());
        assert_eq!(plan.summaries.len(), 1);
    }

    #[test]
    fn empty_plan_for_no_findings() {
        let plan = plan_comments(&[], &changed("a.java", &[1]));
        assert!(plan.is_empty());
    }

    #[test]
    fn suggestion_renders_as_suggestion_block() {
        let mut f = finding("a.java", 10, Severity::High, Category::Security);
        f.suggestion = Some("stmt.setString(1, name);".into());
        let body = render_inline(&f);
        assert!(body.contains("```suggestion\nstmt.setString(1, name);\n```"));
    }

    #[test]
    fn marker_round_trip() {
        let key = marker_key("src/a.java", Some(10), "message line");
        let body = format!("text\n\n{MARKER_PREFIX}{key}{MARKER_SUFFIX}");
        assert_eq!(extract_marker(&body), Some(key));
        assert_eq!(extract_marker("no marker here"), None);
    }
}
