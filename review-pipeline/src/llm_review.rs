//! Phase 1: per-file LLM review.
//!
//! Invocation is strictly sequential with a mandatory inter-request delay
//! (free-tier quotas). Each call is wrapped in the shared retry helper; a
//! quota exhaustion marks the reviewer unavailable for the rest of the run
//! so later files go straight to the fallback generator.
//!
//! Response discipline: the model must return a JSON array of findings.
//! If parsing fails, one repair prompt is sent; a second failure hands the
//! file to the fallback generator.

use std::time::Duration;

use llm_service::{LlmError, LlmService};
use regex::Regex;
use resilience::{CancellationToken, RetryError, RetryPolicy, retry};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::context::AnalysisContext;
use crate::findings::{Category, Finding, Severity};

/// Source id for model-produced findings.
pub const SOURCE_LLM: &str = "llm";

/// Why a file could not be reviewed by the model.
#[derive(Debug)]
pub enum LlmFileError {
    /// No service configured, quota exhausted, or retries exhausted.
    Unavailable(String),
    /// Output failed to parse twice (schema validation).
    Unparseable,
    /// The run was cancelled.
    Cancelled,
}

/// Result of one file review.
#[derive(Debug)]
pub struct FileReview {
    pub findings: Vec<Finding>,
    /// True when the first response needed a repair prompt.
    pub repaired: bool,
}

/// Stateful sequential reviewer.
pub struct LlmReviewer {
    service: Option<LlmService>,
    policy: RetryPolicy,
    delay: Duration,
    /// Set on quota exhaustion; sticky for the rest of the run.
    unavailable: bool,
    calls_made: usize,
}

impl LlmReviewer {
    pub fn new(service: Option<LlmService>) -> Self {
        let delay = service
            .as_ref()
            .map(|s| s.inter_request_delay())
            .unwrap_or_default();
        Self {
            service,
            policy: RetryPolicy::slow(),
            delay,
            unavailable: false,
            calls_made: 0,
        }
    }

    /// True while the model can still be called this run.
    pub fn available(&self) -> bool {
        self.service.is_some() && !self.unavailable
    }

    /// Reviews one changed file. Sequential by construction: the caller
    /// iterates files and awaits each review.
    pub async fn review_file(
        &mut self,
        ctx: &AnalysisContext,
        path: &str,
        prior_findings: &[Finding],
        cancel: &CancellationToken,
    ) -> Result<FileReview, LlmFileError> {
        if !self.available() {
            return Err(LlmFileError::Unavailable("llm not configured".into()));
        }

        let (system, user) = build_review_prompt(ctx, path, prior_findings);

        let raw = self.generate(&user, &system, cancel).await?;
        match parse_llm_findings(&raw, path) {
            Ok(findings) => {
                info!("llm review of {path}: {} findings", findings.len());
                return Ok(FileReview {
                    findings,
                    repaired: false,
                });
            }
            Err(e) => {
                warn!("llm output for {path} unparseable ({e}), sending repair prompt");
            }
        }

        let repair = format!(
            "{user}\n\nYour previous reply could not be parsed. Respond again with ONLY a \
             JSON array of finding objects (fields: line, severity, category, message, \
             suggestion). No prose, no code fences."
        );
        let raw = self.generate(&repair, &system, cancel).await?;
        match parse_llm_findings(&raw, path) {
            Ok(findings) => {
                info!(
                    "llm review of {path}: {} findings (after repair)",
                    findings.len()
                );
                Ok(FileReview {
                    findings,
                    repaired: true,
                })
            }
            Err(e) => {
                warn!("llm output for {path} failed twice ({e})");
                Err(LlmFileError::Unparseable)
            }
        }
    }

    /// One model call: pacing delay, retry with backoff, quota tracking.
    async fn generate(
        &mut self,
        prompt: &str,
        system: &str,
        cancel: &CancellationToken,
    ) -> Result<String, LlmFileError> {
        let service = self
            .service
            .clone()
            .ok_or_else(|| LlmFileError::Unavailable("llm not configured".into()))?;

        if self.calls_made > 0 && !self.delay.is_zero() {
            debug!("inter-request delay {:?}", self.delay);
            tokio::select! {
                _ = cancel.cancelled() => return Err(LlmFileError::Cancelled),
                _ = tokio::time::sleep(self.delay) => {}
            }
        }
        self.calls_made += 1;

        let service_ref = &service;
        let out = retry(&self.policy, cancel, "llm-review", || async move {
            service_ref.generate(prompt, Some(system)).await
        })
        .await;

        match out {
            Ok(text) => Ok(text),
            Err(RetryError::Cancelled) => Err(LlmFileError::Cancelled),
            Err(e) => {
                let quota = matches!(
                    &e,
                    RetryError::Exhausted { last, .. } if last.is_quota_exhausted()
                ) || matches!(&e, RetryError::Permanent(LlmError::Unauthorized));
                if quota {
                    warn!("llm quota exhausted; switching to fallback for the rest of the run");
                    self.unavailable = true;
                }
                Err(LlmFileError::Unavailable(e.to_string()))
            }
        }
    }
}

/* ------------------------------- prompting -------------------------------- */

/// Builds the system + user prompt for one file.
///
/// Contract stated to the model (language-neutral):
/// - suggestions contain only the changed block (no imports, no
///   surrounding methods),
/// - a suggestion starts at the issue line,
/// - a suggestion must be syntactically complete for the block.
pub fn build_review_prompt(
    ctx: &AnalysisContext,
    path: &str,
    prior_findings: &[Finding],
) -> (String, String) {
    let system = "You are a precise code reviewer. Report only real issues on the changed \
                  lines. Respond with a JSON array; each element has: line (integer, head \
                  side), severity (critical|major|minor or high|medium|low), category \
                  (security|performance|correctness|style|observability|documentation|test), \
                  message (concise prose), suggestion (optional replacement code). \
                  Suggestion rules: include only the changed block, never imports or \
                  surrounding methods; start exactly at the issue line; the block must be \
                  syntactically complete. Return [] when nothing is wrong."
        .to_string();

    let mut user = String::new();
    user.push_str(&format!("File: {path}\n\n"));

    if let Some(change) = ctx.bundle.changes.files.iter().find(|f| f.path == path) {
        if let Some(patch) = &change.patch {
            user.push_str("Diff (head line numbers on added lines):\n");
            user.push_str(patch);
            user.push_str("\n\n");
        }
    }

    if let Some(content) = ctx.file_contents.get(path) {
        user.push_str("Current file content (numbered):\n");
        for (i, line) in content.lines().enumerate().take(400) {
            user.push_str(&format!("{:>5} {line}\n", i + 1));
        }
        user.push('\n');
    }

    let relevant: Vec<&Finding> = prior_findings.iter().filter(|f| f.file == path).collect();
    if !relevant.is_empty() {
        user.push_str("Deterministic analysis already flagged:\n");
        for f in relevant.iter().take(10) {
            user.push_str(&format!("- line {}: {}\n", f.line, f.message));
        }
        user.push('\n');
    }

    user.push_str("Changed head-side lines you may attach findings to: ");
    if let Some(lines) = ctx.changed_lines.lines_for(path) {
        let rendered: Vec<String> = lines.iter().take(200).map(u32::to_string).collect();
        user.push_str(&rendered.join(", "));
    }
    user.push('\n');

    (system, user)
}

/* -------------------------------- parsing --------------------------------- */

/// Raw wire shape; everything optional so one bad field does not reject
/// the whole array. Invalid entries are discarded individually.
#[derive(Debug, Deserialize)]
struct RawLlmFinding {
    #[serde(default)]
    line: Option<u32>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    suggestion: Option<String>,
    #[serde(default)]
    confidence: Option<f32>,
}

/// Parses model output into findings.
///
/// Tolerates `<think>` traces and code fences around the array. Entries
/// missing a valid line/severity/message are dropped; an unknown category
/// falls back to `correctness` only when the message is usable.
pub fn parse_llm_findings(raw: &str, path: &str) -> Result<Vec<Finding>, String> {
    let cleaned = strip_think(raw);
    let json = extract_json_array(&cleaned).ok_or("no JSON array in response")?;
    let rows: Vec<RawLlmFinding> =
        serde_json::from_str(json).map_err(|e| format!("invalid JSON: {e}"))?;

    let mut out = Vec::new();
    for row in rows {
        let Some(line) = row.line.filter(|l| *l >= 1) else {
            continue;
        };
        let Some(severity) = row.severity.as_deref().and_then(Severity::parse_lenient) else {
            continue;
        };
        let Some(message) = row.message.filter(|m| !m.trim().is_empty()) else {
            continue;
        };
        let category = row
            .category
            .as_deref()
            .and_then(Category::parse_lenient)
            .unwrap_or(Category::Correctness);

        out.push(Finding {
            file: path.to_string(),
            line,
            severity,
            category,
            message: message.trim().to_string(),
            suggestion: row
                .suggestion
                .filter(|s| !s.trim().is_empty())
                .map(|s| s.trim_matches('\n').to_string()),
            confidence: row.confidence.map(|c| c.clamp(0.0, 1.0)),
            source: SOURCE_LLM.to_string(),
            related: vec![],
        });
    }
    Ok(out)
}

fn strip_think(s: &str) -> String {
    let re = Regex::new(r"(?s)<think>.*?</think>").unwrap();
    re.replace_all(s, "").to_string()
}

/// Finds the JSON array: fenced block first, then the outermost brackets.
fn extract_json_array(s: &str) -> Option<&str> {
    if let Some(start) = s.find("```json") {
        let rest = &s[start + 7..];
        if let Some(end) = rest.find("```") {
            return Some(rest[..end].trim());
        }
    }
    let start = s.find('[')?;
    let end = s.rfind(']')?;
    if end <= start {
        return None;
    }
    Some(&s[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_array() {
        let raw = r#"[{"line": 12, "severity": "critical", "category": "security",
                      "message": "SQL injection via string concatenation",
                      "suggestion": "stmt.setString(1, name);"}]"#;
        let out = parse_llm_findings(raw, "a.java").unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].severity, Severity::High);
        assert_eq!(out[0].category, Category::Security);
        assert_eq!(out[0].line, 12);
        assert_eq!(out[0].source, "llm");
        assert!(out[0].suggestion.is_some());
    }

    #[test]
    fn parses_fenced_array_with_think_noise() {
        let raw = "<think>let me look…</think>\n```json\n[{\"line\": 3, \"severity\": \"minor\", \"category\": \"style\", \"message\": \"rename\"}]\n```";
        let out = parse_llm_findings(raw, "b.ts").unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].severity, Severity::Low);
    }

    #[test]
    fn invalid_rows_are_dropped_not_fatal() {
        let raw = r#"[
            {"line": 0, "severity": "high", "message": "bad line"},
            {"severity": "high", "message": "no line"},
            {"line": 5, "severity": "made-up", "message": "bad severity"},
            {"line": 5, "severity": "high", "message": "  "},
            {"line": 7, "severity": "major", "message": "kept", "category": "weird"}
        ]"#;
        let out = parse_llm_findings(raw, "c.py").unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].line, 7);
        assert_eq!(out[0].category, Category::Correctness);
    }

    #[test]
    fn prose_without_array_is_an_error() {
        assert!(parse_llm_findings("Everything looks great!", "d.rs").is_err());
        assert!(parse_llm_findings("{\"not\": \"an array\"}", "d.rs").is_err());
    }

    #[test]
    fn empty_array_is_valid() {
        let out = parse_llm_findings("[]", "e.java").unwrap();
        assert!(out.is_empty());
    }
}
