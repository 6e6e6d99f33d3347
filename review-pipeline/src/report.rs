//! Report model, JSON serializer and the markdown executive summary.
//!
//! The report is the immutable outcome of a run; it round-trips through
//! JSON without loss and is the single artifact test suites assert on
//! (`runDiagnostics` records every non-fatal failure).

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::findings::{BreakingChange, DuplicateMatch, Finding, Severity};

/// Issue counters per normalized severity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeverityCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl SeverityCounts {
    pub fn from_findings(findings: &[Finding]) -> Self {
        let mut counts = Self::default();
        for f in findings {
            match f.severity {
                Severity::High => counts.high += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Low => counts.low += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.high + self.medium + self.low
    }
}

/// Duplicate matches split by scope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateSummary {
    pub within_pr: Vec<DuplicateMatch>,
    pub cross_repo: Vec<DuplicateMatch>,
}

/// What happened to a non-fatal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    /// A retry succeeded after at least one failed attempt.
    Retry,
    /// A unit was handed to the fallback generator.
    Fallback,
    /// A phase or unit was skipped entirely.
    Skipped,
    /// A per-unit failure that was logged and survived.
    Failure,
}

/// One structured record under `runDiagnostics`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub phase: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(
        phase: &str,
        unit: Option<String>,
        kind: DiagnosticKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            phase: phase.to_string(),
            unit,
            kind,
            message: message.into(),
        }
    }
}

/// Immutable snapshot of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub repository: String,
    pub pr_number: u64,
    pub head_sha: String,
    pub generated_at: DateTime<Utc>,
    pub issue_counts: SeverityCounts,
    pub findings: Vec<Finding>,
    pub duplicates: DuplicateSummary,
    pub breaking_changes: Vec<BreakingChange>,
    /// Architecture-category findings, repeated here for direct access.
    pub architecture_violations: Vec<Finding>,
    pub average_confidence: f32,
    pub summary_markdown: String,
    pub recommendations: Vec<String>,
    pub run_diagnostics: Vec<Diagnostic>,
    pub degraded: bool,
    pub cancelled: bool,
}

impl Report {
    /// Mean confidence over the final findings (0 when empty).
    pub fn compute_average_confidence(findings: &[Finding]) -> f32 {
        if findings.is_empty() {
            return 0.0;
        }
        let sum: f32 = findings.iter().filter_map(|f| f.confidence).sum();
        sum / findings.len() as f32
    }

    /// Writes pretty JSON to `path`.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        let data = serde_json::to_vec_pretty(self)?;
        fs::write(path, data)?;
        info!("report written to {}", path.display());
        Ok(())
    }

    /// Loads a previously saved report.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let data = fs::read(path)?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// Renders the markdown executive summary.
    ///
    /// Structure: risk line, critical issues, performance/security
    /// highlights, duplicate & breaking-change counts, quality metrics,
    /// recommendations.
    pub fn render_markdown(&self) -> String {
        let mut md = String::new();
        md.push_str(&format!(
            "# Review of {}#{}\n\n",
            self.repository, self.pr_number
        ));

        let risk = if self.issue_counts.high > 0 {
            "high"
        } else if self.issue_counts.medium > 0 {
            "moderate"
        } else {
            "low"
        };
        md.push_str(&format!(
            "**Risk assessment:** {risk} — {} issue(s) total.\n\n",
            self.issue_counts.total()
        ));

        let critical: Vec<&Finding> = self
            .findings
            .iter()
            .filter(|f| f.severity == Severity::High)
            .collect();
        if !critical.is_empty() {
            md.push_str("## Critical issues\n\n");
            for f in &critical {
                md.push_str(&format!("- `{}:{}` — {}\n", f.file, f.line, f.message));
            }
            md.push('\n');
        }

        let highlights: Vec<&Finding> = self
            .findings
            .iter()
            .filter(|f| {
                f.severity != Severity::High
                    && matches!(
                        f.category,
                        crate::findings::Category::Security
                            | crate::findings::Category::Performance
                    )
            })
            .collect();
        if !highlights.is_empty() {
            md.push_str("## Performance & security highlights\n\n");
            for f in highlights.iter().take(10) {
                md.push_str(&format!("- `{}:{}` — {}\n", f.file, f.line, f.message));
            }
            md.push('\n');
        }

        md.push_str(&format!(
            "## Duplicates & breaking changes\n\n- Within-PR duplicates: {}\n- Cross-repo duplicates: {}\n- Breaking changes: {}\n\n",
            self.duplicates.within_pr.len(),
            self.duplicates.cross_repo.len(),
            self.breaking_changes.len()
        ));

        md.push_str(&format!(
            "## Quality metrics\n\n- Total issues: {}\n- High: {}, Medium: {}, Low: {}\n- Average confidence: {:.0}%\n",
            self.issue_counts.total(),
            self.issue_counts.high,
            self.issue_counts.medium,
            self.issue_counts.low,
            self.average_confidence * 100.0
        ));
        if self.degraded {
            md.push_str("- Degraded run: at least one provider fell back\n");
        }
        if self.cancelled {
            md.push_str("- Cancelled: the run stopped before completing every phase\n");
        }
        md.push('\n');

        if !self.recommendations.is_empty() {
            md.push_str("## Recommendations\n\n");
            for r in &self.recommendations {
                md.push_str(&format!("- {r}\n"));
            }
            md.push('\n');
        }

        if !self.summary_markdown.is_empty() {
            md.push_str("## Summary\n\n");
            md.push_str(&self.summary_markdown);
            md.push('\n');
        }

        md
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::findings::Category;

    fn finding(sev: Severity, conf: f32) -> Finding {
        Finding {
            file: "a.java".into(),
            line: 1,
            severity: sev,
            category: Category::Correctness,
            message: "m".into(),
            suggestion: None,
            confidence: Some(conf),
            source: "llm".into(),
            related: vec![],
        }
    }

    fn sample_report() -> Report {
        let findings = vec![finding(Severity::High, 0.9), finding(Severity::Low, 0.5)];
        Report {
            repository: "acme/app".into(),
            pr_number: 7,
            head_sha: "abc123".into(),
            generated_at: Utc::now(),
            issue_counts: SeverityCounts::from_findings(&findings),
            average_confidence: Report::compute_average_confidence(&findings),
            findings,
            duplicates: DuplicateSummary::default(),
            breaking_changes: vec![],
            architecture_violations: vec![],
            summary_markdown: "All quiet.".into(),
            recommendations: vec!["Add tests.".into()],
            run_diagnostics: vec![Diagnostic::new(
                "phase1",
                Some("a.java".into()),
                DiagnosticKind::Retry,
                "llm output repaired",
            )],
            degraded: false,
            cancelled: false,
        }
    }

    #[test]
    fn severity_counters_match_findings() {
        let r = sample_report();
        assert_eq!(r.issue_counts.high, 1);
        assert_eq!(r.issue_counts.medium, 0);
        assert_eq!(r.issue_counts.low, 1);
        assert_eq!(r.issue_counts.total(), 2);
    }

    #[test]
    fn json_round_trip_is_identity_on_fields() {
        let r = sample_report();
        let json = serde_json::to_string(&r).unwrap();
        let back: Report = serde_json::from_str(&json).unwrap();
        assert_eq!(back.repository, r.repository);
        assert_eq!(back.pr_number, r.pr_number);
        assert_eq!(back.issue_counts, r.issue_counts);
        assert_eq!(back.findings.len(), r.findings.len());
        assert_eq!(back.run_diagnostics.len(), 1);
        assert_eq!(back.generated_at, r.generated_at);
        assert!((back.average_confidence - r.average_confidence).abs() < 1e-6);
    }

    #[test]
    fn json_uses_camel_case_keys() {
        let r = sample_report();
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains("\"generatedAt\""));
        assert!(json.contains("\"runDiagnostics\""));
        assert!(json.contains("\"issueCounts\""));
        assert!(json.contains("\"averageConfidence\""));
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let r = sample_report();
        r.save(&path).unwrap();
        let back = Report::load(&path).unwrap();
        assert_eq!(back.head_sha, r.head_sha);
    }

    #[test]
    fn markdown_mentions_the_metrics() {
        let md = sample_report().render_markdown();
        assert!(md.contains("Risk assessment"));
        assert!(md.contains("Average confidence: 70%"));
        assert!(md.contains("Breaking changes: 0"));
        assert!(md.contains("Recommendations"));
    }
}
