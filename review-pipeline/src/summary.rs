//! Phases 8 and 9: executive summary and cross-finding recommendations.
//!
//! Both prefer the LLM and degrade to deterministic templates; the caller
//! records a diagnostic when a fallback happened.

use std::collections::BTreeMap;

use llm_service::LlmService;
use tracing::warn;

use crate::findings::{Category, Finding, Severity};
use crate::report::{DuplicateSummary, SeverityCounts};

/// Everything the summary generator needs to see.
pub struct SummaryInputs<'a> {
    pub repository: &'a str,
    pub pr_number: u64,
    pub pr_title: &'a str,
    pub findings: &'a [Finding],
    pub counts: &'a SeverityCounts,
    pub duplicates: &'a DuplicateSummary,
    pub breaking_count: usize,
}

/// Generates the PR executive summary. Returns `(markdown, used_fallback)`.
pub async fn generate_summary(
    llm: Option<&LlmService>,
    inputs: &SummaryInputs<'_>,
) -> (String, bool) {
    if let Some(service) = llm {
        let mut prompt = format!(
            "Write a short markdown executive summary for a code review of pull request \
             {}#{} (\"{}\"). Findings ({} total, {} high / {} medium / {} low):\n",
            inputs.repository,
            inputs.pr_number,
            inputs.pr_title,
            inputs.counts.total(),
            inputs.counts.high,
            inputs.counts.medium,
            inputs.counts.low,
        );
        for f in inputs.findings.iter().take(30) {
            prompt.push_str(&format!(
                "- {}:{} [{:?}/{:?}] {}\n",
                f.file, f.line, f.severity, f.category, f.message
            ));
        }
        prompt.push_str(&format!(
            "Duplicates: {} within-PR, {} cross-repo. Breaking changes: {}.\n\
             Keep it under 200 words, plain markdown, no headings.",
            inputs.duplicates.within_pr.len(),
            inputs.duplicates.cross_repo.len(),
            inputs.breaking_count,
        ));

        match service.generate(&prompt, None).await {
            Ok(text) if !text.trim().is_empty() => return (text.trim().to_string(), false),
            Ok(_) => warn!("llm summary came back empty; using template"),
            Err(e) => warn!("llm summary failed ({e}); using template"),
        }
    }
    (template_summary(inputs), true)
}

/// Deterministic summary used when the LLM is unavailable.
pub fn template_summary(inputs: &SummaryInputs<'_>) -> String {
    let risk = if inputs.counts.high > 0 {
        "This change needs attention before merging."
    } else if inputs.counts.medium > 0 {
        "This change is mergeable after addressing the noted issues."
    } else {
        "No significant issues were detected."
    };

    let mut md = format!(
        "{risk} The review recorded {} finding(s): {} high, {} medium, {} low. ",
        inputs.counts.total(),
        inputs.counts.high,
        inputs.counts.medium,
        inputs.counts.low
    );
    md.push_str(&format!(
        "Duplicate analysis found {} match(es) within the PR and {} against the indexed \
         codebase; {} breaking change(s) were detected.",
        inputs.duplicates.within_pr.len(),
        inputs.duplicates.cross_repo.len(),
        inputs.breaking_count
    ));
    md
}

/// Generates cross-finding recommendations. Returns `(list, used_fallback)`.
pub async fn generate_recommendations(
    llm: Option<&LlmService>,
    findings: &[Finding],
) -> (Vec<String>, bool) {
    if findings.is_empty() {
        return (Vec::new(), false);
    }

    if let Some(service) = llm {
        let mut prompt = String::from(
            "Given these aggregated code review findings, produce up to five short, \
             actionable recommendations that address recurring themes. One per line, \
             no numbering, no extra prose.\n\n",
        );
        for f in findings.iter().take(50) {
            prompt.push_str(&format!("- [{:?}] {}\n", f.category, f.message));
        }
        match service.generate(&prompt, None).await {
            Ok(text) => {
                let recs: Vec<String> = text
                    .lines()
                    .map(|l| l.trim_start_matches(['-', '*', ' ']).trim().to_string())
                    .filter(|l| !l.is_empty())
                    .take(5)
                    .collect();
                if !recs.is_empty() {
                    return (recs, false);
                }
            }
            Err(e) => warn!("llm recommendations failed ({e}); using templates"),
        }
    }
    (template_recommendations(findings), true)
}

/// Theme-counting fallback for recommendations.
pub fn template_recommendations(findings: &[Finding]) -> Vec<String> {
    let mut per_category: BTreeMap<&'static str, usize> = BTreeMap::new();
    for f in findings {
        let theme = match f.category {
            Category::Security => "Harden the flagged security-sensitive paths before merging.",
            Category::Performance => "Profile the flagged hot spots and fix the costly patterns.",
            Category::Correctness => "Walk through the flagged logic paths and add regression tests.",
            Category::Duplicate => "Extract shared helpers for the duplicated blocks.",
            Category::BreakingChange => "Coordinate the contract changes with affected callers.",
            Category::Architecture => "Align the new code with the project's architecture rules.",
            Category::Observability => "Add logging around the flagged error boundaries.",
            Category::Documentation => "Document the new public symbols.",
            Category::Style | Category::Test => "Clean up the smaller style and test issues.",
        };
        *per_category.entry(theme).or_default() += 1;
    }

    let mut themes: Vec<(&str, usize)> = per_category.into_iter().collect();
    themes.sort_by(|a, b| b.1.cmp(&a.1));
    let mut recs: Vec<String> = themes
        .into_iter()
        .take(4)
        .map(|(t, _)| t.to_string())
        .collect();

    if findings.iter().any(|f| f.severity == Severity::High) {
        recs.insert(
            0,
            "Resolve the high-severity findings before merging.".to_string(),
        );
        recs.truncate(5);
    }
    recs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(sev: Severity, cat: Category) -> Finding {
        Finding {
            file: "a.java".into(),
            line: 1,
            severity: sev,
            category: cat,
            message: "m".into(),
            suggestion: None,
            confidence: Some(0.8),
            source: "llm".into(),
            related: vec![],
        }
    }

    #[tokio::test]
    async fn template_path_when_no_llm() {
        let counts = SeverityCounts {
            high: 1,
            medium: 0,
            low: 2,
        };
        let dups = DuplicateSummary::default();
        let findings = vec![finding(Severity::High, Category::Security)];
        let inputs = SummaryInputs {
            repository: "acme/app",
            pr_number: 3,
            pr_title: "Add parser",
            findings: &findings,
            counts: &counts,
            duplicates: &dups,
            breaking_count: 1,
        };
        let (md, fellback) = generate_summary(None, &inputs).await;
        assert!(fellback);
        assert!(md.contains("needs attention"));
        assert!(md.contains("1 breaking change(s)"));
    }

    #[test]
    fn recommendations_lead_with_high_severity() {
        let findings = vec![
            finding(Severity::High, Category::Security),
            finding(Severity::Low, Category::Style),
            finding(Severity::Medium, Category::Duplicate),
        ];
        let recs = template_recommendations(&findings);
        assert!(recs[0].contains("high-severity"));
        assert!(recs.len() <= 5);
    }

    #[tokio::test]
    async fn no_findings_no_recommendations() {
        let (recs, fellback) = generate_recommendations(None, &[]).await;
        assert!(recs.is_empty());
        assert!(!fellback);
    }
}
