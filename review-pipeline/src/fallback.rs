//! Fallback generator: review findings without a model.
//!
//! When the LLM is unavailable for a file, findings are synthesized from
//! the deterministic analyzer output via templates keyed by the source id.
//! The output shape is indistinguishable from LLM findings except for
//! `source = "fallback"`, so every downstream phase stays agnostic.

use tracing::debug;

use crate::findings::Finding;

/// Source id for synthesized findings.
pub const SOURCE_FALLBACK: &str = "fallback";

/// Synthesizes review findings for one file from the deterministic results.
pub fn findings_for_file(path: &str, deterministic: &[Finding]) -> Vec<Finding> {
    let out: Vec<Finding> = deterministic
        .iter()
        .filter(|f| f.file == path)
        .map(|f| Finding {
            file: f.file.clone(),
            line: f.line,
            severity: f.severity,
            category: f.category,
            message: template_for(&f.source, &f.message),
            suggestion: f.suggestion.clone(),
            confidence: None,
            source: SOURCE_FALLBACK.to_string(),
            related: f.related.clone(),
        })
        .collect();
    debug!("fallback produced {} findings for {path}", out.len());
    out
}

/// Template keyed by the originating analyzer id.
fn template_for(source: &str, original: &str) -> String {
    let lead = match source {
        "duplicates" => "Automated similarity analysis flagged this block.",
        "breaking-change" => "Automated contract analysis flagged this change.",
        "architecture" => "Automated architecture check flagged this declaration.",
        s if s.starts_with("heuristic.") => "Automated static analysis flagged this line.",
        _ => "Automated analysis flagged this location.",
    };
    format!("{lead} {original}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::findings::{Category, Severity};

    fn det(source: &str, file: &str) -> Finding {
        Finding {
            file: file.into(),
            line: 4,
            severity: Severity::Medium,
            category: Category::Correctness,
            message: "Exception is swallowed silently.".into(),
            suggestion: Some("catch (e) { log(e); }".into()),
            confidence: Some(0.8),
            source: source.into(),
            related: vec![],
        }
    }

    #[test]
    fn shape_matches_llm_findings_except_source() {
        let out = findings_for_file("a.java", &[det("heuristic.swallowed-exceptions", "a.java")]);
        assert_eq!(out.len(), 1);
        let f = &out[0];
        assert_eq!(f.source, SOURCE_FALLBACK);
        assert_eq!(f.file, "a.java");
        assert_eq!(f.line, 4);
        assert_eq!(f.severity, Severity::Medium);
        assert!(f.suggestion.is_some());
        // Confidence is left for the normalizer, like a fresh LLM finding.
        assert_eq!(f.confidence, None);
    }

    #[test]
    fn other_files_are_ignored() {
        let out = findings_for_file("a.java", &[det("duplicates", "b.java")]);
        assert!(out.is_empty());
    }
}
