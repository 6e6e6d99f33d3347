//! Finding normalizer (phase 7).
//!
//! Ordered pipeline:
//! 1. severity is already normalized at the type level (lenient parsing
//!    happened at the edges);
//! 2. confidence assignment: supplied values are clamped, missing ones
//!    derived from severity (0.9/0.75/0.55), +0.05 with a suggestion,
//!    −0.1 for low-severity fallback/heuristic findings;
//! 3. context filter: test files drop {documentation, observability,
//!    style, duplicate} findings and low-severity ones;
//! 4. duplicate circularity: cross-file duplicate findings where both
//!    sides are test files are dropped;
//! 5. dedup by `(file, line)`: the highest severity wins, ties by
//!    confidence, then by having a suggestion;
//! 6. merge: when a location had several survivors, their messages are
//!    merged by the LLM when available, else grouped by category
//!    (security → logic → smell → other) on the highest-severity base.
//!
//! Output is sorted by `(file, line, -severity, -confidence)` and every
//! finding carries a confidence.

use std::collections::BTreeMap;

use llm_service::LlmService;
use tracing::{debug, warn};

use crate::context::{AnalysisContext, is_test_file};
use crate::findings::{Category, Finding, Severity};

/// How same-location findings get merged.
pub enum MergeBackend<'a> {
    Llm(&'a LlmService),
    Template,
}

/// Runs the full normalizer pipeline.
pub async fn normalize(
    findings: Vec<Finding>,
    ctx: &AnalysisContext,
    merge: MergeBackend<'_>,
) -> Vec<Finding> {
    let total_in = findings.len();

    // 2. Confidence assignment.
    let mut findings: Vec<Finding> = findings
        .into_iter()
        .map(assign_confidence)
        .collect();

    // 3. Context filter for test files.
    findings.retain(|f| {
        if !is_test_file(&f.file) {
            return true;
        }
        let dropped_category = matches!(
            f.category,
            Category::Documentation | Category::Observability | Category::Style | Category::Duplicate
        );
        !(dropped_category || f.severity == Severity::Low)
    });

    // 4. Duplicate suggestion circularity.
    findings.retain(|f| {
        if f.category != Category::Duplicate || f.related.len() < 2 {
            return true;
        }
        let cross_file = f.related[0].file != f.related[1].file;
        !(cross_file && f.related.iter().all(|r| is_test_file(&r.file)))
    });

    // 5 + 6. Group by (file, line), keep the best, merge the rest in.
    let mut groups: BTreeMap<(String, u32), Vec<Finding>> = BTreeMap::new();
    for f in findings {
        groups.entry((f.file.clone(), f.line)).or_default().push(f);
    }

    let mut out = Vec::with_capacity(groups.len());
    for (_, mut group) in groups {
        group.sort_by(|a, b| {
            b.severity
                .weight()
                .cmp(&a.severity.weight())
                .then_with(|| {
                    b.confidence
                        .unwrap_or(0.0)
                        .partial_cmp(&a.confidence.unwrap_or(0.0))
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| b.suggestion.is_some().cmp(&a.suggestion.is_some()))
        });
        if group.len() == 1 {
            out.push(group.pop().expect("non-empty group"));
        } else {
            out.push(merge_group(group, &merge).await);
        }
    }

    out.sort_by_key(|f| f.sort_key());
    debug!("normalizer: {total_in} findings in, {} out", out.len());
    out
}

/// Step 2 of the pipeline, usable standalone.
pub fn assign_confidence(mut f: Finding) -> Finding {
    let mut conf = match f.confidence {
        Some(c) => c.clamp(0.0, 1.0),
        None => match f.severity {
            Severity::High => 0.9,
            Severity::Medium => 0.75,
            Severity::Low => 0.55,
        },
    };
    if f.suggestion.is_some() {
        conf += 0.05;
    }
    if f.from_fallback_or_heuristic() && f.severity == Severity::Low {
        conf -= 0.1;
    }
    f.confidence = Some(conf.clamp(0.0, 1.0));
    f
}

/// Merges a sorted group (best finding first) into one finding whose
/// message preserves every contract.
async fn merge_group(group: Vec<Finding>, backend: &MergeBackend<'_>) -> Finding {
    debug_assert!(group.len() >= 2);

    if let MergeBackend::Llm(service) = backend {
        if let Some(merged) = llm_merge(&group, service).await {
            return merged;
        }
    }
    template_merge(group)
}

/// LLM merge attempt; any failure falls back to the template merge.
async fn llm_merge(group: &[Finding], service: &LlmService) -> Option<Finding> {
    let mut prompt = String::from(
        "Merge the following review findings for one code location into a single concise \
         review message. Preserve every distinct issue; do not drop any contract. \
         Respond with the merged message text only.\n\n",
    );
    for f in group {
        prompt.push_str(&format!("- [{:?}/{:?}] {}\n", f.severity, f.category, f.message));
    }

    match service.generate(&prompt, None).await {
        Ok(text) if !text.trim().is_empty() => {
            let mut base = group[0].clone();
            base.message = text.trim().to_string();
            base.suggestion = combined_suggestions(group);
            Some(base)
        }
        Ok(_) => None,
        Err(e) => {
            warn!("llm merge failed ({e}); using template merge");
            None
        }
    }
}

/// Deterministic merge: category-grouped messages on the best base.
fn template_merge(mut group: Vec<Finding>) -> Finding {
    let mut rest = group.split_off(1);
    let mut base = group.pop().expect("base finding");

    rest.sort_by_key(|f| f.category.merge_rank());

    let mut message = format!("[{}] {}", category_label(base.category), base.message);
    for f in &rest {
        message.push_str(&format!("\n\nAlso [{}]: {}", category_label(f.category), f.message));
    }
    base.suggestion = combined_suggestions(
        &std::iter::once(base.clone())
            .chain(rest.iter().cloned())
            .collect::<Vec<_>>(),
    );
    base.message = message;
    base
}

fn combined_suggestions(group: &[Finding]) -> Option<String> {
    let parts: Vec<&str> = group
        .iter()
        .filter_map(|f| f.suggestion.as_deref())
        .collect();
    match parts.len() {
        0 => None,
        1 => Some(parts[0].to_string()),
        _ => Some(parts.join("\n\n")),
    }
}

fn category_label(c: Category) -> &'static str {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::findings::SymbolRef;
    use platform_client::{ChangeSet, PrBundle, PrId, PullRequest};
    use std::collections::BTreeMap;

    fn empty_ctx() -> AnalysisContext {
        let bundle = PrBundle {
            meta: PullRequest {
                id: PrId {
                    repo: "acme/app".into(),
                    number: 1,
                },
                title: "t".into(),
                body: None,
                author: None,
                state: "open".into(),
                web_url: String::new(),
                created_at: chrono::DateTime::UNIX_EPOCH,
                updated_at: chrono::DateTime::UNIX_EPOCH,
                head_sha: "h".into(),
                base_sha: "b".into(),
                head_branch: "feature".into(),
                base_branch: "main".into(),
            },
            changes: ChangeSet {
                files: vec![],
                is_truncated: false,
            },
        };
        AnalysisContext::build(bundle, BTreeMap::new(), 0.82)
    }

    fn finding(file: &str, line: u32, sev: Severity, cat: Category, source: &str) -> Finding {
        Finding {
            file: file.into(),
            line,
            severity: sev,
            category: cat,
            message: format!("{cat:?} issue"),
            suggestion: None,
            confidence: None,
            source: source.into(),
            related: vec![],
        }
    }

    #[tokio::test]
    async fn confidence_derivation_rules() {
        let high = assign_confidence(finding("a.java", 1, Severity::High, Category::Security, "llm"));
        assert_eq!(high.confidence, Some(0.9));

        let mut with_suggestion =
            finding("a.java", 2, Severity::Medium, Category::Correctness, "llm");
        with_suggestion.suggestion = Some("x".into());
        assert_eq!(assign_confidence(with_suggestion).confidence, Some(0.8));

        let low_heuristic = assign_confidence(finding(
            "a.java",
            3,
            Severity::Low,
            Category::Style,
            "heuristic.magic-numbers",
        ));
        assert!((low_heuristic.confidence.unwrap() - 0.45).abs() < 1e-6);

        let mut supplied = finding("a.java", 4, Severity::Low, Category::Style, "llm");
        supplied.confidence = Some(7.0);
        assert_eq!(assign_confidence(supplied).confidence, Some(1.0));
    }

    #[tokio::test]
    async fn test_file_context_filter() {
        let ctx = empty_ctx();
        let input = vec![
            finding(
                "src/test/CalcTest.java",
                5,
                Severity::Low,
                Category::Documentation,
                "llm",
            ),
            finding(
                "src/test/CalcTest.java",
                9,
                Severity::High,
                Category::Security,
                "llm",
            ),
            finding("src/Calc.java", 5, Severity::Low, Category::Documentation, "llm"),
        ];
        let out = normalize(input, &ctx, MergeBackend::Template).await;
        // The test file keeps only the high-severity security finding; the
        // non-test file keeps its documentation finding.
        assert_eq!(out.len(), 2);
        assert!(out.iter().any(|f| f.file == "src/test/CalcTest.java"
            && f.category == Category::Security));
        assert!(out.iter().any(|f| f.file == "src/Calc.java"));
    }

    #[tokio::test]
    async fn cross_test_file_duplicates_are_dropped() {
        let ctx = empty_ctx();
        let mut dup = finding(
            "src/test/ATest.java",
            3,
            Severity::Medium,
            Category::Duplicate,
            "duplicates",
        );
        dup.related = vec![
            SymbolRef {
                file: "src/test/ATest.java".into(),
                name: "x".into(),
                line: 3,
            },
            SymbolRef {
                file: "src/test/BTest.java".into(),
                name: "y".into(),
                line: 8,
            },
        ];
        let out = normalize(vec![dup], &ctx, MergeBackend::Template).await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn dedup_keeps_exactly_one_per_location() {
        let ctx = empty_ctx();
        let input = vec![
            finding("Calculator.java", 17, Severity::High, Category::Security, "llm"),
            finding("Calculator.java", 17, Severity::Medium, Category::Style, "llm"),
            finding("Calculator.java", 17, Severity::Low, Category::Style, "llm"),
            finding("Calculator.java", 20, Severity::Low, Category::Correctness, "llm"),
        ];
        let out = normalize(input, &ctx, MergeBackend::Template).await;
        let at_17: Vec<&Finding> = out
            .iter()
            .filter(|f| f.file == "Calculator.java" && f.line == 17)
            .collect();
        assert_eq!(at_17.len(), 1);
        let merged = at_17[0];
        assert_eq!(merged.severity, Severity::High);
        assert!(merged.message.contains("security"));
        assert!(merged.message.contains("style"));
        assert!(merged.confidence.is_some());
    }

    #[tokio::test]
    async fn output_is_sorted_and_fully_confident() {
        let ctx = empty_ctx();
        let input = vec![
            finding("b.java", 9, Severity::Low, Category::Style, "llm"),
            finding("a.java", 3, Severity::High, Category::Security, "llm"),
            finding("a.java", 1, Severity::Low, Category::Style, "llm"),
        ];
        let out = normalize(input, &ctx, MergeBackend::Template).await;
        let keys: Vec<(String, u32)> = out.iter().map(|f| (f.file.clone(), f.line)).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert!(out.iter().all(|f| f.confidence.is_some()));
    }
}
