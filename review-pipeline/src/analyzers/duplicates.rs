//! Duplicate detection: within-PR pairs and PR-vs-index similarity.
//!
//! Within-PR compares every pair of kind-aligned PR symbols: by embedding
//! cosine when phase 0.2 produced vectors, by token Jaccard otherwise.
//! Cross-repo runs `query_top_k(k=5)` against the store snapshot, excluding
//! the symbol's own file.
//!
//! Hard filters (both-test-files, `unknown` names, documentation files,
//! self-matches) are applied before a match is emitted. Output is ordered
//! by descending similarity, ties broken by lexicographic file path.

use std::collections::BTreeSet;

use code_symbols::Symbol;
use tracing::debug;
use vector_index::{StoreFilter, cosine};

use crate::context::{AnalysisContext, is_doc_file, is_test_file};
use crate::findings::{
    Category, DuplicateMatch, DuplicateScope, DuplicateSymbol, Finding, Severity, SymbolRef,
};

/// Analyzer id recorded on findings.
pub const SOURCE_ID: &str = "duplicates";

/// Top-k for cross-repo queries.
const CROSS_REPO_K: usize = 5;

/// Bodies shorter than this many tokens are ignored (trivial accessors).
const MIN_BODY_TOKENS: usize = 10;

/// Detects duplicate pairs among the PR's own symbols.
pub fn within_pr(ctx: &AnalysisContext) -> Vec<DuplicateMatch> {
    let symbols: Vec<&Symbol> = ctx
        .pr_symbols()
        .filter(|s| s.kind.is_callable())
        .filter(|s| eligible(s))
        .collect();

    let mut out = Vec::new();
    for (i, a) in symbols.iter().enumerate() {
        for b in symbols.iter().skip(i + 1) {
            if a.kind != b.kind {
                continue;
            }
            if a.identity_key() == b.identity_key() {
                continue;
            }
            if is_test_file(&a.file) && is_test_file(&b.file) {
                continue;
            }

            let similarity = match (ctx.vector_for(a), ctx.vector_for(b)) {
                (Some(va), Some(vb)) => cosine(va, vb),
                _ => jaccard(&a.body, &b.body),
            };
            if similarity >= ctx.similarity_threshold {
                out.push(DuplicateMatch {
                    a: to_side(a),
                    b: to_side(b),
                    similarity,
                    scope: DuplicateScope::WithinPr,
                    advisory: ctx.vectors_are_fallback,
                });
            }
        }
    }
    sort_matches(&mut out);
    debug!("within-PR duplicates: {}", out.len());
    out
}

/// Queries the index snapshot for each PR symbol.
pub fn cross_repo(ctx: &AnalysisContext) -> Vec<DuplicateMatch> {
    let Some(store) = &ctx.index else {
        return Vec::new();
    };

    let mut out = Vec::new();
    let mut seen: BTreeSet<(String, String)> = BTreeSet::new();

    for symbol in ctx.pr_symbols().filter(|s| s.kind.is_callable()) {
        if !eligible(symbol) {
            continue;
        }
        let Some(vector) = ctx.vector_for(symbol) else {
            continue;
        };
        let filter = StoreFilter {
            exclude_file: Some(symbol.file.clone()),
            ..Default::default()
        };
        for (record, score) in store.query_top_k(vector, CROSS_REPO_K, &filter) {
            if score < ctx.similarity_threshold {
                continue;
            }
            // Category alignment applies to both modes.
            if record.kind != symbol.kind {
                continue;
            }
            if record.name == "unknown" || record.name.is_empty() {
                continue;
            }
            if is_test_file(&symbol.file) && is_test_file(&record.file) {
                continue;
            }
            if is_doc_file(&record.file) {
                continue;
            }
            let key = (symbol.identity_key(), record.id.clone());
            if !seen.insert(key) {
                continue;
            }
            out.push(DuplicateMatch {
                a: to_side(symbol),
                b: DuplicateSymbol {
                    file: record.file.clone(),
                    name: record.name.clone(),
                    kind: record.kind,
                    start_line: record.start_line,
                },
                similarity: score,
                scope: DuplicateScope::CrossRepo,
                advisory: ctx.vectors_are_fallback,
            });
        }
    }
    sort_matches(&mut out);
    debug!("cross-repo duplicates: {}", out.len());
    out
}

/// Renders matches into findings (category `duplicate`).
pub fn to_findings(matches: &[DuplicateMatch]) -> Vec<Finding> {
    matches
        .iter()
        .map(|m| {
            let pct = (m.similarity * 100.0).round() as u32;
            let where_ = match m.scope {
                DuplicateScope::WithinPr => "elsewhere in this PR",
                DuplicateScope::CrossRepo => "in the existing codebase",
            };
            let advisory_note = if m.advisory {
                " (approximate match from the local similarity fallback)"
            } else {
                ""
            };
            Finding {
                file: m.a.file.clone(),
                line: m.a.start_line,
                severity: Severity::Medium,
                category: Category::Duplicate,
                message: format!(
                    "`{}` is {pct}% similar to `{}` in `{}` {where_}{advisory_note}; consider extracting a shared helper.",
                    m.a.name, m.b.name, m.b.file
                ),
                suggestion: None,
                // Advisory (hash fallback) matches get reduced confidence.
                confidence: if m.advisory { Some(0.5) } else { None },
                source: SOURCE_ID.to_string(),
                related: vec![
                    SymbolRef {
                        file: m.a.file.clone(),
                        name: m.a.name.clone(),
                        line: m.a.start_line,
                    },
                    SymbolRef {
                        file: m.b.file.clone(),
                        name: m.b.name.clone(),
                        line: m.b.start_line,
                    },
                ],
            }
        })
        .collect()
}

fn eligible(s: &Symbol) -> bool {
    if s.name == "unknown" || s.name.is_empty() {
        return false;
    }
    if is_doc_file(&s.file) {
        return false;
    }
    token_count(&s.body) >= MIN_BODY_TOKENS
}

fn to_side(s: &Symbol) -> DuplicateSymbol {
    DuplicateSymbol {
        file: s.file.clone(),
        name: s.name.clone(),
        kind: s.kind,
        start_line: s.start_line,
    }
}

fn sort_matches(out: &mut [DuplicateMatch]) {
    out.sort_by(|x, y| {
        y.similarity
            .partial_cmp(&x.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| x.a.file.cmp(&y.a.file))
            .then_with(|| x.b.file.cmp(&y.b.file))
    });
}

fn token_count(body: &str) -> usize {
    tokens(body).count()
}

fn tokens(body: &str) -> impl Iterator<Item = String> + '_ {
    body.split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
        .map(str::to_ascii_lowercase)
}

/// Normalized token-set Jaccard over the two bodies.
fn jaccard(a: &str, b: &str) -> f32 {
    let sa: BTreeSet<String> = tokens(a).collect();
    let sb: BTreeSet<String> = tokens(b).collect();
    if sa.is_empty() || sb.is_empty() {
        return 0.0;
    }
    let inter = sa.intersection(&sb).count() as f32;
    let union = sa.union(&sb).count() as f32;
    inter / union
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jaccard_identical_is_one() {
        let body = "int total(int tax) { return subtotal() * tax; }";
        assert!((jaccard(body, body) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn jaccard_disjoint_is_zero() {
        assert_eq!(jaccard("alpha beta", "gamma delta"), 0.0);
    }

    #[test]
    fn matches_sort_by_similarity_then_path() {
        let side = |file: &str| DuplicateSymbol {
            file: file.into(),
            name: "f".into(),
            kind: code_symbols::SymbolKind::Method,
            start_line: 1,
        };
        let mk = |file: &str, sim: f32| DuplicateMatch {
            a: side(file),
            b: side("other.java"),
            similarity: sim,
            scope: DuplicateScope::WithinPr,
            advisory: false,
        };
        let mut v = vec![mk("b.java", 0.9), mk("a.java", 0.9), mk("c.java", 0.95)];
        sort_matches(&mut v);
        assert_eq!(v[0].a.file, "c.java");
        assert_eq!(v[1].a.file, "a.java");
        assert_eq!(v[2].a.file, "b.java");
    }

    #[test]
    fn advisory_matches_carry_reduced_confidence() {
        let m = DuplicateMatch {
            a: DuplicateSymbol {
                file: "a.java".into(),
                name: "f".into(),
                kind: code_symbols::SymbolKind::Method,
                start_line: 4,
            },
            b: DuplicateSymbol {
                file: "b.java".into(),
                name: "g".into(),
                kind: code_symbols::SymbolKind::Method,
                start_line: 9,
            },
            similarity: 0.9,
            scope: DuplicateScope::CrossRepo,
            advisory: true,
        };
        let f = &to_findings(&[m])[0];
        assert_eq!(f.confidence, Some(0.5));
        assert!(f.message.contains("approximate"));
        assert_eq!(f.related.len(), 2);
    }
}
