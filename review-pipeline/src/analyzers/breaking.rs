//! Breaking-change detection against a baseline symbol set.
//!
//! Baseline preference: the persisted index for `(repo, base_branch)` when
//! present, else a fresh extraction of the base-branch versions of the
//! changed files. PR and baseline symbols are matched purely by
//! `(file, name)` identity.
//!
//! Visibility comparison uses the structured tiers, never surface text, so
//! a report can never show identical Before/After for a visibility change.

use std::collections::{BTreeMap, HashMap};

use code_symbols::{Symbol, parse_source};
use regex::Regex;
use tracing::{debug, warn};
use vector_index::VectorStore;

use crate::context::{AnalysisContext, BaselineSymbol};
use crate::findings::{
    BreakingChange, BreakingKind, Category, Finding, Severity, SymbolRef,
};

/// Analyzer id recorded on findings.
pub const SOURCE_ID: &str = "breaking-change";

/// Flattens the index scope into baseline symbols.
pub fn baseline_from_index(
    store: &VectorStore,
    repository: &str,
    base_branch: &str,
) -> Vec<BaselineSymbol> {
    store
        .scope(repository, base_branch)
        .into_iter()
        .map(|r| BaselineSymbol {
            file: r.file.clone(),
            name: r.name.clone(),
            kind: r.kind,
            signature: r.signature.clone(),
            snippet: r.snippet.clone(),
        })
        .collect()
}

/// Extracts baseline symbols from base-branch file contents.
pub fn baseline_from_files(base_contents: &BTreeMap<String, String>) -> Vec<BaselineSymbol> {
    let mut out = Vec::new();
    for (path, content) in base_contents {
        match parse_source(path, content) {
            Ok(parsed) => out.extend(parsed.symbols.into_iter().map(|s| BaselineSymbol {
                file: s.file,
                name: s.name,
                kind: s.kind,
                signature: s.signature,
                snippet: s.body,
            })),
            Err(e) => warn!("baseline extraction failed for {path} ({e})"),
        }
    }
    out
}

/// Diffs the baseline against the PR symbols.
pub fn detect(ctx: &AnalysisContext) -> Vec<BreakingChange> {
    if ctx.baseline.is_empty() {
        return Vec::new();
    }

    // PR symbols by (file, name); overloads collapse to the first seen.
    let mut pr_map: HashMap<(&str, &str), &Symbol> = HashMap::new();
    for s in ctx.pr_symbols() {
        pr_map.entry((s.file.as_str(), s.name.as_str())).or_insert(s);
    }

    // Only baseline symbols in files this PR actually touches are in play.
    let changed: Vec<&str> = ctx.bundle.changes.files.iter().map(|f| f.path.as_str()).collect();

    let mut out = Vec::new();
    for base in &ctx.baseline {
        if !changed.contains(&base.file.as_str()) {
            continue;
        }
        match pr_map.get(&(base.file.as_str(), base.name.as_str())) {
            None => {
                out.push(BreakingChange {
                    kind: BreakingKind::Removal,
                    file: base.file.clone(),
                    name: base.name.clone(),
                    before: base.signature.clone(),
                    after: None,
                    impacted_callsites: callsites(&base.name, ctx),
                });
            }
            Some(sym) => {
                let before = &base.signature;
                let after = &sym.signature;
                let kind = if before.parameter_key() != after.parameter_key() {
                    Some(BreakingKind::Signature)
                } else if before.return_type != after.return_type {
                    Some(BreakingKind::ReturnType)
                } else if before.visibility != after.visibility {
                    Some(BreakingKind::Visibility)
                } else {
                    None
                };
                if let Some(kind) = kind {
                    out.push(BreakingChange {
                        kind,
                        file: base.file.clone(),
                        name: base.name.clone(),
                        before: before.clone(),
                        after: Some(after.clone()),
                        impacted_callsites: callsites(&base.name, ctx),
                    });
                }
            }
        }
    }

    debug!("breaking changes: {}", out.len());
    out
}

/// Textual `name(` occurrences across PR file contents and index snippets.
///
/// The symbol's own declaration lines are excluded.
fn callsites(name: &str, ctx: &AnalysisContext) -> Vec<(String, u32)> {
    let Ok(re) = Regex::new(&format!(r"\b{}\s*\(", regex::escape(name))) else {
        return Vec::new();
    };

    let mut out = Vec::new();

    // Declaration lines of symbols with this name, to exclude.
    let decl_lines: Vec<(&str, u32)> = ctx
        .pr_symbols()
        .filter(|s| s.name == name)
        .map(|s| (s.file.as_str(), s.start_line))
        .collect();

    for (path, content) in &ctx.file_contents {
        for (i, line) in content.lines().enumerate() {
            let line_no = i as u32 + 1;
            if !re.is_match(line) {
                continue;
            }
            if decl_lines
                .iter()
                .any(|(f, l)| *f == path.as_str() && *l == line_no)
            {
                continue;
            }
            out.push((path.clone(), line_no));
        }
    }

    if let Some(store) = &ctx.index {
        for record in store.records() {
            // A record for the symbol itself is its definition, not a call.
            if record.name == name {
                continue;
            }
            for (i, line) in record.snippet.lines().enumerate() {
                if re.is_match(line) {
                    out.push((record.file.clone(), record.start_line + i as u32));
                }
            }
        }
    }

    out.sort();
    out.dedup();
    out
}

/// Renders breaking changes into findings (category `breaking-change`).
pub fn to_findings(changes: &[BreakingChange], ctx: &AnalysisContext) -> Vec<Finding> {
    changes
        .iter()
        .map(|c| {
            let (severity, what) = match c.kind {
                BreakingKind::Removal => (Severity::High, "was removed".to_string()),
                BreakingKind::Visibility => {
                    let after = c.after.as_ref().expect("visibility diff has after");
                    if c.before.visibility.narrows_to(after.visibility) {
                        (
                            Severity::High,
                            format!(
                                "visibility narrowed from {:?} to {:?}",
                                c.before.visibility, after.visibility
                            ),
                        )
                    } else {
                        (
                            Severity::Low,
                            format!(
                                "visibility widened from {:?} to {:?}",
                                c.before.visibility, after.visibility
                            ),
                        )
                    }
                }
                BreakingKind::Signature => {
                    let after = c.after.as_ref().expect("signature diff has after");
                    (
                        Severity::Medium,
                        format!(
                            "parameter list changed from `({})` to `({})`",
                            c.before.parameter_key(),
                            after.parameter_key()
                        ),
                    )
                }
                BreakingKind::ReturnType => {
                    let after = c.after.as_ref().expect("return diff has after");
                    (
                        Severity::Medium,
                        format!(
                            "return type changed from `{}` to `{}`",
                            c.before.return_type.as_deref().unwrap_or("()"),
                            after.return_type.as_deref().unwrap_or("()")
                        ),
                    )
                }
            };

            let line = ctx
                .symbols_for(&c.file)
                .iter()
                .find(|s| s.name == c.name)
                .map(|s| s.start_line)
                .unwrap_or(1);

            let callers = if c.impacted_callsites.is_empty() {
                String::new()
            } else {
                format!(
                    " Impacted call sites: {}.",
                    c.impacted_callsites
                        .iter()
                        .take(5)
                        .map(|(f, l)| format!("`{f}:{l}`"))
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            };

            Finding {
                file: c.file.clone(),
                line,
                severity,
                category: Category::BreakingChange,
                message: format!("`{}` {what}; external callers can break.{callers}", c.name),
                suggestion: None,
                confidence: None,
                source: SOURCE_ID.to_string(),
                related: c
                    .impacted_callsites
                    .iter()
                    .take(10)
                    .map(|(f, l)| SymbolRef {
                        file: f.clone(),
                        name: c.name.clone(),
                        line: *l,
                    })
                    .collect(),
            }
        })
        .collect()
}
