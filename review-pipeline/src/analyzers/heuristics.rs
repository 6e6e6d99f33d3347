//! Deterministic heuristic passes.
//!
//! Bounded set: swallowed exceptions, missing logging at error boundaries,
//! missing docs on public symbols, excessive nesting, magic numbers, long
//! methods. Each pass tags its own source id (`heuristic.<name>`) so the
//! normalizer can filter by context, and only fires on lines/symbols the
//! PR actually changed.

use code_symbols::{Language, SymbolKind, Visibility};
use regex::Regex;
use tracing::debug;

use crate::context::AnalysisContext;
use crate::findings::{Category, Finding, Severity};

/// Nesting depth beyond which a callable is flagged.
const MAX_NESTING: usize = 4;

/// Line count beyond which a callable is flagged as long.
const MAX_METHOD_LINES: u32 = 60;

/// Runs every pass and concatenates the findings.
pub fn run_all(ctx: &AnalysisContext) -> Vec<Finding> {
    let mut out = Vec::new();
    out.extend(swallowed_exceptions(ctx));
    out.extend(missing_error_logging(ctx));
    out.extend(missing_docs(ctx));
    out.extend(deep_nesting(ctx));
    out.extend(magic_numbers(ctx));
    out.extend(long_methods(ctx));
    debug!("heuristic findings: {}", out.len());
    out
}

fn make(
    source: &str,
    file: &str,
    line: u32,
    severity: Severity,
    category: Category,
    message: String,
) -> Finding {
    Finding {
        file: file.to_string(),
        line,
        severity,
        category,
        message,
        suggestion: None,
        confidence: None,
        source: format!("heuristic.{source}"),
        related: vec![],
    }
}

/// Empty catch/except blocks on changed lines.
pub fn swallowed_exceptions(ctx: &AnalysisContext) -> Vec<Finding> {
    let brace_re = Regex::new(r"(?s)catch\s*(?:\([^)]*\))?\s*\{\s*\}").unwrap();
    let py_re = Regex::new(r"(?m)^[ \t]*except[^\n:]*:[ \t]*\n[ \t]*pass\b").unwrap();

    let mut out = Vec::new();
    for (path, content) in &ctx.file_contents {
        let re = if path.ends_with(".py") { &py_re } else { &brace_re };
        for m in re.find_iter(content) {
            let line = line_of_offset(content, m.start());
            if !ctx.changed_lines.contains(path, line) {
                continue;
            }
            out.push(make(
                "swallowed-exceptions",
                path,
                line,
                Severity::Medium,
                Category::Correctness,
                "Exception is swallowed silently; handle it or rethrow with context.".into(),
            ));
        }
    }
    out
}

/// Catch blocks without any logging call inside.
pub fn missing_error_logging(ctx: &AnalysisContext) -> Vec<Finding> {
    let catch_re = Regex::new(r"(?s)catch\s*(?:\([^)]*\))?\s*\{([^{}]*)\}").unwrap();
    let log_token = Regex::new(r"(?i)\b(log|logger|console|tracing|print|warn|error)\b").unwrap();

    let mut out = Vec::new();
    for (path, content) in &ctx.file_contents {
        if path.ends_with(".py") {
            continue; // the swallowed-exceptions pass covers `except: pass`
        }
        for caps in catch_re.captures_iter(content) {
            let body = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            if body.trim().is_empty() || log_token.is_match(body) {
                continue;
            }
            let line = line_of_offset(content, caps.get(0).map(|m| m.start()).unwrap_or(0));
            if !ctx.changed_lines.contains(path, line) {
                continue;
            }
            out.push(make(
                "missing-error-logging",
                path,
                line,
                Severity::Low,
                Category::Observability,
                "Error boundary handles the exception without logging it; add a log entry."
                    .into(),
            ));
        }
    }
    out
}

/// Public classes/methods/functions introduced without documentation.
pub fn missing_docs(ctx: &AnalysisContext) -> Vec<Finding> {
    let mut out = Vec::new();
    for symbol in ctx.pr_symbols() {
        if symbol.signature.visibility != Visibility::Public {
            continue;
        }
        if !matches!(
            symbol.kind,
            SymbolKind::Class | SymbolKind::Method | SymbolKind::Function
        ) {
            continue;
        }
        if !ctx.changed_lines.contains(&symbol.file, symbol.start_line) {
            continue;
        }
        let Some(content) = ctx.file_contents.get(&symbol.file) else {
            continue;
        };
        if has_doc_above(content, symbol.start_line) {
            continue;
        }
        out.push(make(
            "missing-docs",
            &symbol.file,
            symbol.start_line,
            Severity::Low,
            Category::Documentation,
            format!(
                "Public {} `{}` has no documentation.",
                kind_word(symbol.kind),
                symbol.name
            ),
        ));
    }
    out
}

/// Callables nested deeper than [`MAX_NESTING`].
pub fn deep_nesting(ctx: &AnalysisContext) -> Vec<Finding> {
    let mut out = Vec::new();
    for symbol in ctx.pr_symbols() {
        if !symbol.kind.is_callable() || !touches(ctx, symbol) {
            continue;
        }
        let depth = if symbol.language == Language::Python {
            max_indent_depth(&symbol.body)
        } else {
            max_brace_depth(&symbol.body)
        };
        if depth > MAX_NESTING {
            out.push(make(
                "deep-nesting",
                &symbol.file,
                symbol.start_line,
                Severity::Medium,
                Category::Style,
                format!(
                    "`{}` nests {depth} levels deep; extract the inner branches into helpers.",
                    symbol.name
                ),
            ));
        }
    }
    out
}

/// Bare numeric literals on changed lines.
pub fn magic_numbers(ctx: &AnalysisContext) -> Vec<Finding> {
    let num_re = Regex::new(r"\b\d{2,}\b").unwrap();
    let allowed = ["10", "100", "1000", "24", "60"];

    let mut out = Vec::new();
    for (path, content) in &ctx.file_contents {
        for (i, line) in content.lines().enumerate() {
            let line_no = i as u32 + 1;
            if !ctx.changed_lines.contains(path, line_no) {
                continue;
            }
            let lower = line.to_ascii_lowercase();
            // Constant declarations are the right place for literals.
            if lower.contains("const") || lower.contains("final") || lower.contains("static") {
                continue;
            }
            if let Some(m) = num_re.find(line) {
                if allowed.contains(&m.as_str()) {
                    continue;
                }
                out.push(make(
                    "magic-numbers",
                    path,
                    line_no,
                    Severity::Low,
                    Category::Style,
                    format!("Magic number `{}`; name it as a constant.", m.as_str()),
                ));
            }
        }
    }
    out
}

/// Callables longer than [`MAX_METHOD_LINES`].
pub fn long_methods(ctx: &AnalysisContext) -> Vec<Finding> {
    let mut out = Vec::new();
    for symbol in ctx.pr_symbols() {
        if !symbol.kind.is_callable() || !touches(ctx, symbol) {
            continue;
        }
        let len = symbol.end_line - symbol.start_line + 1;
        if len > MAX_METHOD_LINES {
            out.push(make(
                "long-methods",
                &symbol.file,
                symbol.start_line,
                Severity::Low,
                Category::Style,
                format!(
                    "`{}` is {len} lines long; split it into smaller units.",
                    symbol.name
                ),
            ));
        }
    }
    out
}

/* -------------------------------- helpers -------------------------------- */

fn touches(ctx: &AnalysisContext, symbol: &code_symbols::Symbol) -> bool {
    ctx.changed_lines
        .lines_for(&symbol.file)
        .map(|lines| {
            lines
                .range(symbol.start_line..=symbol.end_line)
                .next()
                .is_some()
        })
        .unwrap_or(false)
}

fn line_of_offset(content: &str, offset: usize) -> u32 {
    content[..offset.min(content.len())]
        .bytes()
        .filter(|b| *b == b'\n')
        .count() as u32
        + 1
}

fn has_doc_above(content: &str, start_line: u32) -> bool {
    if start_line <= 1 {
        return false;
    }
    let lines: Vec<&str> = content.lines().collect();
    let Some(above) = lines.get(start_line as usize - 2) else {
        return false;
    };
    let t = above.trim_start();
    t.starts_with("///")
        || t.starts_with("//!")
        || t.starts_with("/*")
        || t.starts_with('*')
        || t.starts_with("*/")
        || t.starts_with("\"\"\"")
        || t.starts_with('#')
        || t.starts_with("@")
}

fn max_brace_depth(body: &str) -> usize {
    let mut depth = 0usize;
    let mut max = 0usize;
    for c in body.chars() {
        match c {
            '{' => {
                depth += 1;
                max = max.max(depth);
            }
            '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    // The callable's own body braces do not count as nesting.
    max.saturating_sub(1)
}

fn max_indent_depth(body: &str) -> usize {
    body.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| (l.len() - l.trim_start().len()) / 4)
        .max()
        .unwrap_or(0)
        .saturating_sub(1)
}

fn kind_word(kind: SymbolKind) -> &'static str {
    match kind {
        SymbolKind::Class => "class",
        SymbolKind::Method => "method",
        SymbolKind::Function => "function",
        SymbolKind::Field => "field",
        SymbolKind::Enum => "enum",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brace_depth_ignores_the_outer_body() {
        let body = "void f() {\n  if (a) {\n    while (b) {\n      x();\n    }\n  }\n}";
        assert_eq!(max_brace_depth(body), 2);
    }

    #[test]
    fn indent_depth_for_python() {
        let body = "def f():\n    if a:\n        for b in c:\n            d()";
        assert_eq!(max_indent_depth(body), 2);
    }

    #[test]
    fn line_of_offset_is_one_indexed() {
        let s = "a\nb\nc";
        assert_eq!(line_of_offset(s, 0), 1);
        assert_eq!(line_of_offset(s, 2), 2);
        assert_eq!(line_of_offset(s, 4), 3);
    }

    #[test]
    fn doc_detection() {
        let content = "/// docs\nfn documented() {}\n\nfn bare() {}\n";
        assert!(has_doc_above(content, 2));
        assert!(!has_doc_above(content, 4));
    }
}
