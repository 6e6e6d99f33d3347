//! Declarative architecture rules: naming per symbol kind, forbidden
//! imports between layers, file placement.
//!
//! Rules are plain data so a deployment can swap the defaults without
//! touching the engine. Every violation becomes a finding with category
//! `architecture` and source `architecture`.

use code_symbols::{Language, Symbol, SymbolKind};
use tracing::debug;

use crate::context::{AnalysisContext, is_test_file};
use crate::findings::{Category, Finding, Severity, SymbolRef};

/// Analyzer id recorded on findings.
pub const SOURCE_ID: &str = "architecture";

/// Casing conventions the naming rules can demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameStyle {
    PascalCase,
    CamelCase,
    SnakeCase,
}

impl NameStyle {
    pub fn matches(self, name: &str) -> bool {
        let core = name.trim_start_matches('_').trim_start_matches('#');
        if core.is_empty() {
            return true;
        }
        match self {
            Self::PascalCase => {
                core.chars().next().is_some_and(|c| c.is_ascii_uppercase())
                    && !core.contains('_')
            }
            Self::CamelCase => {
                core.chars().next().is_some_and(|c| c.is_ascii_lowercase())
                    && !core.contains('_')
            }
            Self::SnakeCase => core
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::PascalCase => "PascalCase",
            Self::CamelCase => "camelCase",
            Self::SnakeCase => "snake_case",
        }
    }
}

/// Naming convention for one symbol kind, optionally per language.
#[derive(Debug, Clone)]
pub struct NamingRule {
    pub kind: SymbolKind,
    pub style: NameStyle,
    /// `None` applies to every language.
    pub languages: Option<Vec<Language>>,
}

/// Layer isolation: files under `from_prefix` must not import targets
/// containing `forbidden_fragment`.
#[derive(Debug, Clone)]
pub struct ImportRule {
    pub from_prefix: String,
    pub forbidden_fragment: String,
    pub reason: String,
}

/// File placement: files whose name matches `filename_marker` must live
/// under a path containing `required_fragment`.
#[derive(Debug, Clone)]
pub struct PlacementRule {
    pub filename_marker: String,
    pub required_fragment: String,
    pub reason: String,
}

/// The full declarative rule list.
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub naming: Vec<NamingRule>,
    pub imports: Vec<ImportRule>,
    pub placement: Vec<PlacementRule>,
}

impl Default for RuleSet {
    fn default() -> Self {
        let camel_langs = vec![Language::Java, Language::TypeScript, Language::JavaScript];
        let snake_langs = vec![Language::Python, Language::Rust];
        Self {
            naming: vec![
                NamingRule {
                    kind: SymbolKind::Class,
                    style: NameStyle::PascalCase,
                    languages: None,
                },
                NamingRule {
                    kind: SymbolKind::Enum,
                    style: NameStyle::PascalCase,
                    languages: None,
                },
                NamingRule {
                    kind: SymbolKind::Method,
                    style: NameStyle::CamelCase,
                    languages: Some(camel_langs.clone()),
                },
                NamingRule {
                    kind: SymbolKind::Function,
                    style: NameStyle::CamelCase,
                    languages: Some(camel_langs),
                },
                NamingRule {
                    kind: SymbolKind::Method,
                    style: NameStyle::SnakeCase,
                    languages: Some(snake_langs.clone()),
                },
                NamingRule {
                    kind: SymbolKind::Function,
                    style: NameStyle::SnakeCase,
                    languages: Some(snake_langs),
                },
            ],
            imports: Vec::new(),
            placement: vec![PlacementRule {
                filename_marker: ".test.".into(),
                required_fragment: "test".into(),
                reason: "test files belong under a test directory".into(),
            }],
        }
    }
}

/// Applies the rule list to the PR symbols and imports.
pub fn apply(ctx: &AnalysisContext, rules: &RuleSet) -> Vec<Finding> {
    let mut out = Vec::new();

    for symbol in ctx.pr_symbols() {
        // Only symbols this PR actually introduces or touches.
        if !span_touches_changes(ctx, symbol) {
            continue;
        }
        for rule in &rules.naming {
            if rule.kind != symbol.kind {
                continue;
            }
            if let Some(langs) = &rule.languages {
                if !langs.contains(&symbol.language) {
                    continue;
                }
            }
            if naming_exempt(symbol) {
                continue;
            }
            if !rule.style.matches(&symbol.name) {
                out.push(Finding {
                    file: symbol.file.clone(),
                    line: symbol.start_line,
                    severity: Severity::Low,
                    category: Category::Architecture,
                    message: format!(
                        "`{}` does not follow the {} convention for {}s.",
                        symbol.name,
                        rule.style.label(),
                        kind_word(symbol.kind)
                    ),
                    suggestion: None,
                    confidence: None,
                    source: SOURCE_ID.to_string(),
                    related: vec![SymbolRef {
                        file: symbol.file.clone(),
                        name: symbol.name.clone(),
                        line: symbol.start_line,
                    }],
                });
                break;
            }
        }
    }

    for (path, parsed) in &ctx.pr_files {
        for rule in &rules.imports {
            if !path.starts_with(&rule.from_prefix) {
                continue;
            }
            for import in &parsed.imports {
                if import.target.contains(&rule.forbidden_fragment) {
                    out.push(Finding {
                        file: path.clone(),
                        line: import.line,
                        severity: Severity::Medium,
                        category: Category::Architecture,
                        message: format!(
                            "`{}` must not import `{}`: {}.",
                            rule.from_prefix, import.target, rule.reason
                        ),
                        suggestion: None,
                        confidence: None,
                        source: SOURCE_ID.to_string(),
                        related: vec![],
                    });
                }
            }
        }

        for rule in &rules.placement {
            let filename = path.rsplit('/').next().unwrap_or(path);
            // Only the directory part counts; the marker itself would
            // otherwise satisfy the required fragment.
            let dir = &path[..path.len() - filename.len()];
            if filename.contains(&rule.filename_marker) && !dir.contains(&rule.required_fragment)
            {
                out.push(Finding {
                    file: path.clone(),
                    line: 1,
                    severity: Severity::Medium,
                    category: Category::Architecture,
                    message: format!("`{path}` is misplaced: {}.", rule.reason),
                    suggestion: None,
                    confidence: None,
                    source: SOURCE_ID.to_string(),
                    related: vec![],
                });
            }
        }
    }

    debug!("architecture violations: {}", out.len());
    out
}

fn span_touches_changes(ctx: &AnalysisContext, symbol: &Symbol) -> bool {
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

/// Constructors, dunder methods and test helpers are exempt from naming.
fn naming_exempt(symbol: &Symbol) -> bool {
    if symbol.name.starts_with("__") && symbol.name.ends_with("__") {
        return true;
    }
    // Java/TS constructors carry the class name.
    if symbol.kind == SymbolKind::Method {
        if let Some(owner) = symbol.qualified_name.rsplit('.').nth(1) {
            if owner == symbol.name {
                return true;
            }
        }
    }
    if is_test_file(&symbol.file) {
        return true;
    }
    false
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
    fn style_matchers() {
        assert!(NameStyle::PascalCase.matches("InvoiceBuilder"));
        assert!(!NameStyle::PascalCase.matches("invoiceBuilder"));
        assert!(!NameStyle::PascalCase.matches("Invoice_Builder"));
        assert!(NameStyle::CamelCase.matches("totalWithTax"));
        assert!(!NameStyle::CamelCase.matches("TotalWithTax"));
        assert!(!NameStyle::CamelCase.matches("total_with_tax"));
        assert!(NameStyle::SnakeCase.matches("total_with_tax"));
        assert!(!NameStyle::SnakeCase.matches("totalWithTax"));
    }

    #[test]
    fn leading_underscores_are_tolerated() {
        assert!(NameStyle::SnakeCase.matches("_private_helper"));
        assert!(NameStyle::CamelCase.matches("_cached"));
    }
}
