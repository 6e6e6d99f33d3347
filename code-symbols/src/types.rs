//! Language-neutral symbol schema shared by the extractors, the index and
//! the analyzers.
//!
//! Conventions:
//! - Lines are 1-indexed; `start_line <= end_line` always holds.
//! - `serde(rename_all = "snake_case")` keeps serialized forms stable.
//! - Call names are unresolved; resolution (when needed) happens by key,
//!   never via in-memory references between symbol sets.

use serde::{Deserialize, Serialize};

use crate::lang::Language;

/// Symbol kind taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Class,
    Method,
    Function,
    Field,
    Enum,
}

impl SymbolKind {
    /// True for the kinds whose bodies are worth similarity analysis.
    pub fn is_callable(self) -> bool {
        matches!(self, Self::Method | Self::Function)
    }
}

/// Structured visibility tiers, ordered from most to least exposed.
///
/// Comparisons must go through [`Visibility::tier`]; surface text is never
/// compared (grammars render the same tier differently).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Package,
    Protected,
    Private,
}

impl Visibility {
    /// Numeric exposure tier: higher means more visible.
    pub fn tier(self) -> u8 {
        match self {
            Self::Public => 3,
            Self::Package => 2,
            Self::Protected => 1,
            Self::Private => 0,
        }
    }

    /// True when a change from `self` to `to` reduces exposure.
    pub fn narrows_to(self, to: Visibility) -> bool {
        to.tier() < self.tier()
    }
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub type_name: Option<String>,
}

/// Structured signature plus its textual rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    /// Always equals the owning symbol's `name`.
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub return_type: Option<String>,
    pub visibility: Visibility,
    /// Normalized modifier words (static, async, abstract, final, ...).
    pub modifiers: Vec<String>,
    /// First line of the declaration, clamped.
    pub text: String,
}

impl Signature {
    /// Comparable rendering of the parameter list (names + types).
    pub fn parameter_key(&self) -> String {
        self.parameters
            .iter()
            .map(|p| {
                p.type_name
                    .as_deref()
                    .map(|t| format!("{}: {}", p.name, t))
                    .unwrap_or_else(|| p.name.clone())
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Confidence in the extraction itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseQuality {
    Full,
    Low,
}

/// A named code entity extracted from one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    /// Repo-relative path of the defining file.
    pub file: String,
    pub language: Language,
    pub kind: SymbolKind,
    /// Leaf name (e.g. "save").
    pub name: String,
    /// Owner-qualified name (e.g. "Outer.Inner.save").
    pub qualified_name: String,
    pub signature: Signature,
    /// Full body text of the symbol span.
    pub body: String,
    /// 1-indexed span.
    pub start_line: u32,
    pub end_line: u32,
    /// Deduped unresolved callee names appearing in the body.
    pub calls: Vec<String>,
    pub parse_quality: ParseQuality,
}

impl Symbol {
    /// File-local identity key; the index prefixes repository/branch.
    pub fn identity_key(&self) -> String {
        format!(
            "{}#{}#{}#{}",
            self.file,
            kind_tag(self.kind),
            self.name,
            self.start_line
        )
    }
}

fn kind_tag(kind: SymbolKind) -> &'static str {
    match kind {
        SymbolKind::Class => "class",
        SymbolKind::Method => "method",
        SymbolKind::Function => "function",
        SymbolKind::Field => "field",
        SymbolKind::Enum => "enum",
    }
}

/// One import/use directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    /// Normalized target (module path or string source).
    pub target: String,
    pub line: u32,
}

/// Unresolved caller → callee edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallEdge {
    /// Qualified name of the enclosing symbol.
    pub caller: String,
    /// Callee leaf name.
    pub callee: String,
    pub line: u32,
}

/// Extraction result for one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedFile {
    pub path: String,
    pub language: Language,
    pub symbols: Vec<Symbol>,
    pub call_edges: Vec<CallEdge>,
    pub imports: Vec<Import>,
}

/// Returns a clamped first line of a declaration for signature text.
pub fn first_line(text: &str, max_chars: usize) -> String {
    let line = text.lines().next().unwrap_or("").trim();
    if line.chars().count() <= max_chars {
        return line.to_string();
    }
    line.chars().take(max_chars).collect::<String>() + "…"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visibility_tiers_order() {
        assert!(Visibility::Public.narrows_to(Visibility::Private));
        assert!(Visibility::Public.narrows_to(Visibility::Package));
        assert!(Visibility::Protected.narrows_to(Visibility::Private));
        assert!(!Visibility::Private.narrows_to(Visibility::Public));
        assert!(!Visibility::Public.narrows_to(Visibility::Public));
    }

    #[test]
    fn parameter_key_renders_types() {
        let sig = Signature {
            name: "f".into(),
            parameters: vec![
                Parameter {
                    name: "a".into(),
                    type_name: Some("int".into()),
                },
                Parameter {
                    name: "b".into(),
                    type_name: None,
                },
            ],
            return_type: None,
            visibility: Visibility::Public,
            modifiers: vec![],
            text: "f(a, b)".into(),
        };
        assert_eq!(sig.parameter_key(), "a: int, b");
    }

    #[test]
    fn first_line_clamps() {
        assert_eq!(first_line("abc\ndef", 10), "abc");
        assert_eq!(first_line(&"x".repeat(20), 5), "xxxxx…");
    }
}
