//! Core finding model shared by every analyzer and the LLM reviewer.
//!
//! Severity input accepts both vocabularies seen in the wild
//! (critical/major/minor/nitpick and high/medium/low); everything is
//! normalized to High/Medium/Low. A finding's `confidence` is optional
//! until the normalizer runs; afterwards it is always set.

use code_symbols::{Signature, SymbolKind};
use serde::{Deserialize, Serialize};

/// Normalized severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    /// Sort weight; higher is more severe.
    pub fn weight(self) -> u8 {
        match self {
            Self::High => 3,
            Self::Medium => 2,
            Self::Low => 1,
        }
    }

    /// Accepts both severity vocabularies, case-insensitive.
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "critical" | "high" | "blocker" => Some(Self::High),
            "major" | "medium" => Some(Self::Medium),
            "minor" | "nitpick" | "low" | "info" => Some(Self::Low),
            _ => None,
        }
    }
}

/// Single-valued finding category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Security,
    Performance,
    Correctness,
    Style,
    Duplicate,
    BreakingChange,
    Architecture,
    Observability,
    Documentation,
    Test,
}

impl Category {
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "security" => Some(Self::Security),
            "performance" | "perf" => Some(Self::Performance),
            "correctness" | "bug" | "logic" => Some(Self::Correctness),
            "style" | "smell" => Some(Self::Style),
            "duplicate" | "duplication" => Some(Self::Duplicate),
            "breaking-change" | "breaking" => Some(Self::BreakingChange),
            "architecture" => Some(Self::Architecture),
            "observability" | "logging" => Some(Self::Observability),
            "documentation" | "docs" => Some(Self::Documentation),
            "test" | "testing" => Some(Self::Test),
            _ => None,
        }
    }

    /// Grouping used when messages are merged without an LLM:
    /// security → logic → smell → other.
    pub fn merge_rank(self) -> u8 {
        match self {
            Self::Security => 0,
            Self::Correctness | Self::BreakingChange => 1,
            Self::Style | Self::Duplicate => 2,
            _ => 3,
        }
    }
}

/// Reference to a symbol involved in a finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolRef {
    pub file: String,
    pub name: String,
    pub line: u32,
}

/// One structured review observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub file: String,
    /// 1-indexed head-side line.
    pub line: u32,
    pub severity: Severity,
    pub category: Category,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Set by the normalizer; `None` only before normalization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    /// Producing analyzer id (e.g. "llm", "fallback", "heuristic.magic-numbers").
    pub source: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related: Vec<SymbolRef>,
}

impl Finding {
    /// Sort key: `(file, line, -severity, -confidence)`.
    pub fn sort_key(&self) -> (String, u32, std::cmp::Reverse<u8>, std::cmp::Reverse<i64>) {
        let conf = (self.confidence.unwrap_or(0.0) * 1000.0) as i64;
        (
            self.file.clone(),
            self.line,
            std::cmp::Reverse(self.severity.weight()),
            std::cmp::Reverse(conf),
        )
    }

    /// True when produced by a non-LLM source whose confidence is
    /// discounted for low-severity output.
    pub fn from_fallback_or_heuristic(&self) -> bool {
        self.source == "fallback" || self.source.starts_with("heuristic.")
    }
}

/// Where a duplicate pair was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicateScope {
    WithinPr,
    CrossRepo,
}

/// One symbol side of a duplicate match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateSymbol {
    pub file: String,
    pub name: String,
    pub kind: SymbolKind,
    pub start_line: u32,
}

/// A similarity match at or above the configured threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateMatch {
    pub a: DuplicateSymbol,
    pub b: DuplicateSymbol,
    /// In `[0,1]`, `>= threshold` by construction.
    pub similarity: f32,
    pub scope: DuplicateScope,
    /// True when the vectors came from the hash fallback (advisory match).
    #[serde(default)]
    pub advisory: bool,
}

/// Kind of a detected breaking change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BreakingKind {
    Signature,
    ReturnType,
    Visibility,
    Removal,
}

/// A structural difference that can invalidate external callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakingChange {
    pub kind: BreakingKind,
    pub file: String,
    pub name: String,
    /// Baseline signature (index snapshot or base-branch extraction).
    pub before: Signature,
    /// Absent only for `Removal`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<Signature>,
    /// `(file, line)` of textual `name(` occurrences across PR + index.
    pub impacted_callsites: Vec<(String, u32)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_accepts_both_vocabularies() {
        assert_eq!(Severity::parse_lenient("critical"), Some(Severity::High));
        assert_eq!(Severity::parse_lenient("HIGH"), Some(Severity::High));
        assert_eq!(Severity::parse_lenient("major"), Some(Severity::Medium));
        assert_eq!(Severity::parse_lenient("medium"), Some(Severity::Medium));
        assert_eq!(Severity::parse_lenient("minor"), Some(Severity::Low));
        assert_eq!(Severity::parse_lenient("nitpick"), Some(Severity::Low));
        assert_eq!(Severity::parse_lenient("banana"), None);
    }

    #[test]
    fn category_kebab_serde() {
        let json = serde_json::to_string(&Category::BreakingChange).unwrap();
        assert_eq!(json, "\"breaking-change\"");
        assert_eq!(Category::parse_lenient("breaking_change"), Some(Category::BreakingChange));
    }

    #[test]
    fn sort_key_orders_by_severity_then_confidence() {
        let mk = |sev, conf: f32| Finding {
            file: "a.java".into(),
            line: 10,
            severity: sev,
            category: Category::Correctness,
            message: "m".into(),
            suggestion: None,
            confidence: Some(conf),
            source: "llm".into(),
            related: vec![],
        };
        let mut v = vec![
            mk(Severity::Low, 0.9),
            mk(Severity::High, 0.5),
            mk(Severity::High, 0.8),
        ];
        v.sort_by_key(|f| f.sort_key());
        assert_eq!(v[0].severity, Severity::High);
        assert_eq!(v[0].confidence, Some(0.8));
        assert_eq!(v[2].severity, Severity::Low);
    }
}
