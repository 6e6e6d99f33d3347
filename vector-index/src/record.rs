//! Persisted embedding record.

use std::collections::BTreeMap;

use code_symbols::{Signature, Symbol, SymbolKind};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One `(symbol, vector)` row of the store.
///
/// Identity is the scope-qualified symbol key; re-upserting the same id
/// replaces the previous row ("last line wins" on load keeps appends safe).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Stable id: sha256 of `repository:branch:file#kind#name#start_line`.
    pub id: String,
    pub repository: String,
    pub branch: String,
    pub file: String,
    pub name: String,
    pub kind: SymbolKind,
    pub start_line: u32,
    pub end_line: u32,
    /// Structured signature snapshot for breaking-change baselines.
    pub signature: Signature,
    /// Clamped body text for textual similarity and callsite scans.
    pub snippet: String,
    pub dim: usize,
    pub vector: Vec<f32>,
    /// Freeform metadata (language tag etc.).
    #[serde(default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl EmbeddingRecord {
    /// Builds a record from a symbol plus its scope and vector.
    pub fn from_symbol(
        repository: &str,
        branch: &str,
        symbol: &Symbol,
        vector: Vec<f32>,
        snippet_max_chars: usize,
    ) -> Self {
        let id = Self::stable_id(repository, branch, symbol);
        let snippet = clamp_chars(&symbol.body, snippet_max_chars);
        let mut extra = BTreeMap::new();
        extra.insert(
            "language".to_string(),
            serde_json::Value::String(symbol.language.tag().to_string()),
        );
        extra.insert(
            "qualified_name".to_string(),
            serde_json::Value::String(symbol.qualified_name.clone()),
        );
        Self {
            id,
            repository: repository.to_string(),
            branch: branch.to_string(),
            file: symbol.file.clone(),
            name: symbol.name.clone(),
            kind: symbol.kind,
            start_line: symbol.start_line,
            end_line: symbol.end_line,
            signature: symbol.signature.clone(),
            snippet,
            dim: vector.len(),
            vector,
            extra,
        }
    }

    /// Content-stable id for a symbol under a repository/branch scope.
    pub fn stable_id(repository: &str, branch: &str, symbol: &Symbol) -> String {
        let mut hasher = Sha256::new();
        hasher.update(repository.as_bytes());
        hasher.update(b":");
        hasher.update(branch.as_bytes());
        hasher.update(b":");
        hasher.update(symbol.identity_key().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

fn clamp_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.chars().take(max_chars).collect::<String>() + "…"
}

#[cfg(test)]
mod tests {
    use super::*;
    use code_symbols::{Language, ParseQuality, Parameter, Visibility};

    fn sample_symbol() -> Symbol {
        Symbol {
            file: "src/A.java".into(),
            language: Language::Java,
            kind: SymbolKind::Method,
            name: "run".into(),
            qualified_name: "A.run".into(),
            signature: Signature {
                name: "run".into(),
                parameters: vec![Parameter {
                    name: "x".into(),
                    type_name: Some("int".into()),
                }],
                return_type: Some("void".into()),
                visibility: Visibility::Public,
                modifiers: vec![],
                text: "public void run(int x)".into(),
            },
            body: "public void run(int x) {}".into(),
            start_line: 3,
            end_line: 3,
            calls: vec![],
            parse_quality: ParseQuality::Full,
        }
    }

    #[test]
    fn stable_id_is_deterministic_and_scope_sensitive() {
        let s = sample_symbol();
        let a = EmbeddingRecord::stable_id("acme/app", "main", &s);
        let b = EmbeddingRecord::stable_id("acme/app", "main", &s);
        let c = EmbeddingRecord::stable_id("acme/app", "dev", &s);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn record_round_trips_through_json() {
        let s = sample_symbol();
        let r = EmbeddingRecord::from_symbol("acme/app", "main", &s, vec![0.1, 0.2], 4000);
        let json = serde_json::to_string(&r).unwrap();
        let back: EmbeddingRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, r.id);
        assert_eq!(back.vector, r.vector);
        assert_eq!(back.signature, r.signature);
    }
}
