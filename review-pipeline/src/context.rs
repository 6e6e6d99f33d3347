//! Per-run analysis context.
//!
//! Owns every per-run collection: the PR bundle, head-side file contents,
//! parsed PR symbols, the baseline symbol set and the index snapshot.
//! Baseline and PR symbols live in independent collections and are only
//! ever compared by `(file, name)` key, never via cross-references.

use std::collections::{BTreeMap, HashMap};

use code_symbols::{ParsedFile, Signature, Symbol, SymbolKind, parse_source};
use platform_client::{ChangedLines, FileStatus, PrBundle};
use tracing::{debug, warn};
use vector_index::VectorStore;

/// One baseline symbol, flattened from either source.
#[derive(Debug, Clone)]
pub struct BaselineSymbol {
    pub file: String,
    pub name: String,
    pub kind: SymbolKind,
    pub signature: Signature,
    /// Body (fresh extraction) or clamped snippet (index).
    pub snippet: String,
}

/// Where the baseline came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaselineSource {
    /// Persisted index for `(repo, base_branch)`.
    Index,
    /// Fresh extraction of base-branch versions of the changed files.
    Fresh,
    /// No baseline available; breaking-change analysis is skipped.
    Unavailable,
}

/// Everything the analyzers and the LLM reviewer consume.
#[derive(Debug)]
pub struct AnalysisContext {
    pub bundle: PrBundle,
    pub changed_lines: ChangedLines,
    /// Head-side contents of changed files.
    pub file_contents: BTreeMap<String, String>,
    /// Parsed PR symbols per changed file.
    pub pr_files: BTreeMap<String, ParsedFile>,
    pub baseline: Vec<BaselineSymbol>,
    pub baseline_source: BaselineSource,
    /// Read snapshot of the vector store; `None` disables cross-repo work.
    pub index: Option<VectorStore>,
    /// Precomputed PR symbol vectors keyed by `Symbol::identity_key()`.
    pub pr_vectors: HashMap<String, Vec<f32>>,
    /// True when vectors came from the hash fallback (advisory quality).
    pub vectors_are_fallback: bool,
    pub similarity_threshold: f32,
}

impl AnalysisContext {
    /// Parses the changed files and derives the changed-line sets.
    ///
    /// Removed, binary and unsupported files are skipped; per-file parse
    /// failures are logged, never fatal.
    pub fn build(
        bundle: PrBundle,
        file_contents: BTreeMap<String, String>,
        similarity_threshold: f32,
    ) -> Self {
        let changed_lines = ChangedLines::from_changes(&bundle.changes);

        let mut pr_files = BTreeMap::new();
        for file in &bundle.changes.files {
            if file.status == FileStatus::Removed || file.is_binary {
                continue;
            }
            let Some(content) = file_contents.get(&file.path) else {
                continue;
            };
            match parse_source(&file.path, content) {
                Ok(parsed) => {
                    debug!("{}: {} PR symbols", file.path, parsed.symbols.len());
                    pr_files.insert(file.path.clone(), parsed);
                }
                Err(e) => warn!("{}: not parsed ({e})", file.path),
            }
        }

        Self {
            bundle,
            changed_lines,
            file_contents,
            pr_files,
            baseline: Vec::new(),
            baseline_source: BaselineSource::Unavailable,
            index: None,
            pr_vectors: HashMap::new(),
            vectors_are_fallback: false,
            similarity_threshold,
        }
    }

    /// All PR symbols across changed files.
    pub fn pr_symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.pr_files.values().flat_map(|f| f.symbols.iter())
    }

    /// Symbols of one changed file.
    pub fn symbols_for(&self, path: &str) -> &[Symbol] {
        self.pr_files
            .get(path)
            .map(|f| f.symbols.as_slice())
            .unwrap_or(&[])
    }

    /// Vector for a PR symbol, when phase 0.2 computed one.
    pub fn vector_for(&self, symbol: &Symbol) -> Option<&Vec<f32>> {
        self.pr_vectors.get(&symbol.identity_key())
    }
}

/// Test-file detection used by duplicate filters and the context filter.
pub fn is_test_file(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    if lower.contains("/test/")
        || lower.contains("/tests/")
        || lower.contains("/spec/")
        || lower.contains("/__tests__/")
        || lower.starts_with("test/")
        || lower.starts_with("tests/")
        || lower.starts_with("spec/")
    {
        return true;
    }
    let file = lower.rsplit('/').next().unwrap_or(&lower);
    let file_orig = path.rsplit('/').next().unwrap_or(path);
    file.contains(".test.")
        || file.contains(".spec.")
        || file.starts_with("test_")
        || file.ends_with("_test.py")
        || file.ends_with("_test.rs")
        || file_orig.ends_with("Test.java")
        || file_orig.ends_with("Tests.java")
}

/// Non-source documentation files never participate in duplicate analysis.
pub fn is_doc_file(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.ends_with(".md")
        || lower.ends_with(".rst")
        || lower.ends_with(".txt")
        || lower.ends_with(".adoc")
        || lower.starts_with("docs/")
        || lower.contains("/docs/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_patterns() {
        assert!(is_test_file("src/test/java/FooTest.java"));
        assert!(is_test_file("src/__tests__/app.test.ts"));
        assert!(is_test_file("tests/test_cache.py"));
        assert!(is_test_file("spec/models/user.spec.js"));
        assert!(is_test_file("src/CalculatorTest.java"));
        assert!(!is_test_file("src/main/java/Calculator.java"));
        assert!(!is_test_file("src/protest.rs"));
    }

    #[test]
    fn doc_file_patterns() {
        assert!(is_doc_file("README.md"));
        assert!(is_doc_file("docs/guide.txt"));
        assert!(!is_doc_file("src/main.rs"));
    }
}
