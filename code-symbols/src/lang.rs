//! Language discriminator and grammar lookup.

use serde::{Deserialize, Serialize};

/// Languages for which a symbol extractor is provided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Java,
    TypeScript,
    JavaScript,
    Python,
    Rust,
}

impl Language {
    /// Maps a repo-relative path to a supported language by extension.
    pub fn from_path(path: &str) -> Option<Self> {
        let ext = path.rsplit('.').next()?.to_ascii_lowercase();
        match ext.as_str() {
            "java" => Some(Self::Java),
            "ts" | "tsx" | "mts" | "cts" => Some(Self::TypeScript),
            "js" | "jsx" | "mjs" | "cjs" => Some(Self::JavaScript),
            "py" => Some(Self::Python),
            "rs" => Some(Self::Rust),
            _ => None,
        }
    }

    /// True when the path belongs to a file this crate can parse.
    pub fn supports_path(path: &str) -> bool {
        Self::from_path(path).is_some()
    }

    /// Returns the Tree-sitter grammar for this language.
    ///
    /// `.tsx` files need the dedicated TSX grammar, hence the path argument.
    pub fn grammar(self, path: &str) -> tree_sitter::Language {
        match self {
            Self::Java => tree_sitter_java::LANGUAGE.into(),
            Self::TypeScript => {
                if path.ends_with(".tsx") {
                    tree_sitter_typescript::LANGUAGE_TSX.into()
                } else {
                    tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
                }
            }
            Self::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Self::Python => tree_sitter_python::LANGUAGE.into(),
            Self::Rust => tree_sitter_rust::LANGUAGE.into(),
        }
    }

    /// Short tag used in logs and metadata.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Java => "java",
            Self::TypeScript => "typescript",
            Self::JavaScript => "javascript",
            Self::Python => "python",
            Self::Rust => "rust",
        }
    }
}
