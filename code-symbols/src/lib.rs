//! Source-file symbol extraction for the review pipeline.
//!
//! A file is parsed into a [`ParsedFile`]: symbols (class / method /
//! function / field / enum) with structured signatures and spans, outbound
//! call edges, and imports. Two extractors are provided behind one trait:
//! a Tree-sitter grammar walker (preferred) and a regex fallback used when
//! a grammar is missing or the parse collapses; fallback symbols are
//! flagged `parse_quality = low`.

pub mod errors;
pub mod extract;
pub mod lang;
pub mod types;

pub use errors::{Error, Result};
pub use extract::{FallbackExtractor, GrammarExtractor, SymbolExtractor, parse_source};
pub use lang::Language;
pub use types::{
    CallEdge, Import, Parameter, ParseQuality, ParsedFile, Signature, Symbol, SymbolKind,
    Visibility,
};
