//! Extractor routing: grammar first, regex fallback second.

mod fallback;
mod grammar;

pub use fallback::FallbackExtractor;
pub use grammar::GrammarExtractor;

use tracing::{debug, warn};

use crate::errors::{Error, Result};
use crate::lang::Language;
use crate::types::ParsedFile;

/// Common interface for the two extractor implementations.
pub trait SymbolExtractor {
    fn extract(&self, path: &str, source: &str, lang: Language) -> Result<ParsedFile>;
}

/// Parses one source file, selecting the language by extension.
///
/// The grammar extractor is tried first; if it errors out or the tree is so
/// broken that nothing was extracted, the regex fallback runs instead and
/// every produced symbol carries `parse_quality = low`.
pub fn parse_source(path: &str, source: &str) -> Result<ParsedFile> {
    let lang = Language::from_path(path)
        .ok_or_else(|| Error::UnsupportedLanguage(path.to_string()))?;

    match GrammarExtractor.extract(path, source, lang) {
        Ok(parsed) => {
            debug!(
                "parsed {} via grammar: {} symbols",
                path,
                parsed.symbols.len()
            );
            Ok(parsed)
        }
        Err(e) => {
            warn!("grammar extraction failed for {path} ({e}), using regex fallback");
            FallbackExtractor.extract(path, source, lang)
        }
    }
}
