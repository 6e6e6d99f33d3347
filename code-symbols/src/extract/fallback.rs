//! Regex-based fallback extractor.
//!
//! Used when a grammar is unavailable or the parse collapses. Line-oriented
//! and heuristic: each declaration match opens a symbol that spans until the
//! next declaration at the same or shallower indent (or EOF). Every symbol
//! is flagged `parse_quality = low` so downstream consumers can discount it.

use regex::Regex;

use crate::errors::Result;
use crate::extract::SymbolExtractor;
use crate::lang::Language;
use crate::types::{
    CallEdge, Import, Parameter, ParseQuality, ParsedFile, Signature, Symbol, SymbolKind,
    Visibility, first_line,
};

/// Last-resort extractor.
pub struct FallbackExtractor;

impl SymbolExtractor for FallbackExtractor {
    fn extract(&self, path: &str, source: &str, lang: Language) -> Result<ParsedFile> {
        let mut out = ParsedFile {
            path: path.to_string(),
            language: lang,
            symbols: Vec::new(),
            call_edges: Vec::new(),
            imports: collect_imports(source, lang),
        };

        let decls = find_declarations(source, lang);
        let lines: Vec<&str> = source.lines().collect();
        let total = lines.len() as u32;

        for (idx, decl) in decls.iter().enumerate() {
            if decl.name.is_empty() || decl.name == "unknown" {
                continue;
            }
            // Close at the next declaration with indent <= ours, else EOF.
            let end_line = decls[idx + 1..]
                .iter()
                .find(|d| d.indent <= decl.indent)
                .map(|d| d.line.saturating_sub(1))
                .unwrap_or(total)
                .max(decl.line);

            let body = lines
                .get(decl.line as usize - 1..end_line as usize)
                .map(|ls| ls.join("\n"))
                .unwrap_or_default();

            let calls = if decl.kind.is_callable() {
                collect_calls(&body, &decl.name)
            } else {
                Vec::new()
            };
            for callee in &calls {
                out.call_edges.push(CallEdge {
                    caller: decl.name.clone(),
                    callee: callee.clone(),
                    line: decl.line,
                });
            }

            out.symbols.push(Symbol {
                file: path.to_string(),
                language: lang,
                kind: decl.kind,
                name: decl.name.clone(),
                qualified_name: decl.name.clone(),
                signature: Signature {
                    name: decl.name.clone(),
                    parameters: decl.parameters.clone(),
                    return_type: None,
                    visibility: decl.visibility,
                    modifiers: Vec::new(),
                    text: first_line(&body, 240),
                },
                body,
                start_line: decl.line,
                end_line,
                calls,
                parse_quality: ParseQuality::Low,
            });
        }

        Ok(out)
    }
}

struct Declaration {
    line: u32,
    indent: usize,
    kind: SymbolKind,
    name: String,
    parameters: Vec<Parameter>,
    visibility: Visibility,
}

fn find_declarations(source: &str, lang: Language) -> Vec<Declaration> {
    let type_re;
    let func_re;
    match lang {
        Language::Java => {
            type_re = Regex::new(r"^(?P<mods>[\w\s]*?)\b(?P<kw>class|interface|enum|record)\s+(?P<name>\w+)").unwrap();
            func_re = Regex::new(r"^(?P<mods>[\w\s<>\[\],.]*?)\b(?P<name>\w+)\s*\((?P<params>[^)]*)\)\s*(?:throws\b[^{]*)?\{").unwrap();
        }
        Language::Python => {
            type_re = Regex::new(r"^class\s+(?P<name>\w+)").unwrap();
            func_re = Regex::new(r"^(?:async\s+)?def\s+(?P<name>\w+)\s*\((?P<params>[^)]*)\)").unwrap();
        }
        Language::TypeScript | Language::JavaScript => {
            type_re = Regex::new(r"^(?:export\s+)?(?:abstract\s+)?(?P<kw>class|enum)\s+(?P<name>\w+)").unwrap();
            func_re = Regex::new(
                r"^(?:export\s+)?(?:(?:async|static|public|private|protected)\s+)*(?:function\s+(?P<fname>\w+)|(?:const|let|var)\s+(?P<vname>\w+)\s*=\s*(?:async\s*)?(?:function\b|\())\s*\(?(?P<params>[^)]*)?",
            )
            .unwrap();
        }
        Language::Rust => {
            type_re = Regex::new(r"^(?P<vis>pub(?:\([^)]*\))?\s+)?(?P<kw>struct|enum|trait)\s+(?P<name>\w+)").unwrap();
            func_re = Regex::new(r"^(?P<vis>pub(?:\([^)]*\))?\s+)?(?:async\s+)?(?:unsafe\s+)?fn\s+(?P<name>\w+)\s*(?:<[^>]*>)?\s*\((?P<params>[^)]*)\)?").unwrap();
        }
    }

    let mut out = Vec::new();
    for (i, raw) in source.lines().enumerate() {
        let indent = raw.len() - raw.trim_start().len();
        let line = raw.trim_start();
        if line.starts_with("//") || line.starts_with('#') || line.starts_with('*') {
            continue;
        }

        if let Some(c) = type_re.captures(line) {
            let kw = c.name("kw").map(|m| m.as_str()).unwrap_or("class");
            let kind = if kw == "enum" {
                SymbolKind::Enum
            } else {
                SymbolKind::Class
            };
            out.push(Declaration {
                line: i as u32 + 1,
                indent,
                kind,
                name: c.name("name").map(|m| m.as_str().to_string()).unwrap_or_default(),
                parameters: Vec::new(),
                visibility: guess_visibility(line, lang, c.name("name").map(|m| m.as_str()).unwrap_or("")),
            });
            continue;
        }

        if let Some(c) = func_re.captures(line) {
            let name = c
                .name("name")
                .or_else(|| c.name("fname"))
                .or_else(|| c.name("vname"))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            if name.is_empty() || is_keyword(&name) {
                continue;
            }
            let params = c
                .name("params")
                .map(|m| parse_params(m.as_str()))
                .unwrap_or_default();
            // Indented callables are treated as methods; this is the best a
            // line-based pass can do without a tree.
            let kind = if indent > 0 {
                SymbolKind::Method
            } else {
                SymbolKind::Function
            };
            out.push(Declaration {
                line: i as u32 + 1,
                indent,
                kind,
                name: name.clone(),
                parameters: params,
                visibility: guess_visibility(line, lang, &name),
            });
        }
    }
    out
}

fn is_keyword(name: &str) -> bool {
    matches!(
        name,
        "if" | "for" | "while" | "switch" | "catch" | "return" | "new" | "else" | "match" | "loop"
    )
}

fn parse_params(raw: &str) -> Vec<Parameter> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty() && *p != "self" && *p != "cls")
        .map(|p| {
            // "Type name" (java) / "name: Type" (ts/rust) / bare name.
            if let Some((n, t)) = p.split_once(':') {
                Parameter {
                    name: n.trim().to_string(),
                    type_name: Some(t.trim().to_string()),
                }
            } else if let Some((t, n)) = p.rsplit_once(' ') {
                Parameter {
                    name: n.trim().to_string(),
                    type_name: Some(t.trim().to_string()),
                }
            } else {
                Parameter {
                    name: p.to_string(),
                    type_name: None,
                }
            }
        })
        .collect()
}

fn guess_visibility(line: &str, lang: Language, name: &str) -> Visibility {
    match lang {
        Language::Java => {
            if line.contains("public") {
                Visibility::Public
            } else if line.contains("protected") {
                Visibility::Protected
            } else if line.contains("private") {
                Visibility::Private
            } else {
                Visibility::Package
            }
        }
        Language::Rust => {
            if line.trim_start().starts_with("pub(") {
                Visibility::Package
            } else if line.trim_start().starts_with("pub ") {
                Visibility::Public
            } else {
                Visibility::Private
            }
        }
        Language::Python => {
            if name.starts_with("__") && !name.ends_with("__") {
                Visibility::Private
            } else if name.starts_with('_') && !name.starts_with("__") {
                Visibility::Protected
            } else {
                Visibility::Public
            }
        }
        Language::TypeScript | Language::JavaScript => {
            if line.contains("private") || name.starts_with('#') {
                Visibility::Private
            } else if line.contains("protected") {
                Visibility::Protected
            } else {
                Visibility::Public
            }
        }
    }
}

fn collect_calls(body: &str, own_name: &str) -> Vec<String> {
    let call_re = Regex::new(r"\b([A-Za-z_][A-Za-z0-9_]*)\s*\(").unwrap();
    let mut out = Vec::new();
    for c in call_re.captures_iter(body) {
        let name = &c[1];
        if is_keyword(name) || name == own_name {
            continue;
        }
        if !out.iter().any(|n: &String| n == name) {
            out.push(name.to_string());
        }
    }
    // The first match is usually the declaration itself; own_name is already
    // excluded above.
    out
}

fn collect_imports(source: &str, lang: Language) -> Vec<Import> {
    let re = match lang {
        Language::Java => Regex::new(r"^\s*import\s+(?:static\s+)?([\w.*]+)\s*;").unwrap(),
        Language::Python => {
            Regex::new(r"^\s*(?:from\s+([\w.]+)\s+import|import\s+([\w.]+))").unwrap()
        }
        Language::TypeScript | Language::JavaScript => {
            Regex::new(r#"^\s*import\b.*?from\s+["']([^"']+)["']"#).unwrap()
        }
        Language::Rust => Regex::new(r"^\s*(?:pub\s+)?use\s+([\w:{}, *]+);").unwrap(),
    };

    let mut out = Vec::new();
    for (i, line) in source.lines().enumerate() {
        if let Some(c) = re.captures(line) {
            let target = c
                .get(1)
                .or_else(|| c.get(2))
                .map(|m| m.as_str().trim().to_string());
            if let Some(t) = target {
                out.push(Import {
                    target: t,
                    line: i as u32 + 1,
                });
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_flags_low_quality() {
        let src = "public class Broken {\n    public int half(int x) {\n        return x / 2;\n    }\n}\n";
        let parsed = FallbackExtractor
            .extract("Broken.java", src, Language::Java)
            .unwrap();
        assert!(!parsed.symbols.is_empty());
        for s in &parsed.symbols {
            assert_eq!(s.parse_quality, ParseQuality::Low);
        }
        let half = parsed.symbols.iter().find(|s| s.name == "half").unwrap();
        assert_eq!(half.kind, SymbolKind::Method);
        assert_eq!(half.signature.visibility, Visibility::Public);
        assert_eq!(half.signature.parameters.len(), 1);
        assert_eq!(half.signature.parameters[0].name, "x");
    }

    #[test]
    fn python_defs_and_spans() {
        let src = "def first():\n    return 1\n\ndef second():\n    return first()\n";
        let parsed = FallbackExtractor
            .extract("two.py", src, Language::Python)
            .unwrap();
        assert_eq!(parsed.symbols.len(), 2);
        let first = &parsed.symbols[0];
        assert_eq!(first.name, "first");
        assert_eq!(first.start_line, 1);
        assert!(first.end_line < parsed.symbols[1].start_line);
        let second = &parsed.symbols[1];
        assert!(second.calls.contains(&"first".to_string()));
    }

    #[test]
    fn control_flow_keywords_are_not_functions() {
        let src = "fn real() {\n    if check() {\n        work();\n    }\n}\n";
        let parsed = FallbackExtractor
            .extract("a.rs", src, Language::Rust)
            .unwrap();
        let names: Vec<&str> = parsed.symbols.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["real"]);
    }
}
