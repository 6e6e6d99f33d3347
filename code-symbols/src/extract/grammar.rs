//! Tree-sitter based extractor.
//!
//! Strategy mirrors a plain DFS over the syntax tree without the `Query`
//! API (version-agnostic, resilient to grammar drift):
//! - one [`Symbol`] per addressable declaration (class/enum/function/
//!   method/field);
//! - nested classes produce distinct symbols with owner-qualified names;
//! - anonymous functions are skipped unless they are top-level assignments
//!   (`const f = () => {}` at program scope);
//! - names that come out empty or as `unknown` are discarded;
//! - call edges are collected per callable symbol, without descending into
//!   nested callables (those collect their own).

use tree_sitter::{Node, Parser};

use crate::errors::{Error, Result};
use crate::extract::SymbolExtractor;
use crate::lang::Language;
use crate::types::{
    CallEdge, Import, Parameter, ParseQuality, ParsedFile, Signature, Symbol, SymbolKind,
    Visibility, first_line,
};

/// Grammar-backed extractor (preferred path).
pub struct GrammarExtractor;

impl SymbolExtractor for GrammarExtractor {
    fn extract(&self, path: &str, source: &str, lang: Language) -> Result<ParsedFile> {
        let mut parser = Parser::new();
        parser
            .set_language(&lang.grammar(path))
            .map_err(|e| Error::Grammar(e.to_string()))?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| Error::ParseFailed(path.to_string()))?;
        let root = tree.root_node();

        let mut out = ParsedFile {
            path: path.to_string(),
            language: lang,
            symbols: Vec::new(),
            call_edges: Vec::new(),
            imports: Vec::new(),
        };

        collect_imports(root, source, lang, &mut out.imports);
        walk(root, source, path, lang, &mut out);

        // A tree that is pure error noise and yielded nothing goes to the
        // regex fallback instead of returning an empty result.
        if out.symbols.is_empty() && root.has_error() && !source.trim().is_empty() {
            return Err(Error::ParseFailed(path.to_string()));
        }
        Ok(out)
    }
}

/* ------------------------------ node tables ------------------------------ */

struct Rules {
    class_kinds: &'static [&'static str],
    enum_kinds: &'static [&'static str],
    callable_kinds: &'static [&'static str],
    field_kinds: &'static [&'static str],
    call_kinds: &'static [&'static str],
    import_kinds: &'static [&'static str],
    /// Kinds that qualify nested symbol names (classes plus impl blocks).
    owner_kinds: &'static [&'static str],
}

fn rules(lang: Language) -> &'static Rules {
    match lang {
        Language::Java => &Rules {
            class_kinds: &[
                "class_declaration",
                "interface_declaration",
                "record_declaration",
            ],
            enum_kinds: &["enum_declaration"],
            callable_kinds: &["method_declaration", "constructor_declaration"],
            field_kinds: &["field_declaration"],
            call_kinds: &["method_invocation", "object_creation_expression"],
            import_kinds: &["import_declaration"],
            owner_kinds: &[
                "class_declaration",
                "interface_declaration",
                "record_declaration",
                "enum_declaration",
            ],
        },
        Language::TypeScript | Language::JavaScript => &Rules {
            class_kinds: &["class_declaration", "abstract_class_declaration"],
            enum_kinds: &["enum_declaration"],
            callable_kinds: &[
                "function_declaration",
                "generator_function_declaration",
                "method_definition",
            ],
            field_kinds: &["public_field_definition", "field_definition"],
            call_kinds: &["call_expression", "new_expression"],
            import_kinds: &["import_statement"],
            owner_kinds: &[
                "class_declaration",
                "abstract_class_declaration",
                "enum_declaration",
            ],
        },
        Language::Python => &Rules {
            class_kinds: &["class_definition"],
            enum_kinds: &[],
            callable_kinds: &["function_definition"],
            field_kinds: &[],
            call_kinds: &["call"],
            import_kinds: &["import_statement", "import_from_statement"],
            owner_kinds: &["class_definition"],
        },
        Language::Rust => &Rules {
            class_kinds: &["struct_item", "trait_item", "union_item"],
            enum_kinds: &["enum_item"],
            callable_kinds: &["function_item"],
            field_kinds: &["field_declaration"],
            call_kinds: &["call_expression"],
            import_kinds: &["use_declaration"],
            owner_kinds: &["struct_item", "trait_item", "enum_item", "impl_item"],
        },
    }
}

/* --------------------------------- walk ---------------------------------- */

fn walk(root: Node, source: &str, path: &str, lang: Language, out: &mut ParsedFile) {
    let r = rules(lang);
    let mut stack = vec![root];

    while let Some(node) = stack.pop() {
        let kind = node.kind();

        if r.class_kinds.contains(&kind) {
            emit(out, node, source, path, lang, SymbolKind::Class);
        } else if r.enum_kinds.contains(&kind) {
            emit(out, node, source, path, lang, SymbolKind::Enum);
        } else if r.callable_kinds.contains(&kind) {
            let sym_kind = if in_owner_scope(node, lang) {
                SymbolKind::Method
            } else {
                SymbolKind::Function
            };
            emit(out, node, source, path, lang, sym_kind);
        } else if r.field_kinds.contains(&kind) {
            emit(out, node, source, path, lang, SymbolKind::Field);
        } else if is_top_level_assignment(node, lang) {
            emit_assigned_function(out, node, source, path, lang);
        }

        for i in (0..node.child_count()).rev() {
            if let Some(c) = node.child(i) {
                stack.push(c);
            }
        }
    }
}

fn emit(
    out: &mut ParsedFile,
    node: Node,
    source: &str,
    path: &str,
    lang: Language,
    kind: SymbolKind,
) {
    let Some(name) = node_name(node, source) else {
        return;
    };
    if name.is_empty() || name == "unknown" || name.starts_with('<') {
        return;
    }

    let owners = owner_chain(node, source, lang);
    let qualified_name = if owners.is_empty() {
        name.clone()
    } else {
        format!("{}.{}", owners.join("."), name)
    };

    let body = node_text(node, source).unwrap_or_default().to_string();
    let start_line = node.start_position().row as u32 + 1;
    let end_line = (node.end_position().row as u32 + 1).max(start_line);

    let signature = Signature {
        name: name.clone(),
        parameters: parameters_of(node, source),
        return_type: return_type_of(node, source),
        visibility: visibility_of(node, source, lang, &name),
        modifiers: modifier_words(&body),
        text: first_line(&body, 240),
    };

    let mut calls = Vec::new();
    if kind.is_callable() {
        collect_calls(node, source, lang, &qualified_name, out, &mut calls);
    }

    out.symbols.push(Symbol {
        file: path.to_string(),
        language: lang,
        kind,
        name,
        qualified_name,
        signature,
        body,
        start_line,
        end_line,
        calls,
        parse_quality: ParseQuality::Full,
    });
}

/// `const handler = async () => { … }` at program scope becomes a Function.
fn is_top_level_assignment(node: Node, lang: Language) -> bool {
    if !matches!(lang, Language::TypeScript | Language::JavaScript) {
        return false;
    }
    if !matches!(node.kind(), "lexical_declaration" | "variable_declaration") {
        return false;
    }
    let Some(parent) = node.parent() else {
        return false;
    };
    match parent.kind() {
        "program" => true,
        "export_statement" => parent
            .parent()
            .map(|gp| gp.kind() == "program")
            .unwrap_or(false),
        _ => false,
    }
}

fn emit_assigned_function(
    out: &mut ParsedFile,
    node: Node,
    source: &str,
    path: &str,
    lang: Language,
) {
    for i in 0..node.named_child_count() {
        let Some(decl) = node.named_child(i) else {
            continue;
        };
        if decl.kind() != "variable_declarator" {
            continue;
        }
        let Some(value) = decl.child_by_field_name("value") else {
            continue;
        };
        if !matches!(
            value.kind(),
            "arrow_function" | "function_expression" | "function"
        ) {
            continue;
        }
        let Some(name) = decl
            .child_by_field_name("name")
            .and_then(|n| node_text(n, source))
            .map(str::to_string)
        else {
            continue;
        };
        if name.is_empty() || name == "unknown" {
            continue;
        }

        let body = node_text(node, source).unwrap_or_default().to_string();
        let start_line = node.start_position().row as u32 + 1;
        let end_line = (node.end_position().row as u32 + 1).max(start_line);

        let signature = Signature {
            name: name.clone(),
            parameters: parameters_of(value, source),
            return_type: return_type_of(value, source),
            visibility: Visibility::Public,
            modifiers: modifier_words(&body),
            text: first_line(&body, 240),
        };

        let mut calls = Vec::new();
        collect_calls(value, source, lang, &name, out, &mut calls);

        out.symbols.push(Symbol {
            file: path.to_string(),
            language: lang,
            kind: SymbolKind::Function,
            name: name.clone(),
            qualified_name: name,
            signature,
            body,
            start_line,
            end_line,
            calls,
            parse_quality: ParseQuality::Full,
        });
    }
}

/* ------------------------------ name & sig -------------------------------- */

fn node_text<'a>(node: Node, source: &'a str) -> Option<&'a str> {
    node.utf8_text(source.as_bytes()).ok()
}

fn node_name(node: Node, source: &str) -> Option<String> {
    if let Some(n) = node.child_by_field_name("name") {
        return node_text(n, source).map(str::to_string);
    }
    // Java fields: name sits on the variable_declarator.
    if let Some(d) = node.child_by_field_name("declarator") {
        if let Some(n) = d.child_by_field_name("name") {
            return node_text(n, source).map(str::to_string);
        }
    }
    // Defensive: first identifier-like named child.
    for i in 0..node.named_child_count() {
        if let Some(c) = node.named_child(i) {
            if c.kind().ends_with("identifier") {
                return node_text(c, source).map(str::to_string);
            }
        }
    }
    None
}

fn parameters_of(node: Node, source: &str) -> Vec<Parameter> {
    let Some(params) = node.child_by_field_name("parameters") else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for i in 0..params.named_child_count() {
        let Some(p) = params.named_child(i) else {
            continue;
        };
        if matches!(p.kind(), "comment" | "self_parameter" | "this") {
            continue;
        }
        if let Some(param) = param_from_node(p, source) {
            out.push(param);
        }
    }
    out
}

fn param_from_node(n: Node, source: &str) -> Option<Parameter> {
    if n.kind().ends_with("identifier") {
        let name = node_text(n, source)?.to_string();
        if name == "self" || name == "cls" {
            return None;
        }
        return Some(Parameter {
            name,
            type_name: None,
        });
    }

    let name = n
        .child_by_field_name("name")
        .or_else(|| n.child_by_field_name("pattern"))
        .and_then(|c| node_text(c, source))
        .map(str::to_string)
        .or_else(|| first_identifier_text(n, source))?;
    if name == "self" || name == "cls" {
        return None;
    }
    let type_name = n
        .child_by_field_name("type")
        .and_then(|c| node_text(c, source))
        .map(clean_type);
    Some(Parameter { name, type_name })
}

fn first_identifier_text(node: Node, source: &str) -> Option<String> {
    let mut stack = vec![node];
    while let Some(n) = stack.pop() {
        if n.kind().ends_with("identifier") {
            return node_text(n, source).map(str::to_string);
        }
        for i in (0..n.named_child_count()).rev() {
            if let Some(c) = n.named_child(i) {
                stack.push(c);
            }
        }
    }
    None
}

fn return_type_of(node: Node, source: &str) -> Option<String> {
    for field in ["return_type", "type"] {
        if let Some(t) = node.child_by_field_name(field) {
            return node_text(t, source).map(clean_type);
        }
    }
    None
}

fn clean_type(raw: &str) -> String {
    raw.trim()
        .trim_start_matches(':')
        .trim_start_matches("->")
        .trim()
        .to_string()
}

fn visibility_of(node: Node, source: &str, lang: Language, name: &str) -> Visibility {
    match lang {
        Language::Java => {
            for i in 0..node.child_count() {
                if let Some(c) = node.child(i) {
                    if c.kind() == "modifiers" {
                        let text = node_text(c, source).unwrap_or("");
                        if text.contains("public") {
                            return Visibility::Public;
                        }
                        if text.contains("protected") {
                            return Visibility::Protected;
                        }
                        if text.contains("private") {
                            return Visibility::Private;
                        }
                    }
                }
            }
            Visibility::Package
        }
        Language::Rust => {
            for i in 0..node.child_count() {
                if let Some(c) = node.child(i) {
                    if c.kind() == "visibility_modifier" {
                        let text = node_text(c, source).unwrap_or("");
                        return if text == "pub" {
                            Visibility::Public
                        } else {
                            // pub(crate) / pub(super) / pub(in …)
                            Visibility::Package
                        };
                    }
                }
            }
            Visibility::Private
        }
        Language::Python => {
            let dunder = name.starts_with("__") && name.ends_with("__");
            if dunder {
                Visibility::Public
            } else if name.starts_with("__") {
                Visibility::Private
            } else if name.starts_with('_') {
                Visibility::Protected
            } else {
                Visibility::Public
            }
        }
        Language::TypeScript => {
            if name.starts_with('#') {
                return Visibility::Private;
            }
            for i in 0..node.child_count() {
                if let Some(c) = node.child(i) {
                    if c.kind() == "accessibility_modifier" {
                        return match node_text(c, source).unwrap_or("") {
                            "private" => Visibility::Private,
                            "protected" => Visibility::Protected,
                            _ => Visibility::Public,
                        };
                    }
                }
            }
            Visibility::Public
        }
        Language::JavaScript => {
            if name.starts_with('#') {
                Visibility::Private
            } else {
                Visibility::Public
            }
        }
    }
}

const MODIFIER_WORDS: &[&str] = &[
    "static",
    "final",
    "abstract",
    "async",
    "const",
    "unsafe",
    "readonly",
    "override",
    "synchronized",
    "native",
    "default",
    "export",
    "sealed",
];

/// Modifier words present on the declaration's first line, in order.
fn modifier_words(body: &str) -> Vec<String> {
    let head = body.lines().next().unwrap_or("");
    let mut out = Vec::new();
    for word in head.split(|c: char| !c.is_ascii_alphanumeric() && c != '_') {
        if MODIFIER_WORDS.contains(&word) && !out.iter().any(|w: &String| w == word) {
            out.push(word.to_string());
        }
    }
    out
}

/* ------------------------------ owner chain ------------------------------- */

fn in_owner_scope(node: Node, lang: Language) -> bool {
    let r = rules(lang);
    let mut cur = node.parent();
    while let Some(p) = cur {
        if r.owner_kinds.contains(&p.kind()) {
            return true;
        }
        cur = p.parent();
    }
    false
}

fn owner_chain(node: Node, source: &str, lang: Language) -> Vec<String> {
    let r = rules(lang);
    let mut chain = Vec::new();
    let mut cur = node.parent();
    while let Some(p) = cur {
        if r.owner_kinds.contains(&p.kind()) {
            let name = if p.kind() == "impl_item" {
                p.child_by_field_name("type")
                    .and_then(|t| node_text(t, source))
                    .map(|t| strip_generics(t).to_string())
            } else {
                node_name(p, source)
            };
            if let Some(n) = name {
                chain.push(n);
            }
        }
        cur = p.parent();
    }
    chain.reverse();
    chain
}

fn strip_generics(name: &str) -> &str {
    name.split('<').next().unwrap_or(name).trim()
}

/* --------------------------------- calls ---------------------------------- */

fn collect_calls(
    sym_node: Node,
    source: &str,
    lang: Language,
    caller: &str,
    out: &mut ParsedFile,
    names: &mut Vec<String>,
) {
    let r = rules(lang);
    let mut stack: Vec<Node> = Vec::new();
    for i in (0..sym_node.child_count()).rev() {
        if let Some(c) = sym_node.child(i) {
            stack.push(c);
        }
    }

    while let Some(n) = stack.pop() {
        // Nested callables collect their own calls.
        if r.callable_kinds.contains(&n.kind()) {
            continue;
        }
        if r.call_kinds.contains(&n.kind()) {
            if let Some(callee) = callee_name(n, source) {
                let line = n.start_position().row as u32 + 1;
                if !names.contains(&callee) {
                    names.push(callee.clone());
                }
                out.call_edges.push(CallEdge {
                    caller: caller.to_string(),
                    callee,
                    line,
                });
            }
        }
        for i in (0..n.child_count()).rev() {
            if let Some(c) = n.child(i) {
                stack.push(c);
            }
        }
    }
}

fn callee_name(call: Node, source: &str) -> Option<String> {
    let target = match call.kind() {
        "method_invocation" => call.child_by_field_name("name"),
        "object_creation_expression" => call.child_by_field_name("type"),
        "new_expression" => call.child_by_field_name("constructor"),
        // call_expression (ts/js/rust) and call (python)
        _ => call.child_by_field_name("function"),
    }?;

    let name = match target.kind() {
        "member_expression" => target
            .child_by_field_name("property")
            .and_then(|p| node_text(p, source)),
        "field_expression" => target
            .child_by_field_name("field")
            .and_then(|p| node_text(p, source)),
        "attribute" => target
            .child_by_field_name("attribute")
            .and_then(|p| node_text(p, source)),
        _ => node_text(target, source),
    }?;

    // Normalize to the last path segment, drop generics/turbofish.
    let last = name
        .rsplit("::")
        .next()
        .unwrap_or(name)
        .rsplit('.')
        .next()
        .unwrap_or(name);
    let last = strip_generics(last);
    if last.is_empty() || !last.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_') {
        return None;
    }
    Some(last.to_string())
}

/* -------------------------------- imports --------------------------------- */

fn collect_imports(root: Node, source: &str, lang: Language, out: &mut Vec<Import>) {
    let r = rules(lang);
    let mut stack = vec![root];
    while let Some(n) = stack.pop() {
        if r.import_kinds.contains(&n.kind()) {
            if let Some(target) = import_target(n, source, lang) {
                out.push(Import {
                    target,
                    line: n.start_position().row as u32 + 1,
                });
            }
            continue;
        }
        for i in (0..n.child_count()).rev() {
            if let Some(c) = n.child(i) {
                stack.push(c);
            }
        }
    }
    out.sort_by_key(|i| i.line);
}

fn import_target(node: Node, source: &str, lang: Language) -> Option<String> {
    match lang {
        Language::Java => {
            let text = node_text(node, source)?;
            Some(
                text.trim_start_matches("import")
                    .trim_start()
                    .trim_start_matches("static")
                    .trim()
                    .trim_end_matches(';')
                    .trim()
                    .to_string(),
            )
        }
        Language::Python => {
            if node.kind() == "import_from_statement" {
                node.child_by_field_name("module_name")
                    .and_then(|m| node_text(m, source))
                    .map(str::to_string)
            } else {
                node.named_child(0)
                    .and_then(|m| node_text(m, source))
                    .map(str::to_string)
            }
        }
        Language::TypeScript | Language::JavaScript => node
            .child_by_field_name("source")
            .and_then(|s| node_text(s, source))
            .map(|s| s.trim_matches(|c| c == '"' || c == '\'' || c == '`').to_string()),
        Language::Rust => node
            .child_by_field_name("argument")
            .and_then(|a| node_text(a, source))
            .map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::SymbolExtractor;

    const JAVA_SRC: &str = r#"
package com.acme.billing;

import java.util.List;
import com.acme.core.Validator;

public class Invoice {
    private final List<String> lines;

    public Invoice(List<String> lines) {
        this.lines = lines;
    }

    public double total(double taxRate) {
        return subtotal() * (1.0 + taxRate);
    }

    private double subtotal() {
        return 0.0;
    }

    public static class Builder {
        public Invoice build() {
            return new Invoice(null);
        }
    }
}
"#;

    #[test]
    fn java_symbols_and_visibility() {
        let parsed = GrammarExtractor
            .extract("src/Invoice.java", JAVA_SRC, Language::Java)
            .unwrap();

        let class = parsed
            .symbols
            .iter()
            .find(|s| s.name == "Invoice" && s.kind == SymbolKind::Class)
            .expect("class symbol");
        assert_eq!(class.signature.visibility, Visibility::Public);
        assert_eq!(class.qualified_name, "Invoice");

        let total = parsed
            .symbols
            .iter()
            .find(|s| s.name == "total")
            .expect("total method");
        assert_eq!(total.kind, SymbolKind::Method);
        assert_eq!(total.signature.visibility, Visibility::Public);
        assert_eq!(total.signature.parameters.len(), 1);
        assert_eq!(total.signature.parameters[0].name, "taxRate");
        assert_eq!(
            total.signature.parameters[0].type_name.as_deref(),
            Some("double")
        );
        assert_eq!(total.signature.return_type.as_deref(), Some("double"));
        assert!(total.calls.contains(&"subtotal".to_string()));

        let subtotal = parsed
            .symbols
            .iter()
            .find(|s| s.name == "subtotal")
            .expect("subtotal");
        assert_eq!(subtotal.signature.visibility, Visibility::Private);

        // Nested class gets a qualified name; its method is owner-qualified.
        let build = parsed
            .symbols
            .iter()
            .find(|s| s.name == "build")
            .expect("build");
        assert_eq!(build.qualified_name, "Invoice.Builder.build");

        assert!(
            parsed
                .imports
                .iter()
                .any(|i| i.target == "com.acme.core.Validator")
        );
    }

    #[test]
    fn python_methods_and_private_names() {
        let src = r#"
import os
from collections import defaultdict

class Cache:
    def get(self, key):
        return self._lookup(key)

    def _lookup(self, key):
        return None

def standalone(x):
    return x + 1
"#;
        let parsed = GrammarExtractor
            .extract("cache.py", src, Language::Python)
            .unwrap();

        let get = parsed.symbols.iter().find(|s| s.name == "get").unwrap();
        assert_eq!(get.kind, SymbolKind::Method);
        assert_eq!(get.qualified_name, "Cache.get");
        // `self` is not a parameter.
        assert_eq!(get.signature.parameters.len(), 1);

        let lookup = parsed.symbols.iter().find(|s| s.name == "_lookup").unwrap();
        assert_eq!(lookup.signature.visibility, Visibility::Protected);

        let standalone = parsed
            .symbols
            .iter()
            .find(|s| s.name == "standalone")
            .unwrap();
        assert_eq!(standalone.kind, SymbolKind::Function);

        assert!(parsed.imports.iter().any(|i| i.target == "os"));
        assert!(parsed.imports.iter().any(|i| i.target == "collections"));
    }

    #[test]
    fn typescript_top_level_arrow_is_a_function() {
        let src = r#"
import { api } from "./api";

export const fetchUser = async (id: string) => {
    return api.get(id);
};

const helper = () => 1;

class Service {
    private run(): void {
        [1, 2].map(x => x + 1);
    }
}
"#;
        let parsed = GrammarExtractor
            .extract("service.ts", src, Language::TypeScript)
            .unwrap();

        let fetch = parsed
            .symbols
            .iter()
            .find(|s| s.name == "fetchUser")
            .expect("top-level arrow");
        assert_eq!(fetch.kind, SymbolKind::Function);
        assert_eq!(fetch.signature.parameters.len(), 1);

        assert!(parsed.symbols.iter().any(|s| s.name == "helper"));

        let run = parsed.symbols.iter().find(|s| s.name == "run").unwrap();
        assert_eq!(run.kind, SymbolKind::Method);
        assert_eq!(run.signature.visibility, Visibility::Private);

        // The nested anonymous arrow inside `run` emits no symbol.
        assert_eq!(
            parsed
                .symbols
                .iter()
                .filter(|s| s.kind == SymbolKind::Function)
                .count(),
            2
        );

        assert!(parsed.imports.iter().any(|i| i.target == "./api"));
    }

    #[test]
    fn rust_impl_methods_are_qualified() {
        let src = r#"
use std::collections::HashMap;

pub struct Ledger {
    entries: HashMap<String, u64>,
}

impl Ledger {
    pub fn record(&mut self, key: &str, amount: u64) {
        self.bump(key, amount);
    }

    fn bump(&mut self, key: &str, amount: u64) {}
}

pub(crate) fn open_ledger() -> Ledger {
    Ledger { entries: HashMap::new() }
}
"#;
        let parsed = GrammarExtractor
            .extract("src/ledger.rs", src, Language::Rust)
            .unwrap();

        let record = parsed.symbols.iter().find(|s| s.name == "record").unwrap();
        assert_eq!(record.kind, SymbolKind::Method);
        assert_eq!(record.qualified_name, "Ledger.record");
        assert_eq!(record.signature.visibility, Visibility::Public);
        assert!(record.calls.contains(&"bump".to_string()));

        let bump = parsed.symbols.iter().find(|s| s.name == "bump").unwrap();
        assert_eq!(bump.signature.visibility, Visibility::Private);

        let open = parsed
            .symbols
            .iter()
            .find(|s| s.name == "open_ledger")
            .unwrap();
        assert_eq!(open.kind, SymbolKind::Function);
        assert_eq!(open.signature.visibility, Visibility::Package);
        assert_eq!(open.signature.return_type.as_deref(), Some("Ledger"));
    }

    #[test]
    fn spans_are_one_indexed_and_ordered() {
        let parsed = GrammarExtractor
            .extract("src/Invoice.java", JAVA_SRC, Language::Java)
            .unwrap();
        for s in &parsed.symbols {
            assert!(s.start_line >= 1, "{} start", s.name);
            assert!(s.start_line <= s.end_line, "{} span", s.name);
            assert_eq!(s.signature.name, s.name);
        }
    }
}
