//! C and C++ language analyzers (shared implementation).
//!
//! Handles pointer/reference declarator chains when naming functions,
//! recurses into `#ifdef` branches, and extracts forward declarations from
//! headers so that quote-includes resolve to real symbols. Angle-bracket
//! includes are system headers and are not extracted.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use tree_sitter::{Language, Node, Tree};

use super::{find_child, node_text, LanguageAnalyzer};
use crate::analysis::{ImportStatement, RawCall, Symbol, SymbolKind, Visibility};

static C_BUILTIN_EXCLUSIONS: Lazy<HashSet<String>> = Lazy::new(|| {
    [
        "printf", "fprintf", "sprintf", "snprintf", "scanf", "fscanf", "sscanf", "malloc",
        "calloc", "realloc", "free", "memcpy", "memmove", "memset", "memcmp", "strlen", "strcpy",
        "strncpy", "strcat", "strncat", "strcmp", "strncmp", "fopen", "fclose", "fread", "fwrite",
        "fgets", "fputs", "exit", "abort", "atexit", "assert", "sizeof", "offsetof",
    ]
    .into_iter()
    .map(String::from)
    .collect()
});

static CPP_BUILTIN_EXCLUSIONS: Lazy<HashSet<String>> = Lazy::new(|| {
    let mut set = C_BUILTIN_EXCLUSIONS.clone();
    for name in [
        "std::cout",
        "std::cerr",
        "std::endl",
        "std::make_shared",
        "std::make_unique",
        "std::make_pair",
        "std::move",
        "std::forward",
        "std::swap",
        "std::sort",
        "std::find",
        "std::transform",
        "std::begin",
        "std::end",
        "std::to_string",
        "std::stoi",
        "std::stof",
        "static_cast",
        "dynamic_cast",
        "reinterpret_cast",
        "const_cast",
        "cout",
        "cerr",
        "endl",
        "make_shared",
        "make_unique",
        "move",
        "to_string",
    ] {
        set.insert(name.to_string());
    }
    set
});

const PREPROC_CONTAINERS: &[&str] = &[
    "preproc_ifdef",
    "preproc_ifndef",
    "preproc_if",
    "preproc_else",
    "preproc_elif",
];

/// Function name through pointer/reference declarator chains.
fn declarator_name(node: Node, source: &[u8]) -> Option<String> {
    for i in 0..node.child_count() {
        let Some(child) = node.child(i) else { continue };
        match child.kind() {
            "function_declarator" => {
                for j in 0..child.child_count() {
                    if let Some(c) = child.child(j) {
                        match c.kind() {
                            "identifier" | "field_identifier" => {
                                return Some(node_text(c, source).to_string());
                            }
                            "qualified_identifier" => {
                                // Out-of-class definition: Type::method
                                let text = node_text(c, source);
                                return Some(
                                    text.rsplit("::").next().unwrap_or(text).to_string(),
                                );
                            }
                            _ => {}
                        }
                    }
                }
            }
            "pointer_declarator" | "reference_declarator" => {
                if let Some(name) = declarator_name(child, source) {
                    return Some(name);
                }
            }
            _ => {}
        }
    }
    None
}

fn type_name(node: Node, source: &[u8]) -> Option<String> {
    find_child(node, "type_identifier").map(|n| node_text(n, source).to_string())
}

/// Whether a `declaration` node is a function prototype.
fn is_prototype(node: Node) -> bool {
    fn has_function_declarator(node: Node) -> bool {
        for i in 0..node.child_count() {
            if let Some(child) = node.child(i) {
                match child.kind() {
                    "function_declarator" => return true,
                    "pointer_declarator" | "reference_declarator" => {
                        if has_function_declarator(child) {
                            return true;
                        }
                    }
                    _ => {}
                }
            }
        }
        false
    }
    has_function_declarator(node)
}

/// Shared walk for both C and C++; `cpp` enables the C++-only node kinds.
#[allow(clippy::too_many_arguments)]
fn walk(
    node: Node,
    source: &[u8],
    file: &str,
    parent: Option<&str>,
    cpp: bool,
    symbols: &mut Vec<Symbol>,
) {
    for i in 0..node.child_count() {
        let Some(child) = node.child(i) else { continue };
        let kind = child.kind();

        if PREPROC_CONTAINERS.contains(&kind) {
            walk(child, source, file, parent, cpp, symbols);
            continue;
        }

        match kind {
            "function_definition" => {
                if let Some(name) = declarator_name(child, source) {
                    let sym_kind = if parent.is_some() && cpp {
                        SymbolKind::Method
                    } else {
                        SymbolKind::Function
                    };
                    symbols.push(
                        Symbol::from_node(name, sym_kind, file, child)
                            .with_visibility(Visibility::Public, true)
                            .with_parent(parent),
                    );
                }
            }
            "declaration" => {
                // Forward declarations in headers resolve quote-includes
                if is_prototype(child) {
                    if let Some(name) = declarator_name(child, source) {
                        symbols.push(
                            Symbol::from_node(name, SymbolKind::Function, file, child)
                                .with_visibility(Visibility::Public, true)
                                .with_parent(parent),
                        );
                    }
                }
            }
            "struct_specifier" | "union_specifier" => {
                if let Some(name) = type_name(child, source) {
                    symbols.push(
                        Symbol::from_node(name, SymbolKind::Struct, file, child)
                            .with_visibility(Visibility::Public, true)
                            .with_parent(parent),
                    );
                }
            }
            "enum_specifier" => {
                if let Some(name) = type_name(child, source) {
                    symbols.push(
                        Symbol::from_node(name, SymbolKind::Enum, file, child)
                            .with_visibility(Visibility::Public, true)
                            .with_parent(parent),
                    );
                }
            }
            "type_definition" => {
                if let Some(name) = type_name(child, source) {
                    symbols.push(
                        Symbol::from_node(name, SymbolKind::Typedef, file, child)
                            .with_visibility(Visibility::Public, true)
                            .with_parent(parent),
                    );
                }
            }
            "class_specifier" if cpp => {
                if let Some(name) = type_name(child, source) {
                    let mut symbol = Symbol::from_node(&name, SymbolKind::Class, file, child)
                        .with_visibility(Visibility::Public, true)
                        .with_parent(parent);
                    if let Some(bases) = find_child(child, "base_class_clause") {
                        symbol.bases = super::dotted_parts(bases, source, &["type_identifier"]);
                    }
                    symbols.push(symbol);
                    if let Some(body) = find_child(child, "field_declaration_list") {
                        walk(body, source, file, Some(name.as_str()), cpp, symbols);
                    }
                }
            }
            "namespace_definition" if cpp => {
                let name = find_child(child, "namespace_identifier")
                    .map(|n| node_text(n, source).to_string());
                if let Some(name) = name {
                    symbols.push(
                        Symbol::from_node(&name, SymbolKind::Namespace, file, child)
                            .with_visibility(Visibility::Unknown, true)
                            .with_parent(parent),
                    );
                    if let Some(body) = child.child_by_field_name("body") {
                        walk(body, source, file, Some(name.as_str()), cpp, symbols);
                    }
                }
            }
            "template_declaration" if cpp => {
                // The template wraps the real declaration; name it after that
                for j in 0..child.child_count() {
                    let Some(inner) = child.child(j) else { continue };
                    let name = match inner.kind() {
                        "class_specifier" | "struct_specifier" => type_name(inner, source),
                        "function_definition" => declarator_name(inner, source),
                        _ => None,
                    };
                    if let Some(name) = name {
                        symbols.push(
                            Symbol::from_node(name, SymbolKind::Template, file, child)
                                .with_visibility(Visibility::Public, true)
                                .with_parent(parent),
                        );
                        break;
                    }
                }
            }
            _ => {}
        }
    }
}

fn find_calls(node: Node, source: &[u8], exclusions: &HashSet<String>, calls: &mut Vec<RawCall>) {
    if node.kind() == "call_expression" {
        let (callee, qualifier) = callee_of(node, source);
        if let Some(callee) = callee {
            let qualified = match &qualifier {
                Some(q) => format!("{q}::{callee}"),
                None => callee.clone(),
            };
            if !exclusions.contains(&callee) && !exclusions.contains(&qualified) {
                calls.push(RawCall {
                    callee,
                    qualifier,
                    line: node.start_position().row + 1,
                });
            }
        }
    }
    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            find_calls(child, source, exclusions, calls);
        }
    }
}

fn callee_of(node: Node, source: &[u8]) -> (Option<String>, Option<String>) {
    let Some(first) = node.child(0) else {
        return (None, None);
    };
    match first.kind() {
        "identifier" => (Some(node_text(first, source).to_string()), None),
        "field_expression" | "qualified_identifier" => {
            let mut parts = super::dotted_parts(
                first,
                source,
                &["identifier", "field_identifier", "namespace_identifier"],
            );
            match parts.len() {
                0 => (None, None),
                1 => (Some(parts.remove(0)), None),
                _ => {
                    let callee = parts.pop();
                    let qualifier = parts.pop();
                    (callee, qualifier)
                }
            }
        }
        _ => (None, None),
    }
}

fn extract_includes(tree: &Tree, source: &[u8]) -> Vec<ImportStatement> {
    fn collect(node: Node, source: &[u8], imports: &mut Vec<ImportStatement>) {
        for i in 0..node.child_count() {
            let Some(child) = node.child(i) else { continue };
            if PREPROC_CONTAINERS.contains(&child.kind()) {
                collect(child, source, imports);
                continue;
            }
            if child.kind() != "preproc_include" {
                continue;
            }
            // Quote includes only; <...> is a system header
            let Some(path_node) = child.child_by_field_name("path") else {
                continue;
            };
            if path_node.kind() != "string_literal" {
                continue;
            }
            let target = node_text(path_node, source).trim_matches('"').to_string();
            imports.push(ImportStatement {
                statement: node_text(child, source).trim().to_string(),
                target,
                line: child.start_position().row + 1,
            });
        }
    }
    let mut imports = Vec::new();
    collect(tree.root_node(), source, &mut imports);
    imports
}

pub struct CAnalyzer;

impl CAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageAnalyzer for CAnalyzer {
    fn language_id(&self) -> &'static str {
        "c"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["c", "h"]
    }

    fn grammar(&self, _ext: &str) -> Language {
        tree_sitter_c::LANGUAGE.into()
    }

    fn extract_symbols(&self, tree: &Tree, source: &[u8], file: &str) -> Vec<Symbol> {
        let mut symbols = Vec::new();
        walk(tree.root_node(), source, file, None, false, &mut symbols);
        symbols
    }

    fn extract_imports(&self, tree: &Tree, source: &[u8]) -> Vec<ImportStatement> {
        extract_includes(tree, source)
    }

    fn extract_calls(&self, tree: &Tree, source: &[u8]) -> Vec<RawCall> {
        let mut calls = Vec::new();
        find_calls(tree.root_node(), source, self.builtin_exclusions(), &mut calls);
        calls
    }

    fn builtin_exclusions(&self) -> &HashSet<String> {
        &C_BUILTIN_EXCLUSIONS
    }
}

pub struct CppAnalyzer;

impl CppAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CppAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageAnalyzer for CppAnalyzer {
    fn language_id(&self) -> &'static str {
        "cpp"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["cpp", "cc", "cxx", "hpp", "hh", "hxx"]
    }

    fn grammar(&self, _ext: &str) -> Language {
        tree_sitter_cpp::LANGUAGE.into()
    }

    fn extract_symbols(&self, tree: &Tree, source: &[u8], file: &str) -> Vec<Symbol> {
        let mut symbols = Vec::new();
        walk(tree.root_node(), source, file, None, true, &mut symbols);
        symbols
    }

    fn extract_imports(&self, tree: &Tree, source: &[u8]) -> Vec<ImportStatement> {
        extract_includes(tree, source)
    }

    fn extract_calls(&self, tree: &Tree, source: &[u8]) -> Vec<RawCall> {
        let mut calls = Vec::new();
        find_calls(tree.root_node(), source, self.builtin_exclusions(), &mut calls);
        calls
    }

    fn builtin_exclusions(&self) -> &HashSet<String> {
        &CPP_BUILTIN_EXCLUSIONS
    }
}
