//! Go language analyzer.
//!
//! Exported follows Go's capitalization rule. Methods record their receiver
//! type as the parent symbol; the package clause is surfaced as a Namespace
//! symbol so the namespace index covers Go packages too.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use tree_sitter::{Language, Node, Tree};

use super::{find_child, node_text, LanguageAnalyzer};
use crate::analysis::{ImportStatement, RawCall, Symbol, SymbolKind, Visibility};

static BUILTIN_EXCLUSIONS: Lazy<HashSet<String>> = Lazy::new(|| {
    [
        "append",
        "cap",
        "close",
        "complex",
        "copy",
        "delete",
        "imag",
        "len",
        "make",
        "new",
        "panic",
        "print",
        "println",
        "real",
        "recover",
        "fmt.Println",
        "fmt.Printf",
        "fmt.Sprintf",
        "fmt.Errorf",
        "fmt.Fprintf",
        "fmt.Print",
        "errors.New",
        "errors.Is",
        "errors.As",
        "log.Println",
        "log.Printf",
        "log.Fatal",
        "log.Fatalf",
        "strings.Join",
        "strings.Split",
        "strings.Contains",
        "strings.TrimSpace",
        "strconv.Itoa",
        "strconv.Atoi",
        "time.Now",
        "time.Since",
        "context.Background",
        "context.TODO",
    ]
    .into_iter()
    .map(String::from)
    .collect()
});

fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_uppercase())
}

fn visibility_for(name: &str) -> Visibility {
    if is_exported(name) {
        Visibility::Public
    } else {
        Visibility::Private
    }
}

pub struct GoAnalyzer;

impl GoAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Receiver type name of a method declaration, pointer stripped.
    fn receiver_type(node: Node, source: &[u8]) -> Option<String> {
        let receiver = node.child_by_field_name("receiver")?;
        let mut stack = vec![receiver];
        while let Some(n) = stack.pop() {
            for i in 0..n.child_count() {
                if let Some(child) = n.child(i) {
                    if child.kind() == "type_identifier" {
                        return Some(node_text(child, source).to_string());
                    }
                    stack.push(child);
                }
            }
        }
        None
    }

    fn string_content(node: Node, source: &[u8]) -> Option<String> {
        let lit = if node.kind() == "interpreted_string_literal" {
            node
        } else {
            find_child(node, "interpreted_string_literal")?
        };
        Some(node_text(lit, source).trim_matches('"').to_string())
    }

    fn push_spec(spec: Node, source: &[u8], imports: &mut Vec<ImportStatement>) {
        if let Some(path) = Self::string_content(spec, source) {
            imports.push(ImportStatement {
                statement: node_text(spec, source).trim().to_string(),
                target: path,
                line: spec.start_position().row + 1,
            });
        }
    }

    fn find_calls(&self, node: Node, source: &[u8], calls: &mut Vec<RawCall>) {
        if node.kind() == "call_expression" {
            let (callee, qualifier) = Self::callee_of(node, source);
            if let Some(callee) = callee {
                let exclusions = self.builtin_exclusions();
                let qualified = match &qualifier {
                    Some(q) => format!("{q}.{callee}"),
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
                self.find_calls(child, source, calls);
            }
        }
    }

    fn callee_of(node: Node, source: &[u8]) -> (Option<String>, Option<String>) {
        let Some(first) = node.child(0) else {
            return (None, None);
        };
        match first.kind() {
            "identifier" => (Some(node_text(first, source).to_string()), None),
            "selector_expression" => {
                let mut parts =
                    super::dotted_parts(first, source, &["identifier", "field_identifier"]);
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
}

impl Default for GoAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageAnalyzer for GoAnalyzer {
    fn language_id(&self) -> &'static str {
        "go"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["go"]
    }

    fn grammar(&self, _ext: &str) -> Language {
        tree_sitter_go::LANGUAGE.into()
    }

    fn extract_symbols(&self, tree: &Tree, source: &[u8], file: &str) -> Vec<Symbol> {
        let mut symbols = Vec::new();
        let root = tree.root_node();

        for i in 0..root.child_count() {
            let Some(child) = root.child(i) else { continue };
            match child.kind() {
                "package_clause" => {
                    if let Some(name) = find_child(child, "package_identifier") {
                        let name = node_text(name, source).to_string();
                        symbols.push(
                            Symbol::from_node(name, SymbolKind::Namespace, file, child)
                                .with_visibility(Visibility::Unknown, true),
                        );
                    }
                }
                "function_declaration" => {
                    if let Some(name) = child.child_by_field_name("name") {
                        let name = node_text(name, source).to_string();
                        let exported = is_exported(&name);
                        symbols.push(
                            Symbol::from_node(&name, SymbolKind::Function, file, child)
                                .with_visibility(visibility_for(&name), exported),
                        );
                    }
                }
                "method_declaration" => {
                    if let Some(name) = child.child_by_field_name("name") {
                        let name = node_text(name, source).to_string();
                        let receiver = Self::receiver_type(child, source);
                        let exported = is_exported(&name);
                        symbols.push(
                            Symbol::from_node(&name, SymbolKind::Method, file, child)
                                .with_visibility(visibility_for(&name), exported)
                                .with_parent(receiver.as_deref()),
                        );
                    }
                }
                "type_declaration" => {
                    for j in 0..child.child_count() {
                        let Some(spec) = child.child(j) else { continue };
                        if spec.kind() != "type_spec" {
                            continue;
                        }
                        let Some(name_node) = spec.child_by_field_name("name") else {
                            continue;
                        };
                        let name = node_text(name_node, source).to_string();
                        let kind = match spec.child_by_field_name("type").map(|t| t.kind()) {
                            Some("struct_type") => SymbolKind::Struct,
                            Some("interface_type") => SymbolKind::Interface,
                            _ => SymbolKind::TypeAlias,
                        };
                        let exported = is_exported(&name);
                        symbols.push(
                            Symbol::from_node(&name, kind, file, spec)
                                .with_visibility(visibility_for(&name), exported),
                        );
                    }
                }
                "const_declaration" => {
                    for j in 0..child.child_count() {
                        let Some(spec) = child.child(j) else { continue };
                        if spec.kind() != "const_spec" {
                            continue;
                        }
                        if let Some(name_node) = spec.child_by_field_name("name") {
                            let name = node_text(name_node, source).to_string();
                            let exported = is_exported(&name);
                            symbols.push(
                                Symbol::from_node(&name, SymbolKind::Constant, file, spec)
                                    .with_visibility(visibility_for(&name), exported),
                            );
                        }
                    }
                }
                _ => {}
            }
        }

        symbols
    }

    fn extract_imports(&self, tree: &Tree, source: &[u8]) -> Vec<ImportStatement> {
        let mut imports = Vec::new();
        let root = tree.root_node();
        for i in 0..root.child_count() {
            let Some(child) = root.child(i) else { continue };
            if child.kind() != "import_declaration" {
                continue;
            }
            for j in 0..child.child_count() {
                let Some(spec) = child.child(j) else { continue };
                match spec.kind() {
                    "import_spec" => Self::push_spec(spec, source, &mut imports),
                    "import_spec_list" => {
                        for k in 0..spec.child_count() {
                            if let Some(sub) = spec.child(k) {
                                if sub.kind() == "import_spec" {
                                    Self::push_spec(sub, source, &mut imports);
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        imports
    }

    fn extract_calls(&self, tree: &Tree, source: &[u8]) -> Vec<RawCall> {
        let mut calls = Vec::new();
        self.find_calls(tree.root_node(), source, &mut calls);
        calls
    }

    fn builtin_exclusions(&self) -> &HashSet<String> {
        &BUILTIN_EXCLUSIONS
    }
}
