//! Java language analyzer.
//!
//! Visibility comes from the modifiers subtree; the package declaration is
//! surfaced as a Namespace symbol. Annotations on members are recorded for
//! framework-aware entry scoring.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use tree_sitter::{Language, Node, Tree};

use super::{find_child, node_text, LanguageAnalyzer};
use crate::analysis::{ImportStatement, RawCall, Symbol, SymbolKind, Visibility};

static BUILTIN_EXCLUSIONS: Lazy<HashSet<String>> = Lazy::new(|| {
    [
        "System.out.println",
        "System.out.print",
        "System.err.println",
        "System.out.printf",
        "System.exit",
        "System.currentTimeMillis",
        "System.nanoTime",
        "System.arraycopy",
        "System.getenv",
        "System.getProperty",
        "String.valueOf",
        "String.format",
        "String.join",
        "Integer.parseInt",
        "Integer.valueOf",
        "Integer.toString",
        "Long.parseLong",
        "Double.parseDouble",
        "Boolean.parseBoolean",
        "Math.max",
        "Math.min",
        "Math.abs",
        "Math.sqrt",
        "Math.round",
        "Arrays.asList",
        "Arrays.sort",
        "Arrays.copyOf",
        "Collections.sort",
        "Collections.unmodifiableList",
        "Collections.emptyList",
        "Collections.singletonList",
        "Objects.requireNonNull",
        "Objects.equals",
        "Objects.hash",
        "Optional.of",
        "Optional.ofNullable",
        "Optional.empty",
        "Thread.sleep",
        "Thread.currentThread",
        "Logger.getLogger",
        "toString",
        "equals",
        "hashCode",
        "getClass",
        "println",
        "printf",
    ]
    .into_iter()
    .map(String::from)
    .collect()
});

fn declaration_kind(node_kind: &str) -> Option<SymbolKind> {
    match node_kind {
        "class_declaration" => Some(SymbolKind::Class),
        "interface_declaration" => Some(SymbolKind::Interface),
        "enum_declaration" => Some(SymbolKind::Enum),
        "method_declaration" => Some(SymbolKind::Method),
        "constructor_declaration" => Some(SymbolKind::Constructor),
        "record_declaration" => Some(SymbolKind::Record),
        "annotation_type_declaration" => Some(SymbolKind::Annotation),
        _ => None,
    }
}

fn is_container(node_kind: &str) -> bool {
    matches!(
        node_kind,
        "class_declaration" | "interface_declaration" | "enum_declaration" | "record_declaration"
    )
}

/// Visibility and annotation names from the modifiers subtree.
fn modifiers_of(node: Node, source: &[u8]) -> (Visibility, Vec<String>) {
    let mut visibility = Visibility::Internal; // Java default is package-private
    let mut annotations = Vec::new();
    let Some(modifiers) = find_child(node, "modifiers") else {
        return (visibility, annotations);
    };
    for i in 0..modifiers.child_count() {
        let Some(m) = modifiers.child(i) else { continue };
        match m.kind() {
            "marker_annotation" | "annotation" => {
                if let Some(name) = m.child_by_field_name("name") {
                    annotations.push(node_text(name, source).to_string());
                }
            }
            _ => match node_text(m, source) {
                "public" => visibility = Visibility::Public,
                "private" => visibility = Visibility::Private,
                "protected" => visibility = Visibility::Protected,
                _ => {}
            },
        }
    }
    (visibility, annotations)
}

/// Superclass and implemented interface names.
fn base_names(node: Node, source: &[u8]) -> Vec<String> {
    let mut bases = Vec::new();
    if let Some(superclass) = find_child(node, "superclass") {
        if let Some(ty) = find_child(superclass, "type_identifier") {
            bases.push(node_text(ty, source).to_string());
        }
    }
    if let Some(interfaces) = find_child(node, "super_interfaces") {
        let mut stack = vec![interfaces];
        while let Some(n) = stack.pop() {
            for i in 0..n.child_count() {
                if let Some(child) = n.child(i) {
                    if child.kind() == "type_identifier" {
                        bases.push(node_text(child, source).to_string());
                    } else {
                        stack.push(child);
                    }
                }
            }
        }
    }
    bases
}

pub struct JavaAnalyzer;

impl JavaAnalyzer {
    pub fn new() -> Self {
        Self
    }

    fn walk(
        &self,
        node: Node,
        source: &[u8],
        file: &str,
        parent: Option<&str>,
        symbols: &mut Vec<Symbol>,
    ) {
        for i in 0..node.child_count() {
            let Some(child) = node.child(i) else { continue };

            if child.kind() == "package_declaration" {
                let name = (0..child.child_count())
                    .filter_map(|j| child.child(j))
                    .find(|c| c.kind() == "scoped_identifier" || c.kind() == "identifier")
                    .map(|c| node_text(c, source).to_string());
                if let Some(name) = name {
                    symbols.push(
                        Symbol::from_node(name, SymbolKind::Namespace, file, child)
                            .with_visibility(Visibility::Unknown, true),
                    );
                }
                continue;
            }

            let Some(kind) = declaration_kind(child.kind()) else {
                continue;
            };
            let Some(name_node) = child.child_by_field_name("name") else {
                continue;
            };
            let name = node_text(name_node, source).to_string();

            let (visibility, annotations) = modifiers_of(child, source);
            let mut symbol = Symbol::from_node(&name, kind, file, child)
                .with_visibility(visibility, visibility == Visibility::Public)
                .with_parent(parent);
            symbol.attributes = annotations;
            if is_container(child.kind()) {
                symbol.bases = base_names(child, source);
            }
            symbols.push(symbol);

            if is_container(child.kind()) {
                if let Some(body) = child.child_by_field_name("body") {
                    self.walk(body, source, file, Some(name.as_str()), symbols);
                }
            }
        }
    }

    fn find_calls(&self, node: Node, source: &[u8], calls: &mut Vec<RawCall>) {
        match node.kind() {
            "method_invocation" => {
                let callee = node
                    .child_by_field_name("name")
                    .map(|n| node_text(n, source).to_string());
                let qualifier = node.child_by_field_name("object").map(|obj| {
                    let parts =
                        super::dotted_parts(obj, source, &["identifier", "field_access"]);
                    parts.last().cloned().unwrap_or_else(|| {
                        node_text(obj, source).to_string()
                    })
                });
                if let Some(callee) = callee {
                    self.push_call(callee, qualifier, node.start_position().row + 1, calls);
                }
            }
            "object_creation_expression" => {
                let callee = find_child(node, "type_identifier")
                    .map(|n| node_text(n, source).to_string());
                if let Some(callee) = callee {
                    self.push_call(callee, None, node.start_position().row + 1, calls);
                }
            }
            _ => {}
        }
        for i in 0..node.child_count() {
            if let Some(child) = node.child(i) {
                self.find_calls(child, source, calls);
            }
        }
    }

    fn push_call(
        &self,
        callee: String,
        qualifier: Option<String>,
        line: usize,
        calls: &mut Vec<RawCall>,
    ) {
        let exclusions = self.builtin_exclusions();
        if exclusions.contains(&callee) {
            return;
        }
        if let Some(ref q) = qualifier {
            if exclusions.contains(&format!("{q}.{callee}")) {
                return;
            }
        }
        calls.push(RawCall {
            callee,
            qualifier,
            line,
        });
    }
}

impl Default for JavaAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageAnalyzer for JavaAnalyzer {
    fn language_id(&self) -> &'static str {
        "java"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["java"]
    }

    fn grammar(&self, _ext: &str) -> Language {
        tree_sitter_java::LANGUAGE.into()
    }

    fn extract_symbols(&self, tree: &Tree, source: &[u8], file: &str) -> Vec<Symbol> {
        let mut symbols = Vec::new();
        self.walk(tree.root_node(), source, file, None, &mut symbols);
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
            let target = (0..child.child_count())
                .filter_map(|j| child.child(j))
                .find(|c| c.kind() == "scoped_identifier")
                .map(|c| node_text(c, source).to_string());
            if let Some(target) = target {
                imports.push(ImportStatement {
                    statement: node_text(child, source)
                        .trim_end_matches(';')
                        .trim()
                        .to_string(),
                    target,
                    line: child.start_position().row + 1,
                });
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

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> (JavaAnalyzer, Tree) {
        let analyzer = JavaAnalyzer::new();
        let tree = analyzer.parse("java", source.as_bytes()).unwrap();
        (analyzer, tree)
    }

    const SAMPLE: &str = r#"
package com.example.app;

import com.example.service.UserService;

public class UserController extends BaseController {
    private final UserService service;

    public UserController(UserService service) {
        this.service = service;
    }

    @GetMapping
    public String handleGet(long id) {
        return service.findUser(id);
    }

    private void audit() {
        System.out.println("audit");
    }
}
"#;

    #[test]
    fn extracts_package_class_and_members() {
        let (analyzer, tree) = parse(SAMPLE);
        let symbols = analyzer.extract_symbols(&tree, SAMPLE.as_bytes(), "UserController.java");

        assert!(symbols
            .iter()
            .any(|s| s.name == "com.example.app" && s.kind == SymbolKind::Namespace));

        let class = symbols.iter().find(|s| s.name == "UserController").unwrap();
        assert_eq!(class.kind, SymbolKind::Class);
        assert!(class.exported);
        assert_eq!(class.bases, vec!["BaseController"]);

        let method = symbols.iter().find(|s| s.name == "handleGet").unwrap();
        assert_eq!(method.kind, SymbolKind::Method);
        assert_eq!(method.parent.as_deref(), Some("UserController"));
        assert!(method.attributes.contains(&"GetMapping".to_string()));

        let audit = symbols.iter().find(|s| s.name == "audit").unwrap();
        assert_eq!(audit.visibility, Visibility::Private);
        assert!(!audit.exported);
    }

    #[test]
    fn extracts_imports() {
        let (analyzer, tree) = parse(SAMPLE);
        let imports = analyzer.extract_imports(&tree, SAMPLE.as_bytes());
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].target, "com.example.service.UserService");
    }

    #[test]
    fn extracts_calls_and_filters_builtins() {
        let (analyzer, tree) = parse(SAMPLE);
        let calls = analyzer.extract_calls(&tree, SAMPLE.as_bytes());
        let call = calls.iter().find(|c| c.callee == "findUser").unwrap();
        assert_eq!(call.qualifier.as_deref(), Some("service"));
        assert!(calls.iter().all(|c| c.callee != "println"));
    }

    #[test]
    fn default_visibility_is_package_private() {
        let src = "class Quiet { void run() {} }";
        let (analyzer, tree) = parse(src);
        let symbols = analyzer.extract_symbols(&tree, src.as_bytes(), "Quiet.java");
        let class = symbols.iter().find(|s| s.name == "Quiet").unwrap();
        assert_eq!(class.visibility, Visibility::Internal);
    }
}
