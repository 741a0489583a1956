//! TypeScript and JavaScript analyzer (shared implementation).
//!
//! Handles `.ts`/`.tsx`/`.mts` with the TypeScript grammars and
//! `.js`/`.jsx`/`.mjs`/`.cjs` with the JavaScript grammar. Arrow functions
//! bound to a `const`/`let` declarator are recorded as functions; default
//! exports and `export` wrappers set the exported flag.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use tree_sitter::{Language, Node, Tree};

use super::{find_child, node_text, LanguageAnalyzer};
use crate::analysis::{ImportStatement, RawCall, Symbol, SymbolKind, Visibility};

static BUILTIN_EXCLUSIONS: Lazy<HashSet<String>> = Lazy::new(|| {
    [
        "console.log",
        "console.error",
        "console.warn",
        "console.info",
        "console.debug",
        "console.trace",
        "JSON.parse",
        "JSON.stringify",
        "parseInt",
        "parseFloat",
        "isNaN",
        "isFinite",
        "encodeURIComponent",
        "decodeURIComponent",
        "setTimeout",
        "setInterval",
        "clearTimeout",
        "clearInterval",
        "Promise.resolve",
        "Promise.reject",
        "Promise.all",
        "Promise.race",
        "Array.isArray",
        "Array.from",
        "Array.of",
        "Object.keys",
        "Object.values",
        "Object.entries",
        "Object.assign",
        "Object.freeze",
        "Object.create",
        "Math.max",
        "Math.min",
        "Math.abs",
        "Math.floor",
        "Math.ceil",
        "Math.round",
        "String.fromCharCode",
        "Number.isInteger",
        "Number.isFinite",
        "require",
        "module.exports",
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
        "function_declaration" => Some(SymbolKind::Function),
        "type_alias_declaration" => Some(SymbolKind::TypeAlias),
        _ => None,
    }
}

pub struct TypeScriptAnalyzer;

impl TypeScriptAnalyzer {
    pub fn new() -> Self {
        Self
    }

    fn name_of(node: Node, source: &[u8]) -> Option<String> {
        for i in 0..node.child_count() {
            if let Some(child) = node.child(i) {
                if child.kind() == "identifier" || child.kind() == "type_identifier" {
                    return Some(node_text(child, source).to_string());
                }
            }
        }
        None
    }

    /// Base names from `class_heritage` (`extends A implements B`).
    fn heritage(node: Node, source: &[u8]) -> Vec<String> {
        let Some(heritage) = find_child(node, "class_heritage") else {
            return Vec::new();
        };
        let mut bases = Vec::new();
        let mut stack = vec![heritage];
        while let Some(n) = stack.pop() {
            for i in 0..n.child_count() {
                if let Some(child) = n.child(i) {
                    match child.kind() {
                        "identifier" | "type_identifier" => {
                            bases.push(node_text(child, source).to_string());
                        }
                        _ => stack.push(child),
                    }
                }
            }
        }
        bases
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

            let mut exported = false;
            let mut decl = child;
            if child.kind() == "export_statement" {
                exported = true;
                for j in 0..child.child_count() {
                    if let Some(c) = child.child(j) {
                        if declaration_kind(c.kind()).is_some() || c.kind() == "lexical_declaration"
                        {
                            decl = c;
                            break;
                        }
                    }
                }
            }

            if let Some(kind) = declaration_kind(decl.kind()) {
                let Some(name) = Self::name_of(decl, source) else {
                    continue;
                };
                let visibility = if exported {
                    Visibility::Public
                } else {
                    Visibility::Private
                };
                let mut symbol = Symbol::from_node(&name, kind, file, decl)
                    .with_visibility(visibility, exported)
                    .with_parent(parent);
                if decl.kind() == "class_declaration" {
                    symbol.bases = Self::heritage(decl, source);
                }
                symbols.push(symbol);

                if decl.kind() == "class_declaration" {
                    if let Some(body) = find_child(decl, "class_body") {
                        self.class_members(body, source, file, &name, symbols);
                    }
                }
            } else if decl.kind() == "lexical_declaration" {
                self.arrow_functions(decl, source, file, parent, exported, symbols);
            }
        }
    }

    /// `const f = (x) => ...` binds an arrow function to a declarator.
    fn arrow_functions(
        &self,
        decl: Node,
        source: &[u8],
        file: &str,
        parent: Option<&str>,
        exported: bool,
        symbols: &mut Vec<Symbol>,
    ) {
        for i in 0..decl.child_count() {
            let Some(declarator) = decl.child(i) else { continue };
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            let mut name = None;
            let mut is_fn = false;
            for j in 0..declarator.child_count() {
                if let Some(c) = declarator.child(j) {
                    match c.kind() {
                        "identifier" => name = Some(node_text(c, source).to_string()),
                        "arrow_function" => is_fn = true,
                        _ => {}
                    }
                }
            }
            if let (Some(name), true) = (name, is_fn) {
                let visibility = if exported {
                    Visibility::Public
                } else {
                    Visibility::Private
                };
                symbols.push(
                    Symbol::from_node(name, SymbolKind::Function, file, declarator)
                        .with_visibility(visibility, exported)
                        .with_parent(parent),
                );
            }
        }
    }

    fn class_members(
        &self,
        body: Node,
        source: &[u8],
        file: &str,
        class_name: &str,
        symbols: &mut Vec<Symbol>,
    ) {
        for i in 0..body.child_count() {
            let Some(member) = body.child(i) else { continue };
            match member.kind() {
                "method_definition" => {
                    let name = find_child(member, "property_identifier")
                        .map(|n| node_text(n, source).to_string());
                    if let Some(name) = name {
                        let kind = if name == "constructor" {
                            SymbolKind::Constructor
                        } else {
                            SymbolKind::Method
                        };
                        symbols.push(
                            Symbol::from_node(name, kind, file, member)
                                .with_visibility(Visibility::Public, true)
                                .with_parent(Some(class_name)),
                        );
                    }
                }
                "public_field_definition" => {
                    let name = find_child(member, "property_identifier")
                        .map(|n| node_text(n, source).to_string());
                    if let Some(name) = name {
                        symbols.push(
                            Symbol::from_node(name, SymbolKind::Property, file, member)
                                .with_visibility(Visibility::Public, true)
                                .with_parent(Some(class_name)),
                        );
                    }
                }
                _ => {}
            }
        }
    }

    /// The quoted module specifier of an import/export/require.
    fn string_specifier(node: Node, source: &[u8]) -> Option<String> {
        let string = find_child(node, "string")?;
        find_child(string, "string_fragment").map(|f| node_text(f, source).to_string())
    }

    fn find_calls(&self, node: Node, source: &[u8], calls: &mut Vec<RawCall>) {
        if node.kind() == "call_expression" || node.kind() == "new_expression" {
            let (callee, qualifier) = self.callee_of(node, source);
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

    fn callee_of(&self, node: Node, source: &[u8]) -> (Option<String>, Option<String>) {
        let Some(first) = node.child(0) else {
            return (None, None);
        };

        if first.kind() == "new" {
            // new_expression: the constructor name follows the keyword
            for i in 1..node.child_count() {
                if let Some(c) = node.child(i) {
                    if c.kind() == "identifier" || c.kind() == "type_identifier" {
                        return (Some(node_text(c, source).to_string()), None);
                    }
                }
            }
            return (None, None);
        }

        match first.kind() {
            "identifier" | "type_identifier" => {
                (Some(node_text(first, source).to_string()), None)
            }
            "member_expression" => {
                let mut parts = super::dotted_parts(
                    first,
                    source,
                    &["identifier", "property_identifier", "type_identifier"],
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
}

impl Default for TypeScriptAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageAnalyzer for TypeScriptAnalyzer {
    fn language_id(&self) -> &'static str {
        "ts"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["ts", "tsx", "mts", "js", "jsx", "mjs", "cjs"]
    }

    fn grammar(&self, ext: &str) -> Language {
        match ext {
            "tsx" => tree_sitter_typescript::LANGUAGE_TSX.into(),
            "js" | "jsx" | "mjs" | "cjs" => tree_sitter_javascript::LANGUAGE.into(),
            _ => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        }
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
            // import ... from '...' and re-exports: export { X } from '...'
            if child.kind() == "import_statement" || child.kind() == "export_statement" {
                if let Some(spec) = Self::string_specifier(child, source) {
                    imports.push(ImportStatement {
                        statement: node_text(child, source)
                            .trim_end_matches(';')
                            .trim()
                            .to_string(),
                        target: spec,
                        line: child.start_position().row + 1,
                    });
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

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ts(source: &str) -> (TypeScriptAnalyzer, Tree) {
        let analyzer = TypeScriptAnalyzer::new();
        let tree = analyzer.parse("ts", source.as_bytes()).unwrap();
        (analyzer, tree)
    }

    const SAMPLE: &str = r#"
import { UserService } from './userService';
import * as db from '../db/connection';

export class UserController {
    private service: UserService;

    constructor(service: UserService) {
        this.service = service;
    }

    handleCreateUser(req: Request): void {
        this.service.createUser(req.body);
        console.log("created");
    }
}

export const formatName = (name: string) => name.trim();

interface UserDto {
    name: string;
}
"#;

    #[test]
    fn extracts_class_methods_and_arrow_functions() {
        let (analyzer, tree) = parse_ts(SAMPLE);
        let symbols = analyzer.extract_symbols(&tree, SAMPLE.as_bytes(), "a.ts");

        let class = symbols.iter().find(|s| s.name == "UserController").unwrap();
        assert_eq!(class.kind, SymbolKind::Class);
        assert!(class.exported);

        let method = symbols.iter().find(|s| s.name == "handleCreateUser").unwrap();
        assert_eq!(method.kind, SymbolKind::Method);
        assert_eq!(method.parent.as_deref(), Some("UserController"));

        let ctor = symbols.iter().find(|s| s.kind == SymbolKind::Constructor).unwrap();
        assert_eq!(ctor.name, "constructor");

        let arrow = symbols.iter().find(|s| s.name == "formatName").unwrap();
        assert_eq!(arrow.kind, SymbolKind::Function);
        assert!(arrow.exported);
    }

    #[test]
    fn non_exported_interface_stays_private() {
        let (analyzer, tree) = parse_ts(SAMPLE);
        let symbols = analyzer.extract_symbols(&tree, SAMPLE.as_bytes(), "a.ts");
        let dto = symbols.iter().find(|s| s.name == "UserDto").unwrap();
        assert_eq!(dto.kind, SymbolKind::Interface);
        assert!(!dto.exported);
    }

    #[test]
    fn extracts_relative_imports() {
        let (analyzer, tree) = parse_ts(SAMPLE);
        let imports = analyzer.extract_imports(&tree, SAMPLE.as_bytes());
        assert_eq!(imports.len(), 2);
        assert!(imports.iter().any(|i| i.target == "./userService"));
        assert!(imports.iter().any(|i| i.target == "../db/connection"));
    }

    #[test]
    fn extracts_qualified_calls_and_filters_console() {
        let (analyzer, tree) = parse_ts(SAMPLE);
        let calls = analyzer.extract_calls(&tree, SAMPLE.as_bytes());
        let call = calls.iter().find(|c| c.callee == "createUser").unwrap();
        assert_eq!(call.qualifier.as_deref(), Some("service"));
        assert!(calls.iter().all(|c| c.callee != "log"));
    }

    #[test]
    fn new_expression_is_a_call() {
        let src = "const repo = new UserRepository();";
        let (analyzer, tree) = parse_ts(src);
        let calls = analyzer.extract_calls(&tree, src.as_bytes());
        assert!(calls.iter().any(|c| c.callee == "UserRepository"));
    }

    #[test]
    fn javascript_grammar_handles_js_sources() {
        let analyzer = TypeScriptAnalyzer::new();
        let src = "function greet(name) { return 'hi ' + name; }";
        let tree = analyzer.parse("js", src.as_bytes()).unwrap();
        let symbols = analyzer.extract_symbols(&tree, src.as_bytes(), "a.js");
        assert!(symbols.iter().any(|s| s.name == "greet" && s.kind == SymbolKind::Function));
    }
}
