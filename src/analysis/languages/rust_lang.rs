//! Rust language analyzer.
//!
//! Recurses into `impl` and inline `mod` bodies; visibility comes from the
//! `visibility_modifier` child. Macro invocations count as calls so that
//! project-local macros show up in the graph.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use tree_sitter::{Language, Node, Tree};

use super::{node_text, LanguageAnalyzer};
use crate::analysis::{ImportStatement, RawCall, Symbol, SymbolKind, Visibility};

static BUILTIN_EXCLUSIONS: Lazy<HashSet<String>> = Lazy::new(|| {
    [
        "println!",
        "print!",
        "eprintln!",
        "eprint!",
        "format!",
        "write!",
        "writeln!",
        "vec!",
        "todo!",
        "unimplemented!",
        "unreachable!",
        "panic!",
        "assert!",
        "assert_eq!",
        "assert_ne!",
        "debug_assert!",
        "dbg!",
        "cfg!",
        "env!",
        "include_str!",
        "include_bytes!",
        "println",
        "eprintln",
        "format",
        "vec",
        "dbg",
        "assert",
        "assert_eq",
        "assert_ne",
        "todo",
        "unimplemented",
        "panic",
        "unreachable",
        "write",
        "writeln",
        "String::new",
        "String::from",
        "String::with_capacity",
        "Vec::new",
        "Vec::with_capacity",
        "HashMap::new",
        "HashSet::new",
        "BTreeMap::new",
        "BTreeSet::new",
        "Box::new",
        "Rc::new",
        "Arc::new",
        "Cell::new",
        "RefCell::new",
        "Mutex::new",
        "RwLock::new",
        "Ok",
        "Err",
        "Some",
        "None",
        "Default::default",
        "Clone::clone",
        "From::from",
        "Into::into",
        "TryFrom::try_from",
        "AsRef::as_ref",
    ]
    .into_iter()
    .map(String::from)
    .collect()
});

fn declaration_kind(node_kind: &str) -> Option<SymbolKind> {
    match node_kind {
        "function_item" => Some(SymbolKind::Function),
        "struct_item" => Some(SymbolKind::Struct),
        "enum_item" => Some(SymbolKind::Enum),
        "trait_item" => Some(SymbolKind::Trait),
        "impl_item" => Some(SymbolKind::Impl),
        "type_item" => Some(SymbolKind::TypeAlias),
        "const_item" => Some(SymbolKind::Constant),
        "static_item" => Some(SymbolKind::Static),
        "mod_item" => Some(SymbolKind::Module),
        "macro_definition" => Some(SymbolKind::Macro),
        _ => None,
    }
}

fn is_pub(node: Node) -> bool {
    (0..node.child_count())
        .filter_map(|i| node.child(i))
        .any(|c| c.kind() == "visibility_modifier")
}

pub struct RustAnalyzer;

impl RustAnalyzer {
    pub fn new() -> Self {
        Self
    }

    fn name_of(node: Node, source: &[u8]) -> Option<String> {
        if let Some(name) = node.child_by_field_name("name") {
            return Some(node_text(name, source).to_string());
        }
        // impl blocks have a type, not a name
        if node.kind() == "impl_item" {
            if let Some(ty) = node.child_by_field_name("type") {
                return Some(node_text(ty, source).to_string());
            }
        }
        for i in 0..node.child_count() {
            if let Some(child) = node.child(i) {
                if child.kind() == "identifier" || child.kind() == "type_identifier" {
                    return Some(node_text(child, source).to_string());
                }
            }
        }
        None
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
            let Some(kind) = declaration_kind(child.kind()) else {
                continue;
            };
            let Some(name) = Self::name_of(child, source) else {
                continue;
            };

            let public = is_pub(child);
            let visibility = if public {
                Visibility::Public
            } else {
                Visibility::Private
            };
            let mut symbol = Symbol::from_node(&name, kind, file, child)
                .with_visibility(visibility, public)
                .with_parent(parent);
            // `impl Trait for Type` records the trait as a base
            if child.kind() == "impl_item" {
                if let Some(trait_node) = child.child_by_field_name("trait") {
                    symbol.bases.push(node_text(trait_node, source).to_string());
                }
            }
            symbols.push(symbol);

            if child.kind() == "impl_item" || child.kind() == "mod_item" {
                for j in 0..child.child_count() {
                    if let Some(body) = child.child(j) {
                        if body.kind() == "declaration_list" {
                            self.walk(body, source, file, Some(name.as_str()), symbols);
                        }
                    }
                }
            }
        }
    }

    fn find_calls(&self, node: Node, source: &[u8], calls: &mut Vec<RawCall>) {
        let exclusions = self.builtin_exclusions();
        if node.kind() == "call_expression" {
            let (callee, qualifier) = Self::callee_of(node, source);
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
        } else if node.kind() == "macro_invocation" {
            if let Some(name_node) = node.child(0) {
                if name_node.kind() == "identifier" {
                    let name = node_text(name_node, source).to_string();
                    let with_bang = format!("{name}!");
                    if !exclusions.contains(&name) && !exclusions.contains(&with_bang) {
                        calls.push(RawCall {
                            callee: name,
                            qualifier: None,
                            line: node.start_position().row + 1,
                        });
                    }
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
            "scoped_identifier" => {
                let mut parts = super::dotted_parts(
                    first,
                    source,
                    &["identifier", "type_identifier"],
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
            "field_expression" => {
                let mut parts = super::dotted_parts(
                    first,
                    source,
                    &["identifier", "field_identifier"],
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

impl Default for RustAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageAnalyzer for RustAnalyzer {
    fn language_id(&self) -> &'static str {
        "rs"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["rs"]
    }

    fn grammar(&self, _ext: &str) -> Language {
        tree_sitter_rust::LANGUAGE.into()
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
            if child.kind() != "use_declaration" {
                continue;
            }
            let path = (0..child.child_count())
                .filter_map(|j| child.child(j))
                .find(|c| {
                    matches!(
                        c.kind(),
                        "scoped_identifier" | "identifier" | "use_wildcard" | "scoped_use_list"
                    )
                })
                .map(|c| node_text(c, source).to_string());
            if let Some(path) = path {
                imports.push(ImportStatement {
                    statement: node_text(child, source)
                        .trim_end_matches(';')
                        .trim()
                        .to_string(),
                    target: path,
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

    fn parse(source: &str) -> (RustAnalyzer, Tree) {
        let analyzer = RustAnalyzer::new();
        let tree = analyzer.parse("rs", source.as_bytes()).unwrap();
        (analyzer, tree)
    }

    const SAMPLE: &str = r#"
use crate::store::Repository;

pub struct Service {
    repo: Repository,
}

impl Service {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    pub fn fetch(&self, id: u64) -> Option<String> {
        self.repo.find(id)
    }
}

pub trait Store {
    fn find(&self, id: u64) -> Option<String>;
}

fn internal_helper() {
    println!("hidden");
}

pub mod api {
    pub fn serve() {}
}
"#;

    #[test]
    fn extracts_items_and_recurses_into_impl_and_mod() {
        let (analyzer, tree) = parse(SAMPLE);
        let symbols = analyzer.extract_symbols(&tree, SAMPLE.as_bytes(), "lib.rs");

        let service = symbols.iter().find(|s| s.name == "Service" && s.kind == SymbolKind::Struct);
        assert!(service.is_some());

        let fetch = symbols.iter().find(|s| s.name == "fetch").unwrap();
        assert_eq!(fetch.kind, SymbolKind::Function);
        assert_eq!(fetch.parent.as_deref(), Some("Service"));
        assert!(fetch.exported);

        let store = symbols.iter().find(|s| s.name == "Store").unwrap();
        assert_eq!(store.kind, SymbolKind::Trait);

        let serve = symbols.iter().find(|s| s.name == "serve").unwrap();
        assert_eq!(serve.parent.as_deref(), Some("api"));
    }

    #[test]
    fn private_items_not_exported() {
        let (analyzer, tree) = parse(SAMPLE);
        let symbols = analyzer.extract_symbols(&tree, SAMPLE.as_bytes(), "lib.rs");
        let helper = symbols.iter().find(|s| s.name == "internal_helper").unwrap();
        assert!(!helper.exported);
        assert_eq!(helper.visibility, Visibility::Private);
    }

    #[test]
    fn extracts_use_declarations() {
        let (analyzer, tree) = parse(SAMPLE);
        let imports = analyzer.extract_imports(&tree, SAMPLE.as_bytes());
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].target, "crate::store::Repository");
    }

    #[test]
    fn extracts_method_calls_and_filters_macros() {
        let (analyzer, tree) = parse(SAMPLE);
        let calls = analyzer.extract_calls(&tree, SAMPLE.as_bytes());
        let call = calls.iter().find(|c| c.callee == "find").unwrap();
        assert_eq!(call.qualifier.as_deref(), Some("repo"));
        assert!(calls.iter().all(|c| c.callee != "println"));
    }

    #[test]
    fn trait_impl_records_base() {
        let src = r#"
impl Display for Token {
    fn fmt(&self) {}
}
"#;
        let (analyzer, tree) = parse(src);
        let symbols = analyzer.extract_symbols(&tree, src.as_bytes(), "t.rs");
        let imp = symbols.iter().find(|s| s.kind == SymbolKind::Impl).unwrap();
        assert_eq!(imp.name, "Token");
        assert_eq!(imp.bases, vec!["Display"]);
    }

    #[test]
    fn project_macro_invocations_are_calls() {
        let src = r#"
fn run() {
    my_custom_macro!(1, 2);
}
"#;
        let (analyzer, tree) = parse(src);
        let calls = analyzer.extract_calls(&tree, src.as_bytes());
        assert!(calls.iter().any(|c| c.callee == "my_custom_macro"));
    }
}
