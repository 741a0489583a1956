//! Python language analyzer.
//!
//! Exported means top-level and not name-mangled with a leading underscore
//! (conservative). Decorated definitions are unwrapped to the inner
//! class/function.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use tree_sitter::{Language, Node, Tree};

use super::{find_child, node_text, LanguageAnalyzer};
use crate::analysis::{ImportStatement, RawCall, Symbol, SymbolKind, Visibility};

static BUILTIN_EXCLUSIONS: Lazy<HashSet<String>> = Lazy::new(|| {
    [
        "print",
        "len",
        "range",
        "enumerate",
        "zip",
        "map",
        "filter",
        "sorted",
        "reversed",
        "list",
        "dict",
        "set",
        "tuple",
        "str",
        "int",
        "float",
        "bool",
        "bytes",
        "type",
        "isinstance",
        "issubclass",
        "getattr",
        "setattr",
        "hasattr",
        "delattr",
        "callable",
        "super",
        "property",
        "staticmethod",
        "classmethod",
        "open",
        "input",
        "format",
        "repr",
        "hash",
        "id",
        "abs",
        "min",
        "max",
        "sum",
        "round",
        "pow",
        "divmod",
        "all",
        "any",
        "iter",
        "next",
        "ord",
        "chr",
        "hex",
        "oct",
        "bin",
        "vars",
        "dir",
        "globals",
        "locals",
        "ValueError",
        "TypeError",
        "KeyError",
        "IndexError",
        "RuntimeError",
        "AttributeError",
        "Exception",
        "logging.getLogger",
        "logging.info",
        "logging.debug",
        "logging.warning",
        "logging.error",
        "os.path.join",
        "os.path.exists",
        "os.path.dirname",
        "json.loads",
        "json.dumps",
    ]
    .into_iter()
    .map(String::from)
    .collect()
});

pub struct PythonAnalyzer;

impl PythonAnalyzer {
    pub fn new() -> Self {
        Self
    }

    fn name_of(node: Node, source: &[u8]) -> Option<String> {
        find_child(node, "identifier").map(|n| node_text(n, source).to_string())
    }

    /// Base class names from the `argument_list` of a class definition.
    fn class_bases(node: Node, source: &[u8]) -> Vec<String> {
        let Some(args) = find_child(node, "argument_list") else {
            return Vec::new();
        };
        (0..args.child_count())
            .filter_map(|i| args.child(i))
            .filter(|c| c.kind() == "identifier" || c.kind() == "attribute")
            .map(|c| node_text(c, source).to_string())
            .collect()
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
            match child.kind() {
                "class_definition" => {
                    let Some(name) = Self::name_of(child, source) else {
                        continue;
                    };
                    let exported = parent.is_none() && !name.starts_with('_');
                    let mut symbol = Symbol::from_node(&name, SymbolKind::Class, file, child)
                        .with_visibility(Visibility::Public, exported)
                        .with_parent(parent);
                    symbol.bases = Self::class_bases(child, source);
                    symbols.push(symbol);

                    if let Some(body) = find_child(child, "block") {
                        self.walk(body, source, file, Some(name.as_str()), symbols);
                    }
                }
                "function_definition" => {
                    let Some(name) = Self::name_of(child, source) else {
                        continue;
                    };
                    let kind = match parent {
                        Some(_) if name == "__init__" => SymbolKind::Constructor,
                        Some(_) => SymbolKind::Method,
                        None => SymbolKind::Function,
                    };
                    let visibility = if name.starts_with('_') && !name.starts_with("__") {
                        Visibility::Private
                    } else {
                        Visibility::Public
                    };
                    let exported = parent.is_none() && !name.starts_with('_');
                    symbols.push(
                        Symbol::from_node(name, kind, file, child)
                            .with_visibility(visibility, exported)
                            .with_parent(parent),
                    );
                }
                "decorated_definition" => {
                    // Unwrap to the inner class/function definition
                    self.walk(child, source, file, parent, symbols);
                }
                _ => {}
            }
        }
    }

    fn find_calls(&self, node: Node, source: &[u8], calls: &mut Vec<RawCall>) {
        if node.kind() == "call" {
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
            "attribute" => {
                let mut parts = super::dotted_parts(first, source, &["identifier"]);
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

impl Default for PythonAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageAnalyzer for PythonAnalyzer {
    fn language_id(&self) -> &'static str {
        "py"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["py"]
    }

    fn grammar(&self, _ext: &str) -> Language {
        tree_sitter_python::LANGUAGE.into()
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
            match child.kind() {
                "import_statement" => {
                    // import foo, import foo.bar
                    for j in 0..child.child_count() {
                        if let Some(c) = child.child(j) {
                            if c.kind() == "dotted_name" {
                                imports.push(ImportStatement {
                                    statement: node_text(child, source).to_string(),
                                    target: node_text(c, source).to_string(),
                                    line: child.start_position().row + 1,
                                });
                            }
                        }
                    }
                }
                "import_from_statement" => {
                    // from foo.bar import baz / from . import baz
                    let module = (0..child.child_count())
                        .filter_map(|j| child.child(j))
                        .find(|c| c.kind() == "dotted_name" || c.kind() == "relative_import")
                        .map(|c| node_text(c, source).to_string());
                    if let Some(module) = module {
                        imports.push(ImportStatement {
                            statement: node_text(child, source).to_string(),
                            target: module,
                            line: child.start_position().row + 1,
                        });
                    }
                }
                _ => {}
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

    fn parse(source: &str) -> (PythonAnalyzer, Tree) {
        let analyzer = PythonAnalyzer::new();
        let tree = analyzer.parse("py", source.as_bytes()).unwrap();
        (analyzer, tree)
    }

    const SAMPLE: &str = r#"
import os
from app.services import UserService
from . import helpers

class UserHandler(BaseHandler):
    def __init__(self, service):
        self.service = service

    def handle_get(self, user_id):
        return self.service.find_user(user_id)

    def _internal(self):
        pass

def create_app():
    handler = UserHandler(UserService())
    print("ready")
    return handler

def _private_helper():
    pass
"#;

    #[test]
    fn extracts_classes_methods_and_functions() {
        let (analyzer, tree) = parse(SAMPLE);
        let symbols = analyzer.extract_symbols(&tree, SAMPLE.as_bytes(), "app.py");

        let class = symbols.iter().find(|s| s.name == "UserHandler").unwrap();
        assert_eq!(class.kind, SymbolKind::Class);
        assert!(class.exported);
        assert_eq!(class.bases, vec!["BaseHandler"]);

        let init = symbols.iter().find(|s| s.name == "__init__").unwrap();
        assert_eq!(init.kind, SymbolKind::Constructor);
        assert_eq!(init.parent.as_deref(), Some("UserHandler"));

        let method = symbols.iter().find(|s| s.name == "handle_get").unwrap();
        assert_eq!(method.kind, SymbolKind::Method);

        let func = symbols.iter().find(|s| s.name == "create_app").unwrap();
        assert_eq!(func.kind, SymbolKind::Function);
        assert!(func.exported);
    }

    #[test]
    fn leading_underscore_is_not_exported() {
        let (analyzer, tree) = parse(SAMPLE);
        let symbols = analyzer.extract_symbols(&tree, SAMPLE.as_bytes(), "app.py");
        let private = symbols.iter().find(|s| s.name == "_private_helper").unwrap();
        assert!(!private.exported);
        assert_eq!(private.visibility, Visibility::Private);
        // methods are never exported (not top-level)
        let method = symbols.iter().find(|s| s.name == "handle_get").unwrap();
        assert!(!method.exported);
    }

    #[test]
    fn extracts_plain_and_from_imports() {
        let (analyzer, tree) = parse(SAMPLE);
        let imports = analyzer.extract_imports(&tree, SAMPLE.as_bytes());
        assert!(imports.iter().any(|i| i.target == "os"));
        assert!(imports.iter().any(|i| i.target == "app.services"));
        assert!(imports.iter().any(|i| i.target == "."));
    }

    #[test]
    fn extracts_calls_and_filters_builtins() {
        let (analyzer, tree) = parse(SAMPLE);
        let calls = analyzer.extract_calls(&tree, SAMPLE.as_bytes());
        let call = calls.iter().find(|c| c.callee == "find_user").unwrap();
        assert_eq!(call.qualifier.as_deref(), Some("service"));
        assert!(calls.iter().any(|c| c.callee == "UserHandler"));
        assert!(calls.iter().all(|c| c.callee != "print"));
    }

    #[test]
    fn decorated_definitions_are_unwrapped() {
        let src = r#"
@app.route("/users")
def list_users():
    return []
"#;
        let (analyzer, tree) = parse(src);
        let symbols = analyzer.extract_symbols(&tree, src.as_bytes(), "a.py");
        assert!(symbols.iter().any(|s| s.name == "list_users"));
    }
}
