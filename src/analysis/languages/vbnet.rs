//! VB.NET language analyzer.
//!
//! Only compiled with the `vbnet` feature; without it the analyzer reports
//! itself unavailable and `.vb` files degrade to FileNode-only. `Module` is
//! a distinct symbol kind (static container), and `Call Foo()` statements
//! reduce to the wrapped invocation.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use tree_sitter::{Language, Tree};

use super::LanguageAnalyzer;
use crate::analysis::{ImportStatement, RawCall, Symbol};

static BUILTIN_EXCLUSIONS: Lazy<HashSet<String>> = Lazy::new(|| {
    [
        "Console.WriteLine",
        "Console.Write",
        "Console.ReadLine",
        "Console.ReadKey",
        "Debug.WriteLine",
        "Debug.Write",
        "Debug.Assert",
        "MessageBox.Show",
        "String.IsNullOrEmpty",
        "String.IsNullOrWhiteSpace",
        "String.Format",
        "String.Join",
        "Math.Max",
        "Math.Min",
        "Math.Abs",
        "Convert.ToInt32",
        "Convert.ToString",
        "Convert.ToBoolean",
        "CStr",
        "CInt",
        "CLng",
        "CDbl",
        "CBool",
        "CType",
        "DirectCast",
        "TryCast",
        "Task.Run",
        "Task.WhenAll",
        "Task.Delay",
        "Task.FromResult",
        "ArgumentNullException.ThrowIfNull",
    ]
    .into_iter()
    .map(String::from)
    .collect()
});

pub struct VbNetAnalyzer;

impl VbNetAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for VbNetAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "vbnet")]
mod grammar {
    use tree_sitter_language::LanguageFn;

    // The grammar crate's parser.c exports `tree_sitter_vb_dotnet` while its
    // auto-generated lib.rs declares a doubled name; bind the real symbol.
    #[link(name = "tree-sitter-vb-dotnet", kind = "static")]
    extern "C" {
        fn tree_sitter_vb_dotnet() -> *const ();
    }

    pub const VBNET_LANGUAGE: LanguageFn = unsafe { LanguageFn::from_raw(tree_sitter_vb_dotnet) };
}

#[cfg(feature = "vbnet")]
mod extract {
    use tree_sitter::Node;

    use crate::analysis::languages::{find_child, node_text};
    use crate::analysis::{ImportStatement, RawCall, Symbol, SymbolKind, Visibility};

    fn declaration_kind(node_kind: &str) -> Option<SymbolKind> {
        match node_kind {
            "class_block" => Some(SymbolKind::Class),
            "module_block" => Some(SymbolKind::Module),
            "structure_block" => Some(SymbolKind::Struct),
            "interface_block" => Some(SymbolKind::Interface),
            "enum_block" => Some(SymbolKind::Enum),
            "namespace_block" => Some(SymbolKind::Namespace),
            "method_declaration" => Some(SymbolKind::Method),
            "constructor_declaration" => Some(SymbolKind::Constructor),
            "property_declaration" => Some(SymbolKind::Property),
            "delegate_declaration" => Some(SymbolKind::Delegate),
            _ => None,
        }
    }

    fn is_container(node_kind: &str) -> bool {
        matches!(
            node_kind,
            "namespace_block"
                | "class_block"
                | "module_block"
                | "structure_block"
                | "interface_block"
        )
    }

    fn visibility_of(node: Node, source: &[u8]) -> Visibility {
        for i in 0..node.child_count() {
            let Some(child) = node.child(i) else { continue };
            if child.kind() == "modifier" || child.kind() == "access_modifier" {
                match node_text(child, source) {
                    "Public" => return Visibility::Public,
                    "Private" => return Visibility::Private,
                    "Friend" => return Visibility::Internal,
                    "Protected" => return Visibility::Protected,
                    _ => {}
                }
            }
        }
        Visibility::Private
    }

    fn name_of(node: Node, source: &[u8]) -> Option<String> {
        if node.kind() == "constructor_declaration" {
            return Some("New".to_string());
        }
        if let Some(name) = node.child_by_field_name("name") {
            return Some(node_text(name, source).to_string());
        }
        find_child(node, "identifier").map(|n| node_text(n, source).to_string())
    }

    /// `Inherits`/`Implements` statements inside a type block.
    fn base_names(node: Node, source: &[u8]) -> Vec<String> {
        let mut bases = Vec::new();
        for i in 0..node.child_count() {
            let Some(child) = node.child(i) else { continue };
            if child.kind() == "inherits_statement" || child.kind() == "implements_statement" {
                bases.extend(crate::analysis::languages::dotted_parts(
                    child,
                    source,
                    &["identifier", "type_identifier"],
                ));
            }
        }
        bases
    }

    pub fn walk(
        node: Node,
        source: &[u8],
        file: &str,
        parent: Option<&str>,
        symbols: &mut Vec<Symbol>,
    ) {
        for i in 0..node.child_count() {
            let Some(child) = node.child(i) else { continue };

            // type_declaration is a wrapper; descend to the real block
            if child.kind() == "type_declaration" {
                walk(child, source, file, parent, symbols);
                continue;
            }

            let Some(kind) = declaration_kind(child.kind()) else {
                continue;
            };
            let Some(name) = name_of(child, source) else {
                continue;
            };

            let (visibility, exported) = if kind == SymbolKind::Namespace {
                (Visibility::Unknown, true)
            } else if kind == SymbolKind::Module {
                // Modules are implicitly Friend
                (Visibility::Internal, parent.is_none())
            } else {
                let vis = visibility_of(child, source);
                (vis, vis == Visibility::Public)
            };

            let mut symbol = Symbol::from_node(&name, kind, file, child)
                .with_visibility(visibility, exported)
                .with_parent(parent);
            if is_container(child.kind()) {
                symbol.bases = base_names(child, source);
            }
            symbols.push(symbol);

            if is_container(child.kind()) {
                walk(child, source, file, Some(name.as_str()), symbols);
            }
        }
    }

    pub fn imports(root: Node, source: &[u8]) -> Vec<ImportStatement> {
        let mut result = Vec::new();
        for i in 0..root.child_count() {
            let Some(child) = root.child(i) else { continue };
            if child.kind() != "imports_statement" {
                continue;
            }
            let target = crate::analysis::languages::dotted_parts(
                child,
                source,
                &["identifier", "qualified_name"],
            )
            .join(".");
            if !target.is_empty() {
                result.push(ImportStatement {
                    statement: node_text(child, source).trim().to_string(),
                    target,
                    line: child.start_position().row + 1,
                });
            }
        }
        result
    }

    pub fn calls(
        node: Node,
        source: &[u8],
        exclusions: &std::collections::HashSet<String>,
        out: &mut Vec<RawCall>,
    ) {
        if node.kind() == "invocation" || node.kind() == "invocation_expression" {
            let (callee, qualifier) = callee_of(node, source);
            if let Some(callee) = callee {
                let qualified = match &qualifier {
                    Some(q) => format!("{q}.{callee}"),
                    None => callee.clone(),
                };
                if !exclusions.contains(&callee) && !exclusions.contains(&qualified) {
                    out.push(RawCall {
                        callee,
                        qualifier,
                        line: node.start_position().row + 1,
                    });
                }
            }
        }
        for i in 0..node.child_count() {
            if let Some(child) = node.child(i) {
                calls(child, source, exclusions, out);
            }
        }
    }

    fn callee_of(node: Node, source: &[u8]) -> (Option<String>, Option<String>) {
        let Some(first) = node.child(0) else {
            return (None, None);
        };
        match first.kind() {
            "identifier" => (Some(node_text(first, source).to_string()), None),
            "member_access" | "member_access_expression" => {
                let mut parts = crate::analysis::languages::dotted_parts(
                    first,
                    source,
                    &["identifier"],
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

impl LanguageAnalyzer for VbNetAnalyzer {
    fn language_id(&self) -> &'static str {
        "vb"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["vb"]
    }

    #[cfg(feature = "vbnet")]
    fn grammar(&self, _ext: &str) -> Language {
        grammar::VBNET_LANGUAGE.into()
    }

    #[cfg(not(feature = "vbnet"))]
    fn grammar(&self, _ext: &str) -> Language {
        // Guarded by is_available(); callers never reach this without the
        // vbnet feature.
        unreachable!("VB.NET grammar not compiled in")
    }

    fn is_available(&self) -> bool {
        cfg!(feature = "vbnet")
    }

    #[cfg(feature = "vbnet")]
    fn extract_symbols(&self, tree: &Tree, source: &[u8], file: &str) -> Vec<Symbol> {
        let mut symbols = Vec::new();
        extract::walk(tree.root_node(), source, file, None, &mut symbols);
        symbols
    }

    #[cfg(not(feature = "vbnet"))]
    fn extract_symbols(&self, _tree: &Tree, _source: &[u8], _file: &str) -> Vec<Symbol> {
        Vec::new()
    }

    #[cfg(feature = "vbnet")]
    fn extract_imports(&self, tree: &Tree, source: &[u8]) -> Vec<ImportStatement> {
        extract::imports(tree.root_node(), source)
    }

    #[cfg(not(feature = "vbnet"))]
    fn extract_imports(&self, _tree: &Tree, _source: &[u8]) -> Vec<ImportStatement> {
        Vec::new()
    }

    #[cfg(feature = "vbnet")]
    fn extract_calls(&self, tree: &Tree, source: &[u8]) -> Vec<RawCall> {
        let mut calls = Vec::new();
        extract::calls(
            tree.root_node(),
            source,
            self.builtin_exclusions(),
            &mut calls,
        );
        calls
    }

    #[cfg(not(feature = "vbnet"))]
    fn extract_calls(&self, _tree: &Tree, _source: &[u8]) -> Vec<RawCall> {
        Vec::new()
    }

    fn builtin_exclusions(&self) -> &HashSet<String> {
        &BUILTIN_EXCLUSIONS
    }
}
