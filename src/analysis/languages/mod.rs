//! Language-specific analyzer implementations.
//!
//! Each analyzer exposes four pure operations over a parsed tree and its
//! source bytes: `extract_symbols`, `extract_imports`, `extract_calls`, and
//! a `builtin_exclusions` set filtered out of call resolution. Analyzers are
//! total: a partial parse yields whatever facts were recoverable.
//!
//! # Adding a New Language
//!
//! 1. Create a module here (e.g. `kotlin.rs`) implementing
//!    [`LanguageAnalyzer`].
//! 2. Register it in [`get_analyzer`] and [`language_tag`].

mod c_cpp;
mod csharp;
mod go;
mod java;
mod python;
mod rust_lang;
mod typescript;
mod vbnet;

pub use c_cpp::{CAnalyzer, CppAnalyzer};
pub use csharp::CSharpAnalyzer;
pub use go::GoAnalyzer;
pub use java::JavaAnalyzer;
pub use python::PythonAnalyzer;
pub use rust_lang::RustAnalyzer;
pub use typescript::TypeScriptAnalyzer;
pub use vbnet::VbNetAnalyzer;

use std::collections::HashSet;

use once_cell::sync::OnceCell;
use tree_sitter::{Language, Tree};

use super::{ImportStatement, RawCall, Symbol};

/// Language-specific analyzer trait.
///
/// Implementations are stateless; tree_sitter::Parser is created per parse
/// because it is not Sync.
pub trait LanguageAnalyzer: Send + Sync {
    /// Primary lowercase language tag (`cs`, `ts`, `py`, ...).
    fn language_id(&self) -> &'static str;

    /// File extensions this analyzer handles (without dot).
    fn file_extensions(&self) -> &'static [&'static str];

    /// The tree-sitter grammar for a given extension.
    fn grammar(&self, ext: &str) -> Language;

    /// Whether the grammar is compiled in. Files of an unavailable language
    /// degrade to FileNode-only.
    fn is_available(&self) -> bool {
        true
    }

    /// Extract all declarations from a parsed file.
    fn extract_symbols(&self, tree: &Tree, source: &[u8], file: &str) -> Vec<Symbol>;

    /// Extract raw import statements from a parsed file.
    fn extract_imports(&self, tree: &Tree, source: &[u8]) -> Vec<ImportStatement>;

    /// Extract raw call sites from a parsed file, builtins already filtered.
    fn extract_calls(&self, tree: &Tree, source: &[u8]) -> Vec<RawCall>;

    /// Fully-qualified names never resolved as project calls.
    fn builtin_exclusions(&self) -> &HashSet<String>;

    /// Parse source with the grammar for `ext`.
    ///
    /// A tree with ERROR nodes is still returned; only a total parser
    /// failure is an error.
    fn parse(&self, ext: &str, source: &[u8]) -> anyhow::Result<Tree> {
        let mut parser = tree_sitter::Parser::new();
        parser.set_language(&self.grammar(ext))?;
        parser
            .parse(source, None)
            .ok_or_else(|| anyhow::anyhow!("tree-sitter returned no tree"))
    }
}

static CSHARP: OnceCell<CSharpAnalyzer> = OnceCell::new();
static VBNET: OnceCell<VbNetAnalyzer> = OnceCell::new();
static TYPESCRIPT: OnceCell<TypeScriptAnalyzer> = OnceCell::new();
static PYTHON: OnceCell<PythonAnalyzer> = OnceCell::new();
static JAVA: OnceCell<JavaAnalyzer> = OnceCell::new();
static GO: OnceCell<GoAnalyzer> = OnceCell::new();
static RUST: OnceCell<RustAnalyzer> = OnceCell::new();
static C: OnceCell<CAnalyzer> = OnceCell::new();
static CPP: OnceCell<CppAnalyzer> = OnceCell::new();

/// Fixed extension → lowercase language tag registry.
///
/// Classification is independent of analyzer availability: a `.vb` file is
/// tagged `vb` even when the VB.NET grammar is not compiled in.
pub fn language_tag(ext: &str) -> Option<&'static str> {
    match ext {
        "cs" => Some("cs"),
        "vb" => Some("vb"),
        "ts" | "tsx" | "mts" => Some("ts"),
        "js" | "jsx" | "mjs" | "cjs" => Some("js"),
        "py" => Some("py"),
        "java" => Some("java"),
        "go" => Some("go"),
        "rs" => Some("rs"),
        "c" | "h" => Some("c"),
        "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => Some("cpp"),
        _ => None,
    }
}

/// Get the analyzer for a file extension, if one is registered and its
/// grammar is available. Analyzers are lazily initialized so unused
/// grammars are never loaded.
pub fn get_analyzer(ext: &str) -> Option<&'static dyn LanguageAnalyzer> {
    let analyzer: &'static dyn LanguageAnalyzer = match ext {
        "cs" => CSHARP.get_or_init(CSharpAnalyzer::new),
        "vb" => VBNET.get_or_init(VbNetAnalyzer::new),
        "ts" | "tsx" | "mts" | "js" | "jsx" | "mjs" | "cjs" => {
            TYPESCRIPT.get_or_init(TypeScriptAnalyzer::new)
        }
        "py" => PYTHON.get_or_init(PythonAnalyzer::new),
        "java" => JAVA.get_or_init(JavaAnalyzer::new),
        "go" => GO.get_or_init(GoAnalyzer::new),
        "rs" => RUST.get_or_init(RustAnalyzer::new),
        "c" | "h" => C.get_or_init(CAnalyzer::new),
        "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => CPP.get_or_init(CppAnalyzer::new),
        _ => return None,
    };
    if analyzer.is_available() {
        Some(analyzer)
    } else {
        None
    }
}

/// Text of a node, empty string on invalid UTF-8.
pub(crate) fn node_text<'a>(node: tree_sitter::Node, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

/// First child of the given kind.
pub(crate) fn find_child<'a>(
    node: tree_sitter::Node<'a>,
    kind: &str,
) -> Option<tree_sitter::Node<'a>> {
    (0..node.child_count()).filter_map(|i| node.child(i)).find(|c| c.kind() == kind)
}

/// In-order identifier-like descendants of an expression subtree.
///
/// Used to split a member-access chain such as `a.b.c()` into parts; the
/// last element is the callee and the one before it the qualifier.
pub(crate) fn dotted_parts(node: tree_sitter::Node, source: &[u8], kinds: &[&str]) -> Vec<String> {
    fn collect(node: tree_sitter::Node, source: &[u8], kinds: &[&str], out: &mut Vec<String>) {
        if kinds.contains(&node.kind()) {
            out.push(node_text(node, source).to_string());
            return;
        }
        for i in 0..node.child_count() {
            if let Some(child) = node.child(i) {
                collect(child, source, kinds, out);
            }
        }
    }
    let mut parts = Vec::new();
    collect(node, source, kinds, &mut parts);
    parts
}

/// Name from the `name` field, falling back to the first identifier child.
pub(crate) fn declared_name(node: tree_sitter::Node, source: &[u8]) -> Option<String> {
    if let Some(name_node) = node.child_by_field_name("name") {
        return Some(node_text(name_node, source).to_string());
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_cover_the_fixed_registry() {
        assert_eq!(language_tag("cs"), Some("cs"));
        assert_eq!(language_tag("tsx"), Some("ts"));
        assert_eq!(language_tag("mjs"), Some("js"));
        assert_eq!(language_tag("h"), Some("c"));
        assert_eq!(language_tag("hpp"), Some("cpp"));
        assert_eq!(language_tag("md"), None);
        assert_eq!(language_tag(""), None);
    }

    #[test]
    fn analyzers_resolve_by_extension() {
        assert!(get_analyzer("cs").is_some());
        assert!(get_analyzer("go").is_some());
        assert!(get_analyzer("unknown").is_none());
        assert_eq!(get_analyzer("ts").unwrap().language_id(), "ts");
    }

    #[test]
    fn vb_tag_is_assigned_even_without_grammar() {
        assert_eq!(language_tag("vb"), Some("vb"));
    }
}
