//! AST-backed fact extraction.
//!
//! This module defines the language-agnostic facts produced by the
//! per-language analyzers in [`languages`]: declared symbols, raw import
//! statements, and raw call sites. The pipeline phases consume these facts
//! and never touch a tree-sitter node directly.

pub mod languages;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of a declared symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolKind {
    Class,
    Function,
    Method,
    Interface,
    Struct,
    Enum,
    Namespace,
    Property,
    Constructor,
    Module,
    Record,
    Delegate,
    TypeAlias,
    Constant,
    Variable,
    Trait,
    Impl,
    Macro,
    Template,
    Typedef,
    Annotation,
    Static,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Class => "Class",
            SymbolKind::Function => "Function",
            SymbolKind::Method => "Method",
            SymbolKind::Interface => "Interface",
            SymbolKind::Struct => "Struct",
            SymbolKind::Enum => "Enum",
            SymbolKind::Namespace => "Namespace",
            SymbolKind::Property => "Property",
            SymbolKind::Constructor => "Constructor",
            SymbolKind::Module => "Module",
            SymbolKind::Record => "Record",
            SymbolKind::Delegate => "Delegate",
            SymbolKind::TypeAlias => "TypeAlias",
            SymbolKind::Constant => "Constant",
            SymbolKind::Variable => "Variable",
            SymbolKind::Trait => "Trait",
            SymbolKind::Impl => "Impl",
            SymbolKind::Macro => "Macro",
            SymbolKind::Template => "Template",
            SymbolKind::Typedef => "Typedef",
            SymbolKind::Annotation => "Annotation",
            SymbolKind::Static => "Static",
        }
    }

    /// Whether this kind can be the source of a call edge.
    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            SymbolKind::Function | SymbolKind::Method | SymbolKind::Constructor
        )
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visibility of a declared symbol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
    Internal,
    Protected,
    #[default]
    Unknown,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Internal => "internal",
            Visibility::Protected => "protected",
            Visibility::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declared symbol extracted from source.
///
/// Analyzers leave `id` empty and fill `parent` with the enclosing
/// declaration's *name*; the parsing phase assigns stable `sym_NNNN` ids in
/// declaration order and rewrites `parent` to the parent symbol's id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    pub id: String,
    pub name: String,
    pub kind: SymbolKind,
    pub file: String,
    /// 1-based line of the declaration.
    pub line: usize,
    /// 1-based last line of the declaration span.
    pub end_line: usize,
    pub visibility: Visibility,
    /// Visible across module boundaries per the language's rules.
    pub exported: bool,
    pub parent: Option<String>,
    /// Lowercase extension tag (`cs`, `ts`, ...), set by the parsing phase.
    pub language: Option<String>,
    /// Constructor parameter (name, type) pairs, recorded for DI resolution.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameter_types: Vec<(String, String)>,
    /// Base class / implemented interface names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bases: Vec<String>,
    /// Attribute / annotation names attached to the declaration.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<String>,
}

impl Symbol {
    /// Build a symbol from a tree-sitter declaration node.
    pub fn from_node(
        name: impl Into<String>,
        kind: SymbolKind,
        file: &str,
        node: tree_sitter::Node,
    ) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            kind,
            file: file.to_string(),
            line: node.start_position().row + 1,
            end_line: node.end_position().row + 1,
            visibility: Visibility::Unknown,
            exported: false,
            parent: None,
            language: None,
            parameter_types: Vec::new(),
            bases: Vec::new(),
            attributes: Vec::new(),
        }
    }

    pub fn with_visibility(mut self, visibility: Visibility, exported: bool) -> Self {
        self.visibility = visibility;
        self.exported = exported;
        self
    }

    pub fn with_parent(mut self, parent: Option<&str>) -> Self {
        self.parent = parent.map(|s| s.to_string());
        self
    }
}

/// A raw import statement, before file-level resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportStatement {
    /// Full statement text, trailing terminator stripped.
    pub statement: String,
    /// The imported specifier: namespace, module path, or file spec.
    pub target: String,
    /// 1-based line of the statement.
    pub line: usize,
}

/// A raw call site, before tier resolution.
///
/// The caller is not recorded here; the calls phase attributes each site to
/// the innermost enclosing callable by line containment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCall {
    /// The called name (method/function, or type for constructions).
    pub callee: String,
    /// Receiver or path qualifier, e.g. `svc` in `svc.Run()`.
    pub qualifier: Option<String>,
    /// 1-based line of the call site.
    pub line: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_strings_use_artifact_casing() {
        assert_eq!(SymbolKind::Class.as_str(), "Class");
        assert_eq!(SymbolKind::TypeAlias.as_str(), "TypeAlias");
        assert_eq!(SymbolKind::Namespace.as_str(), "Namespace");
    }

    #[test]
    fn callable_kinds() {
        assert!(SymbolKind::Function.is_callable());
        assert!(SymbolKind::Method.is_callable());
        assert!(SymbolKind::Constructor.is_callable());
        assert!(!SymbolKind::Class.is_callable());
        assert!(!SymbolKind::Property.is_callable());
    }

    #[test]
    fn visibility_defaults_to_unknown() {
        assert_eq!(Visibility::default(), Visibility::Unknown);
        assert_eq!(Visibility::Internal.as_str(), "internal");
    }
}
