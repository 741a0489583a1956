//! C# language analyzer.
//!
//! Extracts type/member declarations with visibility and containment,
//! `using` directives, constructor parameter types (for DI-aware call
//! resolution), base lists, attribute names, and raw call sites from
//! invocation and object-creation expressions.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use tree_sitter::{Language, Node, Tree};

use super::{declared_name, find_child, node_text, LanguageAnalyzer};
use crate::analysis::{ImportStatement, RawCall, Symbol, SymbolKind, Visibility};

static BUILTIN_EXCLUSIONS: Lazy<HashSet<String>> = Lazy::new(|| {
    [
        "Task",
        "ValueTask",
        "Console.WriteLine",
        "Console.ReadLine",
        "Console.Write",
        "Console.ReadKey",
        "Console.Clear",
        "String.Format",
        "String.IsNullOrEmpty",
        "String.IsNullOrWhiteSpace",
        "String.Join",
        "String.Concat",
        "String.Compare",
        "string.Format",
        "string.IsNullOrEmpty",
        "string.IsNullOrWhiteSpace",
        "string.Join",
        "string.Concat",
        "string.Compare",
        "Convert.ToInt32",
        "Convert.ToString",
        "Convert.ToDecimal",
        "Convert.ToDouble",
        "Convert.ToBoolean",
        "Convert.ToDateTime",
        "Math.Abs",
        "Math.Max",
        "Math.Min",
        "Math.Round",
        "Math.Floor",
        "Math.Ceiling",
        "Math.Pow",
        "Math.Sqrt",
        "ToString",
        "Equals",
        "GetHashCode",
        "GetType",
        "ReferenceEquals",
        "MemberwiseClone",
        "Debug.WriteLine",
        "Debug.Write",
        "Debug.Assert",
        "Trace.WriteLine",
        "Trace.TraceInformation",
        "GC.Collect",
        "GC.SuppressFinalize",
        "Task.Run",
        "Task.WhenAll",
        "Task.WhenAny",
        "Task.Delay",
        "Task.FromResult",
        "Task.CompletedTask",
        "ValueTask.FromResult",
        "ValueTask.CompletedTask",
        "int.Parse",
        "int.TryParse",
        "Guid.NewGuid",
        "Guid.Parse",
        "Guid.TryParse",
        "nameof",
        "typeof",
        "sizeof",
        "ArgumentNullException.ThrowIfNull",
        "Select",
        "Where",
        "FirstOrDefault",
        "First",
        "Last",
        "LastOrDefault",
        "SingleOrDefault",
        "Single",
        "Any",
        "All",
        "Count",
        "Sum",
        "Average",
        "Min",
        "Max",
        "OrderBy",
        "OrderByDescending",
        "GroupBy",
        "ToList",
        "ToArray",
        "ToDictionary",
        "AsEnumerable",
        "AsQueryable",
        "Skip",
        "Take",
        "Distinct",
        "Union",
        "Intersect",
        "Except",
        "Aggregate",
        "Zip",
        "SelectMany",
        "Contains",
        "Dispose",
        "Close",
    ]
    .into_iter()
    .map(String::from)
    .collect()
});

fn declaration_kind(node_kind: &str) -> Option<SymbolKind> {
    match node_kind {
        "class_declaration" => Some(SymbolKind::Class),
        "interface_declaration" => Some(SymbolKind::Interface),
        "struct_declaration" => Some(SymbolKind::Struct),
        "enum_declaration" => Some(SymbolKind::Enum),
        "namespace_declaration" | "file_scoped_namespace_declaration" => {
            Some(SymbolKind::Namespace)
        }
        "record_declaration" => Some(SymbolKind::Record),
        "delegate_declaration" => Some(SymbolKind::Delegate),
        "method_declaration" => Some(SymbolKind::Method),
        "constructor_declaration" => Some(SymbolKind::Constructor),
        "property_declaration" => Some(SymbolKind::Property),
        _ => None,
    }
}

fn is_container(node_kind: &str) -> bool {
    matches!(
        node_kind,
        "class_declaration"
            | "struct_declaration"
            | "interface_declaration"
            | "record_declaration"
            | "namespace_declaration"
            | "file_scoped_namespace_declaration"
    )
}

fn visibility_of(node: Node, source: &[u8]) -> Visibility {
    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            if child.kind() == "modifier" {
                match node_text(child, source) {
                    "public" => return Visibility::Public,
                    "private" => return Visibility::Private,
                    "internal" => return Visibility::Internal,
                    "protected" => return Visibility::Protected,
                    _ => {}
                }
            }
        }
    }
    // C# members default to private
    Visibility::Private
}

/// Base type names from a `base_list` child (`: IFoo, BarBase`).
fn base_names(node: Node, source: &[u8]) -> Vec<String> {
    let Some(base_list) = find_child(node, "base_list") else {
        return Vec::new();
    };
    let mut bases = Vec::new();
    for i in 0..base_list.child_count() {
        if let Some(child) = base_list.child(i) {
            match child.kind() {
                "identifier" | "qualified_name" => {
                    bases.push(node_text(child, source).to_string());
                }
                "generic_name" => {
                    // Strip the type argument list: IRepository<T> -> IRepository
                    let text = node_text(child, source);
                    bases.push(text.split('<').next().unwrap_or(text).to_string());
                }
                _ => {}
            }
        }
    }
    bases
}

/// Attribute names from `attribute_list` children (`[HttpGet("...")]`).
fn attribute_names(node: Node, source: &[u8]) -> Vec<String> {
    let mut attrs = Vec::new();
    for i in 0..node.child_count() {
        let Some(child) = node.child(i) else { continue };
        if child.kind() != "attribute_list" {
            continue;
        }
        for j in 0..child.child_count() {
            if let Some(attr) = child.child(j) {
                if attr.kind() == "attribute" {
                    if let Some(name) = attr.child_by_field_name("name") {
                        attrs.push(node_text(name, source).to_string());
                    }
                }
            }
        }
    }
    attrs
}

/// Constructor parameter (name, type) pairs for DI tracking.
fn parameter_types(node: Node, source: &[u8]) -> Vec<(String, String)> {
    let Some(params) = node.child_by_field_name("parameters") else {
        return Vec::new();
    };
    let mut pairs = Vec::new();
    for i in 0..params.child_count() {
        if let Some(param) = params.child(i) {
            if param.kind() == "parameter" {
                if let (Some(ty), Some(name)) = (
                    param.child_by_field_name("type"),
                    param.child_by_field_name("name"),
                ) {
                    pairs.push((
                        node_text(name, source).to_string(),
                        node_text(ty, source).to_string(),
                    ));
                }
            }
        }
    }
    pairs
}

pub struct CSharpAnalyzer;

impl CSharpAnalyzer {
    pub fn new() -> Self {
        Self
    }

    fn walk(
        &self,
        node: Node,
        source: &[u8],
        file: &str,
        parent: Option<&str>,
        parent_is_ns: bool,
        symbols: &mut Vec<Symbol>,
    ) {
        for i in 0..node.child_count() {
            let Some(child) = node.child(i) else { continue };
            let Some(kind) = declaration_kind(child.kind()) else {
                continue;
            };
            let Some(name) = declared_name(child, source) else {
                continue;
            };

            let (visibility, exported) = if kind == SymbolKind::Namespace {
                (Visibility::Unknown, true)
            } else {
                let vis = visibility_of(child, source);
                let top_level = parent.is_none() || parent_is_ns;
                let exported =
                    vis == Visibility::Public || (vis == Visibility::Internal && top_level);
                (vis, exported)
            };

            let mut symbol = Symbol::from_node(&name, kind, file, child)
                .with_visibility(visibility, exported)
                .with_parent(parent);
            symbol.bases = base_names(child, source);
            symbol.attributes = attribute_names(child, source);
            if kind == SymbolKind::Constructor {
                symbol.parameter_types = parameter_types(child, source);
            }
            symbols.push(symbol);

            if is_container(child.kind()) {
                let is_ns = kind == SymbolKind::Namespace;
                if let Some(body) = find_child(child, "declaration_list") {
                    self.walk(body, source, file, Some(name.as_str()), is_ns, symbols);
                } else if child.kind() == "file_scoped_namespace_declaration" {
                    // File-scoped namespaces hold declarations directly
                    self.walk(child, source, file, Some(name.as_str()), true, symbols);
                }
            }
        }
    }

    fn collect_usings(&self, node: Node, source: &[u8], imports: &mut Vec<ImportStatement>) {
        for i in 0..node.child_count() {
            let Some(child) = node.child(i) else { continue };
            match child.kind() {
                "using_directive" => {
                    let target = (0..child.child_count())
                        .filter_map(|j| child.child(j))
                        .find(|c| {
                            matches!(c.kind(), "identifier" | "qualified_name" | "name")
                        })
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
                "namespace_declaration" | "file_scoped_namespace_declaration" => {
                    if let Some(body) = find_child(child, "declaration_list") {
                        self.collect_usings(body, source, imports);
                    } else {
                        self.collect_usings(child, source, imports);
                    }
                }
                _ => {}
            }
        }
    }

    fn find_calls(&self, node: Node, source: &[u8], calls: &mut Vec<RawCall>) {
        match node.kind() {
            "invocation_expression" => {
                let (callee, qualifier) = invocation_callee(node, source);
                if let Some(callee) = callee {
                    self.push_call(callee, qualifier, node.start_position().row + 1, calls);
                }
            }
            "object_creation_expression" => {
                let callee = (0..node.child_count())
                    .filter_map(|i| node.child(i))
                    .find(|c| matches!(c.kind(), "identifier" | "qualified_name"))
                    .map(|c| node_text(c, source).to_string());
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

impl Default for CSharpAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Split an invocation target into (callee, qualifier).
fn invocation_callee(node: Node, source: &[u8]) -> (Option<String>, Option<String>) {
    let Some(first) = node.child(0) else {
        return (None, None);
    };
    match first.kind() {
        "identifier" => (Some(node_text(first, source).to_string()), None),
        "member_access_expression" => {
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
        "qualified_name" => {
            let text = node_text(first, source);
            match text.rfind('.') {
                Some(pos) => (
                    Some(text[pos + 1..].to_string()),
                    Some(text[..pos].to_string()),
                ),
                None => (Some(text.to_string()), None),
            }
        }
        _ => (None, None),
    }
}

impl LanguageAnalyzer for CSharpAnalyzer {
    fn language_id(&self) -> &'static str {
        "cs"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["cs"]
    }

    fn grammar(&self, _ext: &str) -> Language {
        tree_sitter_c_sharp::LANGUAGE.into()
    }

    fn extract_symbols(&self, tree: &Tree, source: &[u8], file: &str) -> Vec<Symbol> {
        let mut symbols = Vec::new();
        self.walk(tree.root_node(), source, file, None, false, &mut symbols);
        symbols
    }

    fn extract_imports(&self, tree: &Tree, source: &[u8]) -> Vec<ImportStatement> {
        let mut imports = Vec::new();
        self.collect_usings(tree.root_node(), source, &mut imports);
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
