//! Phase 4: three-tier call resolution.
//!
//! Tier A (0.9, "import-resolved") follows Phase 3 import edges, with two
//! refinements: C# constructor-injection qualifiers (0.85, "di-resolved")
//! and interface-to-implementation fan-out (0.85, "impl-resolved"). Tier B
//! (0.85, "same-file") and Tier C ("fuzzy": 0.5 unique, 0.3 per ambiguous
//! candidate) only apply when no earlier tier matched; A/B never cascade
//! into C. Each call site is attributed to the innermost enclosing callable
//! by line containment; sites outside any callable are dropped.

use std::collections::HashMap;
use std::path::Path;

use tracing::warn;

use crate::analysis::languages::get_analyzer;
use crate::analysis::{RawCall, SymbolKind};
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::graph::{CallEdge, KnowledgeGraph, SymbolTable, Tier};
use crate::pipeline::CancelToken;

const HEADER_EXTENSIONS: &[&str] = &[".h", ".hpp", ".hh", ".hxx"];

/// Run the calls phase.
pub fn run(
    config: &AnalysisConfig,
    cancel: &CancelToken,
    kg: &mut KnowledgeGraph,
    st: &SymbolTable,
) -> Result<(), AnalysisError> {
    let import_map = build_import_map(kg);

    let mut files: Vec<(String, String)> = kg
        .files()
        .iter()
        .filter(|f| f.parseable)
        .filter_map(|f| f.language.clone().map(|tag| (f.path.clone(), tag)))
        .collect();
    files.sort();

    for (path, tag) in &files {
        if cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }

        let ext = Path::new(path)
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_default();
        let Some(analyzer) = get_analyzer(&ext) else {
            continue;
        };

        let abs = Path::new(&config.repo_path).join(path);
        let source = match std::fs::read(&abs) {
            Ok(s) => s,
            Err(e) => {
                warn!(file = %path, error = %e, "calls phase: cannot read file");
                continue;
            }
        };
        let tree = match analyzer.parse(&ext, &source) {
            Ok(t) => t,
            Err(e) => {
                warn!(file = %path, error = %e, "calls phase: parse failed");
                continue;
            }
        };
        let raw_calls = analyzer.extract_calls(&tree, &source);

        let field_types = if tag == "cs" {
            field_type_map(kg, path)
        } else {
            HashMap::new()
        };

        for raw in &raw_calls {
            let Some(caller_id) = enclosing_callable(kg, path, raw.line) else {
                continue;
            };
            let edges = resolve_call(raw, &caller_id, path, tag, st, kg, &import_map, &field_types);
            for edge in edges {
                kg.add_call(edge)?;
            }
        }
    }

    Ok(())
}

/// file → imported files, insertion order, deduplicated.
fn build_import_map(kg: &KnowledgeGraph) -> HashMap<String, Vec<String>> {
    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    for edge in kg.import_edges() {
        let targets = map.entry(edge.from).or_default();
        if !targets.contains(&edge.to) {
            targets.push(edge.to);
        }
    }
    map
}

/// Constructor-injected field/parameter name → type name, for one file.
/// The `_name` field convention is included alongside the parameter name.
fn field_type_map(kg: &KnowledgeGraph, path: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for symbol in kg.symbols_in_file(path) {
        for (param, ty) in &symbol.parameter_types {
            map.insert(param.clone(), ty.clone());
            map.insert(format!("_{param}"), ty.clone());
        }
    }
    map
}

/// The innermost enclosing callable of a call site, by line containment.
fn enclosing_callable(kg: &KnowledgeGraph, path: &str, line: usize) -> Option<String> {
    kg.symbols_in_file(path)
        .into_iter()
        .filter(|s| s.kind.is_callable())
        .filter(|s| s.line <= line && line <= s.end_line)
        .max_by_key(|s| s.line)
        .map(|s| s.id.clone())
}

fn make_edge(from: &str, to: &str, confidence: f64, tier: Tier, reason: &str, line: usize) -> CallEdge {
    CallEdge {
        from: from.to_string(),
        to: to.to_string(),
        confidence,
        tier,
        reason: reason.to_string(),
        line,
    }
}

/// If a Tier-A hit landed on a header declaration, forward it to the
/// matching definition in a source file when one exists.
fn redirect_header_declaration(
    target_id: &str,
    imported_file: &str,
    callee: &str,
    tag: &str,
    st: &SymbolTable,
) -> String {
    if tag != "c" && tag != "cpp" {
        return target_id.to_string();
    }
    if !HEADER_EXTENSIONS.iter().any(|ext| imported_file.ends_with(ext)) {
        return target_id.to_string();
    }
    st.lookup_fuzzy(callee)
        .iter()
        .find(|def| {
            def.kind == SymbolKind::Function
                && !HEADER_EXTENSIONS.iter().any(|ext| def.file.ends_with(ext))
        })
        .map(|def| def.id.clone())
        .unwrap_or_else(|| target_id.to_string())
}

/// Interface-to-implementation fan-out: one 0.85 "impl-resolved" edge per
/// Class/Struct declaring the interface among its bases.
fn impl_fanout(
    kg: &KnowledgeGraph,
    st: &SymbolTable,
    caller_id: &str,
    target_id: &str,
    callee: &str,
    line: usize,
) -> Vec<CallEdge> {
    let Some(target) = kg.symbol(target_id) else {
        return Vec::new();
    };

    // Either the interface itself, or a method declared in one
    let (interface_name, method_callee) = if target.kind == SymbolKind::Interface {
        (target.name.clone(), None)
    } else {
        match target.parent.as_deref().and_then(|p| kg.symbol(p)) {
            Some(parent) if parent.kind == SymbolKind::Interface => {
                (parent.name.clone(), Some(callee))
            }
            _ => return Vec::new(),
        }
    };

    let mut edges = Vec::new();
    for implementor in kg.symbols() {
        if !matches!(implementor.kind, SymbolKind::Class | SymbolKind::Struct) {
            continue;
        }
        if !implementor.bases.iter().any(|b| b == &interface_name) {
            continue;
        }
        let to = match method_callee {
            // The call targets a method: land on the implementing method
            Some(name) => st
                .lookup_exact(&implementor.file, name)
                .filter(|id| {
                    kg.symbol(id)
                        .and_then(|s| s.parent.as_deref())
                        .is_some_and(|p| p == implementor.id)
                })
                .map(str::to_string),
            // The call targets the interface type itself
            None => Some(implementor.id.clone()),
        };
        if let Some(to) = to {
            if to != caller_id && to != target_id {
                edges.push(make_edge(caller_id, &to, 0.85, Tier::A, "impl-resolved", line));
            }
        }
    }
    edges
}

/// Resolve one raw call into zero or more edges.
#[allow(clippy::too_many_arguments)]
pub(crate) fn resolve_call(
    raw: &RawCall,
    caller_id: &str,
    file: &str,
    tag: &str,
    st: &SymbolTable,
    kg: &KnowledgeGraph,
    import_map: &HashMap<String, Vec<String>>,
    field_types: &HashMap<String, String>,
) -> Vec<CallEdge> {
    let callee = raw.callee.as_str();
    let imports = import_map.get(file).map(Vec::as_slice).unwrap_or(&[]);

    // --- Tier A: import-resolved ---
    for imported in imports {
        if let Some(target) = st.lookup_exact(imported, callee) {
            if target == caller_id {
                continue;
            }
            let target = redirect_header_declaration(target, imported, callee, tag, st);
            let mut edges = vec![make_edge(
                caller_id,
                &target,
                0.9,
                Tier::A,
                "import-resolved",
                raw.line,
            )];
            edges.extend(impl_fanout(kg, st, caller_id, &target, callee, raw.line));
            return edges;
        }
    }

    // --- Tier A, DI-refined: the qualifier is an injected field ---
    if tag == "cs" {
        if let Some(type_name) = raw.qualifier.as_deref().and_then(|q| field_types.get(q)) {
            for imported in imports {
                if st.lookup_exact(imported, type_name).is_none() {
                    continue;
                }
                if let Some(target) = st.lookup_exact(imported, callee) {
                    if target == caller_id {
                        continue;
                    }
                    let mut edges = vec![make_edge(
                        caller_id,
                        target,
                        0.85,
                        Tier::A,
                        "di-resolved",
                        raw.line,
                    )];
                    edges.extend(impl_fanout(kg, st, caller_id, target, callee, raw.line));
                    return edges;
                }
            }
        }
    }

    // --- Tier B: same-file ---
    if let Some(target) = st.lookup_exact(file, callee) {
        if target != caller_id {
            return vec![make_edge(
                caller_id,
                target,
                0.85,
                Tier::B,
                "same-file",
                raw.line,
            )];
        }
    }

    // --- Tier C: fuzzy global; ambiguity is preserved, not collapsed ---
    let candidates: Vec<&str> = st
        .lookup_fuzzy(callee)
        .iter()
        .filter(|def| def.file != file && def.id != caller_id)
        .map(|def| def.id.as_str())
        .collect();
    match candidates.len() {
        0 => Vec::new(),
        1 => vec![make_edge(
            caller_id,
            candidates[0],
            0.5,
            Tier::C,
            "fuzzy",
            raw.line,
        )],
        _ => candidates
            .into_iter()
            .map(|to| make_edge(caller_id, to, 0.3, Tier::C, "fuzzy", raw.line))
            .collect(),
    }
}
