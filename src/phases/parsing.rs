//! Phase 2: parse source files and extract symbols.
//!
//! Extraction runs per-file in parallel; id assignment is a single serial
//! pass over files sorted by path, so `sym_NNNN` ids are deterministic for
//! a given repository. Parent names are rewritten to parent ids, namespaces
//! feed the namespace index, and base names become INHERITS edges.

use std::collections::HashMap;
use std::path::Path;

use rayon::prelude::*;
use tracing::warn;

use crate::analysis::languages::get_analyzer;
use crate::analysis::{Symbol, SymbolKind};
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::graph::{KnowledgeGraph, NamespaceIndex, SymbolTable};
use crate::pipeline::CancelToken;

/// Files eligible for parsing, sorted by path.
fn parseable_files(kg: &KnowledgeGraph) -> Vec<(String, String)> {
    let mut files: Vec<(String, String)> = kg
        .files()
        .iter()
        .filter(|f| f.parseable)
        .filter_map(|f| {
            let ext = Path::new(&f.path).extension()?.to_string_lossy().to_string();
            let tag = f.language.clone()?;
            get_analyzer(&ext).map(|_| (f.path.clone(), tag))
        })
        .collect();
    files.sort();
    files
}

fn extract_file(repo_root: &str, path: &str) -> Vec<Symbol> {
    let ext = Path::new(path)
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_default();
    let Some(analyzer) = get_analyzer(&ext) else {
        return Vec::new();
    };

    let abs = Path::new(repo_root).join(path);
    let source = match std::fs::read(&abs) {
        Ok(s) => s,
        Err(e) => {
            warn!(file = path, error = %e, "parsing phase: cannot read file");
            return Vec::new();
        }
    };
    let tree = match analyzer.parse(&ext, &source) {
        Ok(t) => t,
        Err(e) => {
            warn!(file = path, error = %e, "parsing phase: parse failed");
            return Vec::new();
        }
    };

    analyzer.extract_symbols(&tree, &source, path)
}

/// Run the parsing phase.
pub fn run(
    config: &AnalysisConfig,
    cancel: &CancelToken,
    kg: &mut KnowledgeGraph,
    st: &mut SymbolTable,
    ns_index: &mut NamespaceIndex,
) -> Result<(), AnalysisError> {
    let files = parseable_files(kg);

    if cancel.is_cancelled() {
        return Err(AnalysisError::Cancelled);
    }

    // Parallel extraction; order is preserved by collecting per input slot.
    let extracted: Vec<(String, String, Vec<Symbol>)> = files
        .par_iter()
        .map(|(path, tag)| (path.clone(), tag.clone(), extract_file(&config.repo_path, path)))
        .collect();

    // Serial id assignment in sorted-file, declaration order.
    let mut counter = 0usize;
    let mut all_ids: Vec<String> = Vec::new();
    for (path, tag, mut symbols) in extracted {
        if cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }

        for symbol in &mut symbols {
            counter += 1;
            symbol.id = format!("sym_{counter:04}");
            symbol.language = Some(tag.clone());
        }

        // Parent names -> parent ids, within the file only
        let name_to_id: HashMap<&str, &str> = symbols
            .iter()
            .map(|s| (s.name.as_str(), s.id.as_str()))
            .collect();
        let resolved_parents: Vec<Option<String>> = symbols
            .iter()
            .map(|s| {
                s.parent
                    .as_deref()
                    .and_then(|p| name_to_id.get(p))
                    .map(|id| id.to_string())
            })
            .collect();

        for (symbol, parent) in symbols.iter_mut().zip(resolved_parents) {
            symbol.parent = parent;
        }

        for symbol in symbols {
            if symbol.kind == SymbolKind::Namespace {
                ns_index.register(&symbol.name, &path);
            }
            st.add(&symbol);
            all_ids.push(symbol.id.clone());
            kg.add_symbol(symbol);
        }
    }

    // INHERITS edges once every symbol is indexed: same-file match first,
    // then a unique global match.
    for id in all_ids {
        let Some(symbol) = kg.symbol(&id) else { continue };
        if symbol.bases.is_empty() {
            continue;
        }
        let file = symbol.file.clone();
        let bases = symbol.bases.clone();
        for base in bases {
            let target = st
                .lookup_exact(&file, &base)
                .map(str::to_string)
                .or_else(|| {
                    let matches = st.lookup_fuzzy(&base);
                    (matches.len() == 1).then(|| matches[0].id.clone())
                });
            if let Some(target_id) = target {
                if target_id != id {
                    kg.add_inherits(&id, &target_id);
                }
            }
        }
    }

    Ok(())
}
