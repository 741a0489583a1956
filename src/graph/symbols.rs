//! Dual symbol table: exact `(file, name) → id` and fuzzy `name → [defs]`.
//!
//! Within a file, a duplicate name keeps only the last id for exact lookup;
//! every definition stays visible through the global index.

use std::collections::HashMap;

use crate::analysis::{Symbol, SymbolKind};

/// Lightweight record in the global fuzzy index.
#[derive(Debug, Clone)]
pub struct SymbolDefinition {
    pub id: String,
    pub name: String,
    pub file: String,
    pub kind: SymbolKind,
}

pub struct SymbolTable {
    /// file path → symbol name → symbol id (last write wins per name)
    file_index: HashMap<String, HashMap<String, String>>,
    /// symbol name → all definitions
    global_index: HashMap<String, Vec<SymbolDefinition>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            file_index: HashMap::new(),
            global_index: HashMap::new(),
        }
    }

    pub fn add(&mut self, symbol: &Symbol) {
        self.file_index
            .entry(symbol.file.clone())
            .or_default()
            .insert(symbol.name.clone(), symbol.id.clone());

        self.global_index
            .entry(symbol.name.clone())
            .or_default()
            .push(SymbolDefinition {
                id: symbol.id.clone(),
                name: symbol.name.clone(),
                file: symbol.file.clone(),
                kind: symbol.kind,
            });
    }

    /// Exact lookup by file and name.
    pub fn lookup_exact(&self, file: &str, name: &str) -> Option<&str> {
        self.file_index
            .get(file)
            .and_then(|names| names.get(name))
            .map(String::as_str)
    }

    /// All definitions of a name, across files.
    pub fn lookup_fuzzy(&self, name: &str) -> &[SymbolDefinition] {
        self.global_index.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The name → id map of one file.
    pub fn file_symbols(&self, file: &str) -> Option<&HashMap<String, String>> {
        self.file_index.get(file)
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}
