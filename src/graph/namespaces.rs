//! Namespace-to-file inverse index.
//!
//! Obeys `ns ∈ namespaces(file) ⇔ file ∈ files(ns)`; both directions are
//! maintained on every registration.

use std::collections::HashMap;

pub struct NamespaceIndex {
    /// namespace → files declaring it
    ns_to_files: HashMap<String, Vec<String>>,
    /// file → namespaces declared in it
    file_to_ns: HashMap<String, Vec<String>>,
}

impl NamespaceIndex {
    pub fn new() -> Self {
        Self {
            ns_to_files: HashMap::new(),
            file_to_ns: HashMap::new(),
        }
    }

    /// Record that `file` declares `namespace`. Idempotent.
    pub fn register(&mut self, namespace: &str, file: &str) {
        let files = self.ns_to_files.entry(namespace.to_string()).or_default();
        if !files.iter().any(|f| f == file) {
            files.push(file.to_string());
        }
        let namespaces = self.file_to_ns.entry(file.to_string()).or_default();
        if !namespaces.iter().any(|n| n == namespace) {
            namespaces.push(namespace.to_string());
        }
    }

    pub fn files_for(&self, namespace: &str) -> &[String] {
        self.ns_to_files
            .get(namespace)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn namespaces_of(&self, file: &str) -> &[String] {
        self.file_to_ns.get(file).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl Default for NamespaceIndex {
    fn default() -> Self {
        Self::new()
    }
}
