//! The in-memory knowledge graph and its lookup indices.
//!
//! - [`knowledge`]: typed directed multigraph of files, folders, symbols,
//!   communities and processes
//! - [`symbols`]: dual symbol table (exact per-file + fuzzy global)
//! - [`namespaces`]: namespace/package → files inverse index
//! - [`scoring`]: entry-point scoring for the process tracer

pub mod knowledge;
pub mod namespaces;
pub mod scoring;
pub mod symbols;

pub use knowledge::{
    CallEdge, CallInfo, Community, FileNode, FolderNode, ImportEdge, KnowledgeGraph,
    PackageReference, Process, ProcessKind, ProjectReference, Tier,
};
pub use namespaces::NamespaceIndex;
pub use symbols::{SymbolDefinition, SymbolTable};
