//! Mycelium - map the hidden network of connections in a codebase.
//!
//! Mycelium ingests a source repository in a single deterministic pass and
//! emits one JSON artifact describing its structural topology: files,
//! declared symbols, import dependencies, a confidence-scored call graph,
//! clusters of densely interacting symbols, and traced execution flows
//! from likely entry points. The intended consumer is an automated
//! reasoning agent that needs a pre-computed map rather than raw code.
//!
//! # Architecture
//!
//! Six phases run strictly in sequence, each appending to a shared
//! knowledge graph:
//!
//! - `phases::structure`: directory walk, ignore filtering, language
//!   classification
//! - `phases::parsing`: tree-sitter symbol extraction via the per-language
//!   analyzers in `analysis::languages`
//! - `phases::imports`: multi-strategy file→file import resolution
//! - `phases::calls`: three-tier confidence call resolution
//! - `phases::communities`: Louvain clustering with auto-tuning and
//!   recursive split
//! - `phases::processes`: entry-point scoring and bounded BFS tracing
//!
//! # Adding a New Language
//!
//! Implement `analysis::languages::LanguageAnalyzer` and register the
//! extension mappings in `analysis/languages/mod.rs`.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod dotnet;
pub mod error;
pub mod graph;
pub mod phases;
pub mod pipeline;
pub mod report;

pub use analysis::{Symbol, SymbolKind, Visibility};
pub use config::AnalysisConfig;
pub use error::AnalysisError;
pub use graph::{KnowledgeGraph, NamespaceIndex, SymbolTable};
pub use pipeline::CancelToken;
pub use report::Artifact;
