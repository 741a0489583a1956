//! Typed directed multigraph over petgraph's `DiGraph`.
//!
//! Nodes are files, folders, symbols, communities, processes, projects and
//! packages; edges are DEFINES, IMPORTS, CALLS, INHERITS, MEMBER_OF, STEP
//! and the .NET reference kinds. A string-keyed side index gives O(1)
//! lookup; cycles are natural and never special-cased here.

use std::collections::HashMap;
use std::fmt;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::analysis::Symbol;
use crate::error::AnalysisError;

/// A source file in the repository.
#[derive(Debug, Clone)]
pub struct FileNode {
    /// Repo-relative, forward-slash path.
    pub path: String,
    /// Lowercase extension tag, None for unrecognised extensions.
    pub language: Option<String>,
    pub size: u64,
    pub lines: usize,
    /// False for files over the size threshold; they keep their FileNode
    /// but are skipped by the parsing phases.
    pub parseable: bool,
}

/// A directory in the repository.
#[derive(Debug, Clone)]
pub struct FolderNode {
    pub path: String,
    pub file_count: usize,
}

/// Confidence bucket of a resolved call edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    A,
    B,
    C,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::A => "A",
            Tier::B => "B",
            Tier::C => "C",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved call between two symbols.
#[derive(Debug, Clone)]
pub struct CallEdge {
    pub from: String,
    pub to: String,
    pub confidence: f64,
    pub tier: Tier,
    pub reason: String,
    pub line: usize,
}

/// One endpoint of a call relation, as seen from the other side.
#[derive(Debug, Clone)]
pub struct CallInfo {
    pub id: String,
    pub confidence: f64,
    pub tier: Tier,
    pub reason: String,
    pub line: usize,
}

/// A resolved file-to-file import.
#[derive(Debug, Clone)]
pub struct ImportEdge {
    pub from: String,
    pub to: String,
    pub statement: String,
}

/// A .NET project-to-project reference.
#[derive(Debug, Clone)]
pub struct ProjectReference {
    pub from: String,
    pub to: String,
    pub kind: String,
}

/// A .NET project-to-package reference.
#[derive(Debug, Clone)]
pub struct PackageReference {
    pub project: String,
    pub package: String,
    pub version: String,
}

/// A cluster of densely interacting symbols.
#[derive(Debug, Clone)]
pub struct Community {
    pub id: String,
    pub label: String,
    pub members: Vec<String>,
    pub cohesion: f64,
    pub primary_language: String,
}

/// Classification of a traced execution flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessKind {
    IntraCommunity,
    CrossCommunity,
}

impl ProcessKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessKind::IntraCommunity => "intra_community",
            ProcessKind::CrossCommunity => "cross_community",
        }
    }
}

/// A traced execution flow from a scored entry point.
#[derive(Debug, Clone)]
pub struct Process {
    pub id: String,
    pub entry: String,
    pub terminal: String,
    pub steps: Vec<String>,
    pub kind: ProcessKind,
    pub total_confidence: f64,
}

/// Node payloads; the string key of each node derives from its payload.
#[derive(Debug, Clone)]
pub enum NodeData {
    File(FileNode),
    Folder(FolderNode),
    Symbol(Symbol),
    Community(Community),
    Process(Process),
    Project(String),
    Package(String),
}

impl NodeData {
    fn key(&self) -> String {
        match self {
            NodeData::File(f) => format!("file:{}", f.path),
            NodeData::Folder(f) => format!("folder:{}", f.path),
            NodeData::Symbol(s) => s.id.clone(),
            NodeData::Community(c) => c.id.clone(),
            NodeData::Process(p) => p.id.clone(),
            NodeData::Project(name) => format!("project:{name}"),
            NodeData::Package(name) => format!("package:{name}"),
        }
    }
}

/// Edge payloads.
#[derive(Debug, Clone)]
pub enum EdgeData {
    Defines,
    Imports { statement: String },
    Calls {
        confidence: f64,
        tier: Tier,
        reason: String,
        line: usize,
    },
    Inherits,
    MemberOf,
    Step { order: usize },
    ProjectRef { kind: String },
    PackageRef { version: String },
}

/// The pipeline-owned knowledge graph.
///
/// Mutable only during the phase that owns each entity kind; later phases
/// read earlier output through the query methods.
pub struct KnowledgeGraph {
    graph: DiGraph<NodeData, EdgeData>,
    index: HashMap<String, NodeIndex>,
}

impl KnowledgeGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
        }
    }

    fn ensure(&mut self, data: NodeData) -> NodeIndex {
        let key = data.key();
        if let Some(&idx) = self.index.get(&key) {
            return idx;
        }
        let idx = self.graph.add_node(data);
        self.index.insert(key, idx);
        idx
    }

    fn symbol_index(&self, id: &str) -> Option<NodeIndex> {
        let idx = *self.index.get(id)?;
        matches!(self.graph.node_weight(idx), Some(NodeData::Symbol(_))).then_some(idx)
    }

    fn key_of(&self, idx: NodeIndex) -> Option<String> {
        self.graph.node_weight(idx).map(|n| n.key())
    }

    pub fn has_node(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    // --- Construction ---

    pub fn add_file(&mut self, file: FileNode) {
        let key = format!("file:{}", file.path);
        if let Some(&idx) = self.index.get(&key) {
            // A placeholder may have been created by an earlier edge; replace it
            if let Some(node) = self.graph.node_weight_mut(idx) {
                *node = NodeData::File(file);
            }
            return;
        }
        self.ensure(NodeData::File(file));
    }

    pub fn add_folder(&mut self, folder: FolderNode) {
        self.ensure(NodeData::Folder(folder));
    }

    /// Insert a symbol and its DEFINES edge from the declaring file.
    pub fn add_symbol(&mut self, symbol: Symbol) {
        let file_key = format!("file:{}", symbol.file);
        let file_idx = match self.index.get(&file_key) {
            Some(&idx) => idx,
            None => self.ensure(NodeData::File(FileNode {
                path: symbol.file.clone(),
                language: symbol.language.clone(),
                size: 0,
                lines: 0,
                parseable: true,
            })),
        };
        let sym_idx = self.ensure(NodeData::Symbol(symbol));
        self.graph.add_edge(file_idx, sym_idx, EdgeData::Defines);
    }

    /// Insert a CALLS edge. Both endpoints must already be symbol nodes;
    /// anything else is an internal invariant violation.
    pub fn add_call(&mut self, edge: CallEdge) -> Result<(), AnalysisError> {
        let from = self.symbol_index(&edge.from).ok_or_else(|| {
            AnalysisError::InvariantViolation(format!(
                "call edge references unknown symbol {}",
                edge.from
            ))
        })?;
        let to = self.symbol_index(&edge.to).ok_or_else(|| {
            AnalysisError::InvariantViolation(format!(
                "call edge references unknown symbol {}",
                edge.to
            ))
        })?;
        self.graph.add_edge(
            from,
            to,
            EdgeData::Calls {
                confidence: edge.confidence,
                tier: edge.tier,
                reason: edge.reason,
                line: edge.line,
            },
        );
        Ok(())
    }

    /// Insert an INHERITS edge between two symbols, skipping silently when
    /// either side is not indexed (unresolvable base names are common).
    pub fn add_inherits(&mut self, from_id: &str, to_id: &str) {
        if let (Some(from), Some(to)) = (self.symbol_index(from_id), self.symbol_index(to_id)) {
            self.graph.add_edge(from, to, EdgeData::Inherits);
        }
    }

    pub fn add_import(&mut self, edge: ImportEdge) {
        let from = self.ensure(NodeData::File(FileNode {
            path: edge.from.clone(),
            language: None,
            size: 0,
            lines: 0,
            parseable: true,
        }));
        let to = self.ensure(NodeData::File(FileNode {
            path: edge.to.clone(),
            language: None,
            size: 0,
            lines: 0,
            parseable: true,
        }));
        self.graph.add_edge(
            from,
            to,
            EdgeData::Imports {
                statement: edge.statement,
            },
        );
    }

    pub fn add_project_reference(&mut self, reference: ProjectReference) {
        let from = self.ensure(NodeData::Project(reference.from));
        let to = self.ensure(NodeData::Project(reference.to));
        self.graph
            .add_edge(from, to, EdgeData::ProjectRef { kind: reference.kind });
    }

    pub fn add_package_reference(&mut self, reference: PackageReference) {
        let project = self.ensure(NodeData::Project(reference.project));
        let package = self.ensure(NodeData::Package(reference.package));
        self.graph.add_edge(
            project,
            package,
            EdgeData::PackageRef {
                version: reference.version,
            },
        );
    }

    pub fn add_community(&mut self, community: Community) {
        let members = community.members.clone();
        let comm_idx = self.ensure(NodeData::Community(community));
        for member in &members {
            if let Some(idx) = self.symbol_index(member) {
                self.graph.add_edge(idx, comm_idx, EdgeData::MemberOf);
            }
        }
    }

    pub fn add_process(&mut self, process: Process) {
        let steps = process.steps.clone();
        let proc_idx = self.ensure(NodeData::Process(process));
        for (order, step) in steps.iter().enumerate() {
            if let Some(idx) = self.symbol_index(step) {
                self.graph.add_edge(proc_idx, idx, EdgeData::Step { order });
            }
        }
    }

    // --- Queries ---

    pub fn files(&self) -> Vec<&FileNode> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                NodeData::File(f) => Some(f),
                _ => None,
            })
            .collect()
    }

    pub fn folders(&self) -> Vec<&FolderNode> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                NodeData::Folder(f) => Some(f),
                _ => None,
            })
            .collect()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.graph.node_weights().filter_map(|n| match n {
            NodeData::Symbol(s) => Some(s),
            _ => None,
        })
    }

    pub fn symbol(&self, id: &str) -> Option<&Symbol> {
        let idx = self.symbol_index(id)?;
        match self.graph.node_weight(idx) {
            Some(NodeData::Symbol(s)) => Some(s),
            _ => None,
        }
    }

    /// Symbols declared in a file, via its DEFINES edges.
    pub fn symbols_in_file(&self, path: &str) -> Vec<&Symbol> {
        let Some(&file_idx) = self.index.get(&format!("file:{path}")) else {
            return Vec::new();
        };
        let mut result: Vec<&Symbol> = self
            .graph
            .edges(file_idx)
            .filter(|e| matches!(e.weight(), EdgeData::Defines))
            .filter_map(|e| match self.graph.node_weight(e.target()) {
                Some(NodeData::Symbol(s)) => Some(s),
                _ => None,
            })
            .collect();
        result.sort_by_key(|s| s.line);
        result
    }

    fn call_info(&self, idx: NodeIndex, edge: &EdgeData) -> Option<CallInfo> {
        if let EdgeData::Calls {
            confidence,
            tier,
            reason,
            line,
        } = edge
        {
            Some(CallInfo {
                id: self.key_of(idx)?,
                confidence: *confidence,
                tier: *tier,
                reason: reason.clone(),
                line: *line,
            })
        } else {
            None
        }
    }

    pub fn callees(&self, id: &str) -> Vec<CallInfo> {
        let Some(idx) = self.symbol_index(id) else {
            return Vec::new();
        };
        let mut result: Vec<CallInfo> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .filter_map(|e| self.call_info(e.target(), e.weight()))
            .collect();
        result.reverse(); // petgraph iterates newest-first; restore insertion order
        result
    }

    pub fn callers(&self, id: &str) -> Vec<CallInfo> {
        let Some(idx) = self.symbol_index(id) else {
            return Vec::new();
        };
        let mut result: Vec<CallInfo> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .filter_map(|e| self.call_info(e.source(), e.weight()))
            .collect();
        result.reverse();
        result
    }

    pub fn call_edges(&self) -> Vec<CallEdge> {
        self.graph
            .edge_references()
            .filter_map(|e| match e.weight() {
                EdgeData::Calls {
                    confidence,
                    tier,
                    reason,
                    line,
                } => Some(CallEdge {
                    from: self.key_of(e.source())?,
                    to: self.key_of(e.target())?,
                    confidence: *confidence,
                    tier: *tier,
                    reason: reason.clone(),
                    line: *line,
                }),
                _ => None,
            })
            .collect()
    }

    pub fn inherits_pairs(&self) -> Vec<(String, String)> {
        self.graph
            .edge_references()
            .filter_map(|e| match e.weight() {
                EdgeData::Inherits => {
                    Some((self.key_of(e.source())?, self.key_of(e.target())?))
                }
                _ => None,
            })
            .collect()
    }

    pub fn import_edges(&self) -> Vec<ImportEdge> {
        self.graph
            .edge_references()
            .filter_map(|e| match e.weight() {
                EdgeData::Imports { statement } => {
                    let from = self.key_of(e.source())?;
                    let to = self.key_of(e.target())?;
                    Some(ImportEdge {
                        from: from.strip_prefix("file:")?.to_string(),
                        to: to.strip_prefix("file:")?.to_string(),
                        statement: statement.clone(),
                    })
                }
                _ => None,
            })
            .collect()
    }

    pub fn project_references(&self) -> Vec<ProjectReference> {
        self.graph
            .edge_references()
            .filter_map(|e| match e.weight() {
                EdgeData::ProjectRef { kind } => Some(ProjectReference {
                    from: self.key_of(e.source())?.strip_prefix("project:")?.to_string(),
                    to: self.key_of(e.target())?.strip_prefix("project:")?.to_string(),
                    kind: kind.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    pub fn package_references(&self) -> Vec<PackageReference> {
        self.graph
            .edge_references()
            .filter_map(|e| match e.weight() {
                EdgeData::PackageRef { version } => Some(PackageReference {
                    project: self.key_of(e.source())?.strip_prefix("project:")?.to_string(),
                    package: self.key_of(e.target())?.strip_prefix("package:")?.to_string(),
                    version: version.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    pub fn communities(&self) -> Vec<&Community> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                NodeData::Community(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    pub fn processes(&self) -> Vec<&Process> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                NodeData::Process(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn file_count(&self) -> usize {
        self.files().len()
    }

    pub fn folder_count(&self) -> usize {
        self.folders().len()
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols().count()
    }
}

impl Default for KnowledgeGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{SymbolKind, Visibility};

    fn symbol(id: &str, name: &str, file: &str) -> Symbol {
        Symbol {
            id: id.to_string(),
            name: name.to_string(),
            kind: SymbolKind::Method,
            file: file.to_string(),
            line: 1,
            end_line: 5,
            visibility: Visibility::Public,
            exported: true,
            parent: None,
            language: Some("cs".to_string()),
            parameter_types: Vec::new(),
            bases: Vec::new(),
            attributes: Vec::new(),
        }
    }

    fn file(path: &str) -> FileNode {
        FileNode {
            path: path.to_string(),
            language: Some("cs".to_string()),
            size: 100,
            lines: 10,
            parseable: true,
        }
    }

    #[test]
    fn add_file_and_query() {
        let mut kg = KnowledgeGraph::new();
        kg.add_file(file("src/main.cs"));
        assert_eq!(kg.file_count(), 1);
        assert!(kg.has_node("file:src/main.cs"));
    }

    #[test]
    fn symbol_creates_defines_edge() {
        let mut kg = KnowledgeGraph::new();
        kg.add_file(file("src/main.cs"));
        kg.add_symbol(symbol("sym_0001", "Run", "src/main.cs"));
        let in_file = kg.symbols_in_file("src/main.cs");
        assert_eq!(in_file.len(), 1);
        assert_eq!(in_file[0].name, "Run");
    }

    #[test]
    fn call_edges_round_trip() {
        let mut kg = KnowledgeGraph::new();
        kg.add_symbol(symbol("sym_0001", "A", "a.cs"));
        kg.add_symbol(symbol("sym_0002", "B", "b.cs"));
        kg.add_call(CallEdge {
            from: "sym_0001".to_string(),
            to: "sym_0002".to_string(),
            confidence: 0.9,
            tier: Tier::A,
            reason: "import-resolved".to_string(),
            line: 3,
        })
        .unwrap();

        let callees = kg.callees("sym_0001");
        assert_eq!(callees.len(), 1);
        assert_eq!(callees[0].id, "sym_0002");
        assert_eq!(callees[0].tier, Tier::A);

        let callers = kg.callers("sym_0002");
        assert_eq!(callers.len(), 1);
        assert_eq!(callers[0].id, "sym_0001");

        assert_eq!(kg.call_edges().len(), 1);
    }

    #[test]
    fn call_to_unknown_symbol_is_invariant_violation() {
        let mut kg = KnowledgeGraph::new();
        kg.add_symbol(symbol("sym_0001", "A", "a.cs"));
        let result = kg.add_call(CallEdge {
            from: "sym_0001".to_string(),
            to: "sym_9999".to_string(),
            confidence: 0.5,
            tier: Tier::C,
            reason: "fuzzy".to_string(),
            line: 1,
        });
        assert!(result.is_err());
    }

    #[test]
    fn import_edges_strip_file_prefix() {
        let mut kg = KnowledgeGraph::new();
        kg.add_import(ImportEdge {
            from: "a.cs".to_string(),
            to: "b.cs".to_string(),
            statement: "using B".to_string(),
        });
        let edges = kg.import_edges();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].from, "a.cs");
        assert_eq!(edges[0].to, "b.cs");
    }

    #[test]
    fn file_replaces_import_placeholder() {
        let mut kg = KnowledgeGraph::new();
        kg.add_import(ImportEdge {
            from: "a.cs".to_string(),
            to: "b.cs".to_string(),
            statement: "using B".to_string(),
        });
        kg.add_file(file("a.cs"));
        let files = kg.files();
        let a = files.iter().find(|f| f.path == "a.cs").unwrap();
        assert_eq!(a.size, 100);
    }

    #[test]
    fn communities_store_members() {
        let mut kg = KnowledgeGraph::new();
        kg.add_symbol(symbol("sym_0001", "A", "a.cs"));
        kg.add_symbol(symbol("sym_0002", "B", "b.cs"));
        kg.add_community(Community {
            id: "community_0".to_string(),
            label: "ab".to_string(),
            members: vec!["sym_0001".to_string(), "sym_0002".to_string()],
            cohesion: 1.0,
            primary_language: "cs".to_string(),
        });
        let communities = kg.communities();
        assert_eq!(communities.len(), 1);
        assert_eq!(communities[0].members.len(), 2);
    }

    #[test]
    fn inherits_skips_unknown_symbols() {
        let mut kg = KnowledgeGraph::new();
        kg.add_symbol(symbol("sym_0001", "A", "a.cs"));
        kg.add_inherits("sym_0001", "sym_missing");
        assert!(kg.inherits_pairs().is_empty());
        kg.add_symbol(symbol("sym_0002", "B", "b.cs"));
        kg.add_inherits("sym_0001", "sym_0002");
        assert_eq!(kg.inherits_pairs().len(), 1);
    }

    #[test]
    fn package_references_round_trip() {
        let mut kg = KnowledgeGraph::new();
        kg.add_package_reference(PackageReference {
            project: "Web.csproj".to_string(),
            package: "Serilog".to_string(),
            version: "3.1.1".to_string(),
        });
        let refs = kg.package_references();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].package, "Serilog");
        assert_eq!(refs[0].version, "3.1.1");
    }
}
