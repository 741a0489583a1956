//! Artifact assembly and JSON output.
//!
//! One document, UTF-8, fixed top-level key order (`version`, `metadata`,
//! `stats`, `structure`, `symbols`, `imports`, `calls`, `communities`,
//! `processes`); `metadata` and `stats` use sorted keys. Language tags are
//! lowercase extensions, paths forward-slash repo-relative, timestamps
//! ISO-8601 UTC.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::AnalysisConfig;
use crate::graph::KnowledgeGraph;
use crate::phases::imports::UnresolvedImport;

/// The single output document.
#[derive(Debug, Serialize, Deserialize)]
pub struct Artifact {
    pub version: String,
    pub metadata: BTreeMap<String, Value>,
    pub stats: BTreeMap<String, Value>,
    pub structure: Structure,
    pub symbols: Vec<SymbolOut>,
    pub imports: Imports,
    pub calls: Vec<CallOut>,
    pub communities: Vec<CommunityOut>,
    pub processes: Vec<ProcessOut>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Structure {
    pub files: Vec<FileOut>,
    pub folders: Vec<FolderOut>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FileOut {
    pub path: String,
    pub language: Option<String>,
    pub size: u64,
    pub lines: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FolderOut {
    pub path: String,
    pub file_count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SymbolOut {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub file: String,
    pub line: usize,
    pub visibility: String,
    pub exported: bool,
    pub parent: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Imports {
    pub file_imports: Vec<ImportOut>,
    pub project_references: Vec<ProjectRefOut>,
    pub package_references: Vec<PackageRefOut>,
    pub unresolved: Vec<UnresolvedOut>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImportOut {
    pub from: String,
    pub to: String,
    pub statement: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProjectRefOut {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PackageRefOut {
    pub project: String,
    pub package: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnresolvedOut {
    pub file: String,
    pub statement: String,
    pub target: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CallOut {
    pub from: String,
    pub to: String,
    pub confidence: f64,
    pub tier: String,
    pub reason: String,
    pub line: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommunityOut {
    pub id: String,
    pub label: String,
    pub members: Vec<String>,
    pub cohesion: f64,
    pub primary_language: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessOut {
    pub id: String,
    pub entry: String,
    pub terminal: String,
    pub steps: Vec<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub total_confidence: f64,
}

/// `GIT_COMMIT`, else a direct `.git/HEAD` read following one level of
/// `ref:` indirection. Absence is non-fatal.
fn commit_hash(repo_path: &str) -> Option<String> {
    if let Ok(commit) = std::env::var("GIT_COMMIT") {
        let commit = commit.trim().to_string();
        if !commit.is_empty() {
            return Some(commit);
        }
    }
    let head = std::fs::read_to_string(Path::new(repo_path).join(".git/HEAD")).ok()?;
    let head = head.trim();
    let hash = match head.strip_prefix("ref: ") {
        Some(reference) => std::fs::read_to_string(Path::new(repo_path).join(".git").join(reference))
            .ok()?
            .trim()
            .to_string(),
        None => head.to_string(),
    };
    (!hash.is_empty()).then(|| hash[..hash.len().min(12)].to_string())
}

/// Assemble the artifact from the populated graph.
pub fn build(
    config: &AnalysisConfig,
    kg: &KnowledgeGraph,
    unresolved: &[UnresolvedImport],
    timings: &BTreeMap<String, f64>,
    total_ms: f64,
) -> Artifact {
    let repo_path = Path::new(&config.repo_path)
        .canonicalize()
        .unwrap_or_else(|_| Path::new(&config.repo_path).to_path_buf());
    let repo_name = repo_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let call_edges = kg.call_edges();
    let import_edges = kg.import_edges();
    let communities = kg.communities();
    let processes = kg.processes();

    let mut language_counts: BTreeMap<String, usize> = BTreeMap::new();
    for file in kg.files() {
        if let Some(tag) = &file.language {
            *language_counts.entry(tag.clone()).or_insert(0) += 1;
        }
    }

    let mut metadata = BTreeMap::new();
    metadata.insert("repo_name".to_string(), Value::String(repo_name));
    metadata.insert(
        "repo_path".to_string(),
        Value::String(repo_path.to_string_lossy().to_string()),
    );
    metadata.insert(
        "analysed_at".to_string(),
        Value::String(Utc::now().to_rfc3339()),
    );
    metadata.insert(
        "tool_version".to_string(),
        Value::String(env!("CARGO_PKG_VERSION").to_string()),
    );
    metadata.insert(
        "commit_hash".to_string(),
        match commit_hash(&config.repo_path) {
            Some(hash) => Value::String(hash),
            None => Value::Null,
        },
    );
    metadata.insert(
        "analysis_duration_ms".to_string(),
        serde_json::json!((total_ms * 10.0).round() / 10.0),
    );
    metadata.insert(
        "phase_timings".to_string(),
        serde_json::to_value(timings).unwrap_or_default(),
    );

    let mut stats = BTreeMap::new();
    stats.insert("files".to_string(), serde_json::json!(kg.file_count()));
    stats.insert("folders".to_string(), serde_json::json!(kg.folder_count()));
    stats.insert("symbols".to_string(), serde_json::json!(kg.symbol_count()));
    stats.insert("imports".to_string(), serde_json::json!(import_edges.len()));
    stats.insert("calls".to_string(), serde_json::json!(call_edges.len()));
    stats.insert(
        "communities".to_string(),
        serde_json::json!(communities.len()),
    );
    stats.insert("processes".to_string(), serde_json::json!(processes.len()));
    stats.insert(
        "languages".to_string(),
        serde_json::to_value(&language_counts).unwrap_or_default(),
    );

    Artifact {
        version: "1.0".to_string(),
        metadata,
        stats,
        structure: Structure {
            files: kg
                .files()
                .into_iter()
                .map(|f| FileOut {
                    path: f.path.clone(),
                    language: f.language.clone(),
                    size: f.size,
                    lines: f.lines,
                })
                .collect(),
            folders: kg
                .folders()
                .into_iter()
                .map(|f| FolderOut {
                    path: f.path.clone(),
                    file_count: f.file_count,
                })
                .collect(),
        },
        symbols: kg
            .symbols()
            .map(|s| SymbolOut {
                id: s.id.clone(),
                name: s.name.clone(),
                kind: s.kind.as_str().to_string(),
                file: s.file.clone(),
                line: s.line,
                visibility: s.visibility.as_str().to_string(),
                exported: s.exported,
                parent: s.parent.clone(),
                language: s.language.clone(),
            })
            .collect(),
        imports: Imports {
            file_imports: import_edges
                .into_iter()
                .map(|e| ImportOut {
                    from: e.from,
                    to: e.to,
                    statement: e.statement,
                })
                .collect(),
            project_references: kg
                .project_references()
                .into_iter()
                .map(|r| ProjectRefOut {
                    from: r.from,
                    to: r.to,
                    kind: r.kind,
                })
                .collect(),
            package_references: kg
                .package_references()
                .into_iter()
                .map(|r| PackageRefOut {
                    project: r.project,
                    package: r.package,
                    version: r.version,
                })
                .collect(),
            unresolved: unresolved
                .iter()
                .map(|u| UnresolvedOut {
                    file: u.file.clone(),
                    statement: u.statement.clone(),
                    target: u.target.clone(),
                })
                .collect(),
        },
        calls: call_edges
            .into_iter()
            .map(|e| CallOut {
                from: e.from,
                to: e.to,
                confidence: e.confidence,
                tier: e.tier.as_str().to_string(),
                reason: e.reason,
                line: e.line,
            })
            .collect(),
        communities: communities
            .into_iter()
            .map(|c| CommunityOut {
                id: c.id.clone(),
                label: c.label.clone(),
                members: c.members.clone(),
                cohesion: c.cohesion,
                primary_language: c.primary_language.clone(),
            })
            .collect(),
        processes: processes
            .into_iter()
            .map(|p| ProcessOut {
                id: p.id.clone(),
                entry: p.entry.clone(),
                terminal: p.terminal.clone(),
                steps: p.steps.clone(),
                kind: p.kind.as_str().to_string(),
                total_confidence: p.total_confidence,
            })
            .collect(),
    }
}

/// Write the artifact as pretty-printed JSON.
pub fn write(artifact: &Artifact, output_path: &str) -> std::io::Result<()> {
    if let Some(parent) = Path::new(output_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(artifact).map_err(std::io::Error::other)?;
    std::fs::write(output_path, json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Symbol, SymbolKind, Visibility};
    use crate::graph::FileNode;

    fn sample_graph() -> KnowledgeGraph {
        let mut kg = KnowledgeGraph::new();
        kg.add_file(FileNode {
            path: "src/main.cs".to_string(),
            language: Some("cs".to_string()),
            size: 100,
            lines: 10,
            parseable: true,
        });
        kg.add_symbol(Symbol {
            id: "sym_0001".to_string(),
            name: "Main".to_string(),
            kind: SymbolKind::Method,
            file: "src/main.cs".to_string(),
            line: 1,
            end_line: 5,
            visibility: Visibility::Public,
            exported: true,
            parent: None,
            language: Some("cs".to_string()),
            parameter_types: Vec::new(),
            bases: Vec::new(),
            attributes: Vec::new(),
        });
        kg
    }

    #[test]
    fn top_level_key_order_is_fixed() {
        let kg = sample_graph();
        let artifact = build(
            &AnalysisConfig::default(),
            &kg,
            &[],
            &BTreeMap::new(),
            12.0,
        );
        let json = serde_json::to_string_pretty(&artifact).unwrap();
        let order = [
            "\"version\"",
            "\"metadata\"",
            "\"stats\"",
            "\"structure\"",
            "\"symbols\"",
            "\"imports\"",
            "\"calls\"",
            "\"communities\"",
            "\"processes\"",
        ];
        let mut last = 0;
        for key in order {
            let pos = json.find(key).unwrap_or_else(|| panic!("missing {key}"));
            assert!(pos > last, "{key} out of order");
            last = pos;
        }
    }

    #[test]
    fn json_round_trips() {
        let kg = sample_graph();
        let artifact = build(
            &AnalysisConfig::default(),
            &kg,
            &[],
            &BTreeMap::new(),
            50.0,
        );
        let json = serde_json::to_string_pretty(&artifact).unwrap();
        let parsed: Artifact = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.version, "1.0");
        assert_eq!(parsed.symbols.len(), 1);
        assert_eq!(parsed.symbols[0].kind, "Method");
        assert_eq!(parsed.symbols[0].visibility, "public");
    }

    #[test]
    fn stats_carry_language_counts() {
        let kg = sample_graph();
        let artifact = build(
            &AnalysisConfig::default(),
            &kg,
            &[],
            &BTreeMap::new(),
            1.0,
        );
        assert_eq!(artifact.stats["files"], serde_json::json!(1));
        assert_eq!(artifact.stats["languages"]["cs"], serde_json::json!(1));
    }

    #[test]
    fn unresolved_imports_are_surfaced() {
        let kg = sample_graph();
        let unresolved = vec![UnresolvedImport {
            file: "src/main.cs".to_string(),
            statement: "using External.Sdk".to_string(),
            target: "External.Sdk".to_string(),
        }];
        let artifact = build(
            &AnalysisConfig::default(),
            &kg,
            &unresolved,
            &BTreeMap::new(),
            1.0,
        );
        assert_eq!(artifact.imports.unresolved.len(), 1);
        assert_eq!(artifact.imports.unresolved[0].target, "External.Sdk");
    }
}
