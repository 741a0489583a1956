//! Phase 1: directory traversal, ignore filtering and language
//! classification.
//!
//! Every surviving file becomes a FileNode; oversized files keep theirs but
//! are marked non-parseable. `.sln`/`.csproj`/`.vbproj` paths are collected
//! into side lists for the imports phase.

use std::collections::HashMap;
use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::warn;
use walkdir::WalkDir;

use crate::analysis::languages::language_tag;
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::graph::{FileNode, FolderNode, KnowledgeGraph};
use crate::pipeline::CancelToken;

/// Path segments never descended into.
const DEFAULT_IGNORES: &[&str] = &[
    ".git",
    "bin",
    "obj",
    "node_modules",
    "packages",
    ".vs",
    ".idea",
    "TestResults",
    "dist",
    "build",
    "target",
    ".venv",
    "__pycache__",
    ".mypy_cache",
    ".pytest_cache",
];

/// Project files discovered during the walk, for the imports phase.
#[derive(Debug, Default)]
pub struct ProjectFiles {
    pub solutions: Vec<String>,
    pub projects: Vec<String>,
}

fn build_exclude_set(patterns: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(e) => warn!(pattern = %pattern, error = %e, "ignoring invalid exclude pattern"),
        }
    }
    builder.build().unwrap_or_else(|_| GlobSet::empty())
}

/// Walk the repository and populate FileNodes and FolderNodes.
pub fn run(
    config: &AnalysisConfig,
    cancel: &CancelToken,
    kg: &mut KnowledgeGraph,
) -> Result<ProjectFiles, AnalysisError> {
    let root = Path::new(&config.repo_path);
    let excludes = build_exclude_set(&config.exclude_patterns);
    let mut folder_counts: HashMap<String, usize> = HashMap::new();
    let mut project_files = ProjectFiles::default();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            if DEFAULT_IGNORES.iter().any(|ignored| name == *ignored) {
                return false;
            }
            // Hidden directories are never source; the root itself may be one
            if entry.depth() > 0 && entry.file_type().is_dir() && name.starts_with('.') {
                return false;
            }
            true
        });

    for entry in walker {
        if cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }

        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };

        let rel_path = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        if rel_path.is_empty() {
            continue;
        }
        if excludes.is_match(&rel_path) {
            continue;
        }

        if entry.file_type().is_dir() {
            folder_counts.entry(rel_path).or_insert(0);
            continue;
        }
        if !entry.file_type().is_file() {
            continue;
        }

        if rel_path.ends_with(".sln") {
            project_files.solutions.push(rel_path.clone());
        } else if rel_path.ends_with(".csproj") || rel_path.ends_with(".vbproj") {
            project_files.projects.push(rel_path.clone());
        }

        let ext = entry
            .path()
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_default();
        let language = language_tag(&ext).map(String::from);

        let size = match entry.metadata() {
            Ok(m) => m.len(),
            Err(e) => {
                warn!(path = %rel_path, error = %e, "skipping file without metadata");
                continue;
            }
        };

        let oversized = size > config.max_file_size;
        let filtered = match &language {
            Some(tag) => !config.language_enabled(tag),
            None => true,
        };
        let parseable = !oversized && !filtered;

        let lines = if parseable && language.is_some() {
            match std::fs::read_to_string(entry.path()) {
                Ok(content) => content.lines().count(),
                Err(_) => 0, // binary or unreadable; counted as zero lines
            }
        } else {
            0
        };

        kg.add_file(FileNode {
            path: rel_path.clone(),
            language,
            size,
            lines,
            parseable,
        });

        if let Some(parent) = Path::new(&rel_path).parent() {
            let parent = parent.to_string_lossy().replace('\\', "/");
            if !parent.is_empty() {
                *folder_counts.entry(parent).or_insert(0) += 1;
            }
        }
    }

    let mut folders: Vec<(String, usize)> = folder_counts.into_iter().collect();
    folders.sort();
    for (path, file_count) in folders {
        kg.add_folder(FolderNode {
            path: format!("{path}/"),
            file_count,
        });
    }

    Ok(project_files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn analyse(dir: &Path) -> (KnowledgeGraph, ProjectFiles) {
        let config = AnalysisConfig {
            repo_path: dir.to_string_lossy().to_string(),
            ..Default::default()
        };
        let mut kg = KnowledgeGraph::new();
        let projects = run(&config, &CancelToken::new(), &mut kg).unwrap();
        (kg, projects)
    }

    #[test]
    fn walks_files_and_folders() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/main.cs"), "class A {}\n").unwrap();
        fs::write(dir.path().join("README.md"), "# readme\n").unwrap();

        let (kg, _) = analyse(dir.path());
        assert_eq!(kg.file_count(), 2);
        let files = kg.files();
        let cs = files.iter().find(|f| f.path == "src/main.cs").unwrap();
        assert_eq!(cs.language.as_deref(), Some("cs"));
        assert_eq!(cs.lines, 1);
        let md = files.iter().find(|f| f.path == "README.md").unwrap();
        assert_eq!(md.language, None);
        assert!(!md.parseable);

        assert!(kg.folders().iter().any(|f| f.path == "src/"));
    }

    #[test]
    fn default_ignores_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("node_modules")).unwrap();
        fs::write(dir.path().join("node_modules/dep.js"), "x\n").unwrap();
        fs::create_dir(dir.path().join("bin")).unwrap();
        fs::write(dir.path().join("bin/out.cs"), "x\n").unwrap();
        fs::write(dir.path().join("main.go"), "package main\n").unwrap();

        let (kg, _) = analyse(dir.path());
        assert_eq!(kg.file_count(), 1);
        assert_eq!(kg.files()[0].path, "main.go");
    }

    #[test]
    fn caller_globs_extend_the_ignore_set() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("keep.py"), "x = 1\n").unwrap();
        fs::write(dir.path().join("skip.py"), "x = 1\n").unwrap();

        let config = AnalysisConfig {
            repo_path: dir.path().to_string_lossy().to_string(),
            exclude_patterns: vec!["skip.*".to_string()],
            ..Default::default()
        };
        let mut kg = KnowledgeGraph::new();
        run(&config, &CancelToken::new(), &mut kg).unwrap();
        assert_eq!(kg.file_count(), 1);
        assert_eq!(kg.files()[0].path, "keep.py");
    }

    #[test]
    fn oversized_files_keep_their_node_but_are_not_parseable() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("big.cs"), "x".repeat(64)).unwrap();

        let config = AnalysisConfig {
            repo_path: dir.path().to_string_lossy().to_string(),
            max_file_size: 16,
            ..Default::default()
        };
        let mut kg = KnowledgeGraph::new();
        run(&config, &CancelToken::new(), &mut kg).unwrap();
        let files = kg.files();
        assert_eq!(files.len(), 1);
        assert!(!files[0].parseable);
        assert_eq!(files[0].lines, 0);
        assert_eq!(files[0].size, 64);
    }

    #[test]
    fn project_files_are_collected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("App.sln"), "").unwrap();
        fs::write(dir.path().join("App.csproj"), "<Project/>").unwrap();
        fs::write(dir.path().join("Lib.vbproj"), "<Project/>").unwrap();

        let (_, projects) = analyse(dir.path());
        assert_eq!(projects.solutions, vec!["App.sln"]);
        assert_eq!(projects.projects.len(), 2);
    }

    #[test]
    fn empty_repository_is_well_formed() {
        let dir = tempfile::tempdir().unwrap();
        let (kg, projects) = analyse(dir.path());
        assert_eq!(kg.file_count(), 0);
        assert_eq!(kg.folder_count(), 0);
        assert!(projects.solutions.is_empty());
    }

    #[test]
    fn cancellation_stops_the_walk() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.cs"), "x\n").unwrap();
        let config = AnalysisConfig {
            repo_path: dir.path().to_string_lossy().to_string(),
            ..Default::default()
        };
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut kg = KnowledgeGraph::new();
        assert!(matches!(
            run(&config, &cancel, &mut kg),
            Err(AnalysisError::Cancelled)
        ));
    }
}
