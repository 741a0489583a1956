//! Phase 3: multi-strategy file→file import resolution.
//!
//! Each language resolves its own way: C#/VB.NET through the namespace
//! index (augmented by .csproj/.vbproj RootNamespace/AssemblyName), Python
//! by dotted paths against the repo root and `__init__.py` source roots,
//! TS/JS by relative specifiers with extension probing, Java by package
//! path with a basename fallback, Go through `go.mod`, Rust by module-tree
//! prefixes with progressive shortening, and C/C++ by quote includes.
//! Unresolved imports are recorded, never fatal.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use tracing::warn;

use crate::analysis::languages::get_analyzer;
use crate::config::AnalysisConfig;
use crate::dotnet::{parse_project_file, parse_solution};
use crate::error::AnalysisError;
use crate::graph::{
    ImportEdge, KnowledgeGraph, NamespaceIndex, PackageReference, ProjectReference,
};
use crate::phases::structure::ProjectFiles;
use crate::pipeline::CancelToken;

/// An import statement that matched no file in the repository.
#[derive(Debug, Clone)]
pub struct UnresolvedImport {
    pub file: String,
    pub statement: String,
    pub target: String,
}

/// Run the imports phase. Returns the unresolved leftovers.
pub fn run(
    config: &AnalysisConfig,
    cancel: &CancelToken,
    kg: &mut KnowledgeGraph,
    ns_index: &mut NamespaceIndex,
    project_files: &ProjectFiles,
) -> Result<Vec<UnresolvedImport>, AnalysisError> {
    process_dotnet_projects(config, kg, ns_index, project_files);

    let file_set: HashSet<String> = kg.files().iter().map(|f| f.path.clone()).collect();

    let go_module = parse_go_mod(config, &file_set);
    let go_dirs = go_dir_index(&file_set);
    let java_basenames = java_basename_index(&file_set);
    let python_roots = python_source_roots(&file_set);

    let mut files: Vec<(String, String)> = kg
        .files()
        .iter()
        .filter(|f| f.parseable)
        .filter_map(|f| f.language.clone().map(|tag| (f.path.clone(), tag)))
        .collect();
    files.sort();

    let mut unresolved = Vec::new();

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
                warn!(file = %path, error = %e, "imports phase: cannot read file");
                continue;
            }
        };
        let tree = match analyzer.parse(&ext, &source) {
            Ok(t) => t,
            Err(e) => {
                warn!(file = %path, error = %e, "imports phase: parse failed");
                continue;
            }
        };

        for import in analyzer.extract_imports(&tree, &source) {
            let targets: Vec<String> = match tag.as_str() {
                "cs" | "vb" => {
                    let ns_files = ns_index.files_for(&import.target).to_vec();
                    ns_files.into_iter().filter(|t| t != path).collect()
                }
                "py" => resolve_python(&import.target, path, &file_set, &python_roots)
                    .into_iter()
                    .collect(),
                "ts" | "js" => resolve_ts(&import.target, path, &file_set)
                    .into_iter()
                    .collect(),
                "java" => resolve_java(&import.target, path, &file_set, &java_basenames)
                    .into_iter()
                    .collect(),
                "go" => resolve_go(&import.target, go_module.as_deref(), &go_dirs),
                "rs" => resolve_rust(&import.target, path, &file_set)
                    .into_iter()
                    .collect(),
                "c" | "cpp" => resolve_include(&import.target, path, &file_set)
                    .into_iter()
                    .collect(),
                _ => Vec::new(),
            };

            if targets.is_empty() {
                unresolved.push(UnresolvedImport {
                    file: path.clone(),
                    statement: import.statement.clone(),
                    target: import.target.clone(),
                });
                continue;
            }
            for target in targets {
                if target != *path {
                    kg.add_import(ImportEdge {
                        from: path.clone(),
                        to: target,
                        statement: import.statement.clone(),
                    });
                }
            }
        }
    }

    Ok(unresolved)
}

// --- .NET project files ---

fn process_dotnet_projects(
    config: &AnalysisConfig,
    kg: &mut KnowledgeGraph,
    ns_index: &mut NamespaceIndex,
    project_files: &ProjectFiles,
) {
    for sln in &project_files.solutions {
        let abs = Path::new(&config.repo_path).join(sln);
        match std::fs::read_to_string(&abs) {
            Ok(content) => {
                let entries = parse_solution(&content);
                tracing::debug!(file = %sln, projects = entries.len(), "parsed solution");
            }
            Err(e) => warn!(file = %sln, error = %e, "imports phase: unreadable solution"),
        }
    }

    for project in &project_files.projects {
        let abs = Path::new(&config.repo_path).join(project);
        let content = match std::fs::read_to_string(&abs) {
            Ok(c) => c,
            Err(e) => {
                warn!(file = %project, error = %e, "imports phase: unreadable project");
                continue;
            }
        };
        let info = parse_project_file(&content, project);

        // RootNamespace/AssemblyName map onto the project's own sources so
        // `using` directives resolve even without namespace declarations
        let project_dir = Path::new(project)
            .parent()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default();
        let project_sources: Vec<String> = kg
            .files()
            .iter()
            .filter(|f| f.path.ends_with(".cs") || f.path.ends_with(".vb"))
            .filter(|f| project_dir.is_empty() || f.path.starts_with(&project_dir))
            .map(|f| f.path.clone())
            .collect();
        for namespace in [info.root_namespace.as_ref(), info.assembly_name.as_ref()]
            .into_iter()
            .flatten()
        {
            if ns_index.files_for(namespace).is_empty() {
                for source in &project_sources {
                    ns_index.register(namespace, source);
                }
            }
        }

        for reference in &info.project_references {
            let joined = Path::new(&project_dir).join(reference);
            kg.add_project_reference(ProjectReference {
                from: project.clone(),
                to: normalize_path(&joined.to_string_lossy()),
                kind: "ProjectReference".to_string(),
            });
        }
        for (package, version) in &info.package_references {
            kg.add_package_reference(PackageReference {
                project: project.clone(),
                package: package.clone(),
                version: version.clone(),
            });
        }
    }
}

// --- Python ---

/// Directories that can serve as roots for absolute dotted imports: the
/// parents of top-level packages (directories holding `__init__.py` whose
/// own parent does not).
fn python_source_roots(file_set: &HashSet<String>) -> Vec<String> {
    let mut roots: HashSet<String> = HashSet::new();
    for path in file_set {
        let Some(package_dir) = path.strip_suffix("/__init__.py") else {
            continue;
        };
        let parent = match package_dir.rfind('/') {
            Some(pos) => &package_dir[..pos],
            None => "",
        };
        if parent.is_empty() || !file_set.contains(&format!("{parent}/__init__.py")) {
            roots.insert(parent.to_string());
        }
    }
    let mut roots: Vec<String> = roots.into_iter().filter(|r| !r.is_empty()).collect();
    roots.sort();
    roots
}

fn resolve_python(
    target: &str,
    source_file: &str,
    file_set: &HashSet<String>,
    roots: &[String],
) -> Option<String> {
    if target.starts_with('.') {
        return resolve_python_relative(target, source_file, file_set);
    }

    let module_path = target.replace('.', "/");
    let mut prefixes = vec![String::new()];
    prefixes.extend(roots.iter().map(|r| format!("{r}/")));

    for prefix in &prefixes {
        let candidate = format!("{prefix}{module_path}.py");
        if file_set.contains(&candidate) {
            return Some(candidate);
        }
        let candidate = format!("{prefix}{module_path}/__init__.py");
        if file_set.contains(&candidate) {
            return Some(candidate);
        }
    }
    None
}

fn resolve_python_relative(
    target: &str,
    source_file: &str,
    file_set: &HashSet<String>,
) -> Option<String> {
    let dots = target.chars().take_while(|&c| c == '.').count();
    let remainder = &target[dots..];

    let mut base = Path::new(source_file)
        .parent()
        .unwrap_or(Path::new(""))
        .to_string_lossy()
        .to_string();
    for _ in 0..dots.saturating_sub(1) {
        base = Path::new(&base)
            .parent()
            .unwrap_or(Path::new(""))
            .to_string_lossy()
            .to_string();
    }

    let module_path = if remainder.is_empty() {
        if base.is_empty() {
            return None;
        }
        let candidate = format!("{base}/__init__.py");
        return file_set.contains(&candidate).then_some(candidate);
    } else if base.is_empty() {
        remainder.replace('.', "/")
    } else {
        format!("{base}/{}", remainder.replace('.', "/"))
    };

    let candidate = format!("{module_path}.py");
    if file_set.contains(&candidate) {
        return Some(candidate);
    }
    let candidate = format!("{module_path}/__init__.py");
    file_set.contains(&candidate).then_some(candidate)
}

// --- TypeScript / JavaScript ---

const TS_PROBE_EXTENSIONS: &[&str] = &[".ts", ".tsx", ".js", ".jsx", ".mjs", ".cjs"];

fn resolve_ts(target: &str, source_file: &str, file_set: &HashSet<String>) -> Option<String> {
    // Bare specifiers are external packages
    if !target.starts_with("./") && !target.starts_with("../") {
        return None;
    }

    let source_dir = Path::new(source_file)
        .parent()
        .unwrap_or(Path::new(""))
        .to_string_lossy()
        .to_string();
    let resolved = normalize_path(&format!("{source_dir}/{target}"));

    if file_set.contains(&resolved) {
        return Some(resolved);
    }
    for ext in TS_PROBE_EXTENSIONS {
        let candidate = format!("{resolved}{ext}");
        if file_set.contains(&candidate) {
            return Some(candidate);
        }
    }
    for ext in TS_PROBE_EXTENSIONS {
        let candidate = format!("{resolved}/index{ext}");
        if file_set.contains(&candidate) {
            return Some(candidate);
        }
    }
    None
}

// --- Java ---

fn java_basename_index(file_set: &HashSet<String>) -> HashMap<String, Vec<String>> {
    let mut index: HashMap<String, Vec<String>> = HashMap::new();
    for path in file_set {
        if path.ends_with(".java") {
            if let Some(basename) = Path::new(path).file_name() {
                index
                    .entry(basename.to_string_lossy().to_string())
                    .or_default()
                    .push(path.clone());
            }
        }
    }
    for paths in index.values_mut() {
        paths.sort();
    }
    index
}

fn resolve_java(
    target: &str,
    source_file: &str,
    file_set: &HashSet<String>,
    basenames: &HashMap<String, Vec<String>>,
) -> Option<String> {
    let path = format!("{}.java", target.replace('.', "/"));
    if file_set.contains(&path) {
        return Some(path);
    }

    // Fall back to a basename search on the class name
    let class_name = target.rsplit('.').next().unwrap_or(target);
    let basename = format!("{class_name}.java");
    basenames
        .get(&basename)?
        .iter()
        .find(|candidate| candidate.as_str() != source_file)
        .cloned()
}

// --- Go ---

fn parse_go_mod(config: &AnalysisConfig, file_set: &HashSet<String>) -> Option<String> {
    let go_mod = file_set
        .iter()
        .filter(|p| *p == "go.mod" || p.ends_with("/go.mod"))
        .min_by_key(|p| p.len())?;
    let abs = Path::new(&config.repo_path).join(go_mod);
    let content = std::fs::read_to_string(abs).ok()?;
    content
        .lines()
        .find_map(|line| line.trim().strip_prefix("module "))
        .map(|module| module.trim().to_string())
}

fn go_dir_index(file_set: &HashSet<String>) -> HashMap<String, Vec<String>> {
    let mut index: HashMap<String, Vec<String>> = HashMap::new();
    for path in file_set {
        if path.ends_with(".go") {
            let dir = Path::new(path)
                .parent()
                .unwrap_or(Path::new(""))
                .to_string_lossy()
                .to_string();
            index.entry(dir).or_default().push(path.clone());
        }
    }
    for paths in index.values_mut() {
        paths.sort();
    }
    index
}

fn resolve_go(
    target: &str,
    module: Option<&str>,
    dirs: &HashMap<String, Vec<String>>,
) -> Vec<String> {
    let Some(module) = module else {
        return Vec::new();
    };
    // Stdlib imports carry no slash; foreign modules carry another prefix
    if !target.contains('/') || !target.starts_with(module) {
        return Vec::new();
    }
    let rel = target[module.len()..].trim_start_matches('/');
    dirs.get(rel).cloned().unwrap_or_default()
}

// --- Rust ---

const RUST_EXTERNAL_PREFIXES: &[&str] = &["std::", "core::", "alloc::"];

fn resolve_rust(target: &str, source_file: &str, file_set: &HashSet<String>) -> Option<String> {
    if RUST_EXTERNAL_PREFIXES.iter().any(|p| target.starts_with(p)) {
        return None;
    }

    let source_dir = Path::new(source_file)
        .parent()
        .unwrap_or(Path::new(""))
        .to_string_lossy()
        .to_string();

    let (base, remainder) = if let Some(stripped) = target.strip_prefix("crate::") {
        // The crate root is wherever this file's src tree starts
        let crate_root = source_file
            .find("src/")
            .map(|pos| format!("{}src", &source_file[..pos]))
            .unwrap_or_default();
        (crate_root, stripped)
    } else if target.starts_with("super::") {
        let mut remainder = target;
        let mut base = source_dir.clone();
        while let Some(stripped) = remainder.strip_prefix("super::") {
            remainder = stripped;
            base = Path::new(&base)
                .parent()
                .unwrap_or(Path::new(""))
                .to_string_lossy()
                .to_string();
        }
        (base, remainder)
    } else if let Some(stripped) = target.strip_prefix("self::") {
        (source_dir, stripped)
    } else {
        (source_dir, target)
    };

    // Progressive segment shortening: drop trailing item names until a
    // module file matches
    let segments: Vec<&str> = remainder.split("::").collect();
    for end in (1..=segments.len()).rev() {
        let rel = segments[..end].join("/");
        let full = if base.is_empty() {
            rel
        } else {
            format!("{base}/{rel}")
        };
        let candidate = format!("{full}.rs");
        if file_set.contains(&candidate) {
            return Some(candidate);
        }
        let candidate = format!("{full}/mod.rs");
        if file_set.contains(&candidate) {
            return Some(candidate);
        }
    }
    None
}

// --- C / C++ ---

fn resolve_include(target: &str, source_file: &str, file_set: &HashSet<String>) -> Option<String> {
    let source_dir = Path::new(source_file)
        .parent()
        .unwrap_or(Path::new(""))
        .to_string_lossy()
        .to_string();

    // Relative to the including file first
    let candidate = if source_dir.is_empty() {
        target.to_string()
    } else {
        normalize_path(&format!("{source_dir}/{target}"))
    };
    if file_set.contains(&candidate) {
        return Some(candidate);
    }

    // Then against every source directory
    let mut dirs: Vec<String> = file_set
        .iter()
        .filter_map(|p| Path::new(p).parent().map(|d| d.to_string_lossy().to_string()))
        .collect();
    dirs.sort();
    dirs.dedup();
    for dir in dirs {
        let candidate = if dir.is_empty() {
            target.to_string()
        } else {
            normalize_path(&format!("{dir}/{target}"))
        };
        if file_set.contains(&candidate) {
            return Some(candidate);
        }
    }
    None
}

/// Collapse `.` and `..` segments and normalize separators.
fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else {
                    parts.push("..");
                }
            }
            _ => parts.push(segment),
        }
    }
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(paths: &[&str]) -> HashSet<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn python_absolute_and_package_imports() {
        let files = set(&["app/services.py", "app/models/__init__.py", "main.py"]);
        assert_eq!(
            resolve_python("app.services", "main.py", &files, &[]),
            Some("app/services.py".to_string())
        );
        assert_eq!(
            resolve_python("app.models", "main.py", &files, &[]),
            Some("app/models/__init__.py".to_string())
        );
        assert_eq!(resolve_python("missing.module", "main.py", &files, &[]), None);
    }

    #[test]
    fn python_relative_imports() {
        let files = set(&["pkg/__init__.py", "pkg/util.py", "pkg/sub/runner.py"]);
        assert_eq!(
            resolve_python(".util", "pkg/runner.py", &files, &[]),
            Some("pkg/util.py".to_string())
        );
        assert_eq!(
            resolve_python("..util", "pkg/sub/runner.py", &files, &[]),
            Some("pkg/util.py".to_string())
        );
        assert_eq!(
            resolve_python(".", "pkg/util.py", &files, &[]),
            Some("pkg/__init__.py".to_string())
        );
    }

    #[test]
    fn python_source_roots_from_init_presence() {
        let files = set(&["src/pkg/__init__.py", "src/pkg/mod.py", "main.py"]);
        let roots = python_source_roots(&files);
        assert_eq!(roots, vec!["src".to_string()]);
        assert_eq!(
            resolve_python("pkg.mod", "main.py", &files, &roots),
            Some("src/pkg/mod.py".to_string())
        );
    }

    #[test]
    fn ts_extension_and_index_probing() {
        let files = set(&["src/user.ts", "src/db/index.ts", "src/app.tsx"]);
        assert_eq!(
            resolve_ts("./user", "src/main.ts", &files),
            Some("src/user.ts".to_string())
        );
        assert_eq!(
            resolve_ts("./db", "src/main.ts", &files),
            Some("src/db/index.ts".to_string())
        );
        assert_eq!(
            resolve_ts("../src/app", "src/main.ts", &files),
            Some("src/app.tsx".to_string())
        );
        // bare specifiers stay unresolved
        assert_eq!(resolve_ts("react", "src/main.ts", &files), None);
    }

    #[test]
    fn java_path_then_basename_fallback() {
        let files = set(&["com/x/Y.java", "elsewhere/Z.java"]);
        let basenames = java_basename_index(&files);
        assert_eq!(
            resolve_java("com.x.Y", "Main.java", &files, &basenames),
            Some("com/x/Y.java".to_string())
        );
        assert_eq!(
            resolve_java("org.other.Z", "Main.java", &files, &basenames),
            Some("elsewhere/Z.java".to_string())
        );
    }

    #[test]
    fn go_module_prefix_maps_to_directory_files() {
        let files = set(&["service/data.go", "service/items.go", "main.go"]);
        let dirs = go_dir_index(&files);
        let resolved = resolve_go("myapp/service", Some("myapp"), &dirs);
        assert_eq!(resolved.len(), 2);
        assert!(resolve_go("fmt", Some("myapp"), &dirs).is_empty());
        assert!(resolve_go("otherapp/service", Some("myapp"), &dirs).is_empty());
    }

    #[test]
    fn rust_crate_super_and_shortening() {
        let files = set(&["src/lib.rs", "src/store.rs", "src/api/mod.rs", "src/api/v1.rs"]);
        assert_eq!(
            resolve_rust("crate::store::Repository", "src/lib.rs", &files),
            Some("src/store.rs".to_string())
        );
        assert_eq!(
            resolve_rust("super::store", "src/api/v1.rs", &files),
            Some("src/store.rs".to_string())
        );
        assert_eq!(
            resolve_rust("self::v1", "src/api/mod.rs", &files),
            Some("src/api/v1.rs".to_string())
        );
        assert_eq!(resolve_rust("std::collections::HashMap", "src/lib.rs", &files), None);
    }

    #[test]
    fn include_relative_then_source_dirs() {
        let files = set(&["src/service.h", "src/service.c", "include/types.h"]);
        assert_eq!(
            resolve_include("service.h", "src/main.c", &files),
            Some("src/service.h".to_string())
        );
        assert_eq!(
            resolve_include("types.h", "src/main.c", &files),
            Some("include/types.h".to_string())
        );
        assert_eq!(resolve_include("absent.h", "src/main.c", &files), None);
    }

    #[test]
    fn normalize_collapses_dot_segments() {
        assert_eq!(normalize_path("a/./b/../c"), "a/c");
        assert_eq!(normalize_path("a\\b\\c"), "a/b/c");
        assert_eq!(normalize_path("Services/../Core/Core.csproj"), "Core/Core.csproj");
    }
}
