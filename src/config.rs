//! Analysis run configuration.

use serde::{Deserialize, Serialize};

/// Tunables for a single analysis run. All fields have serde defaults so a
/// config can be deserialized from a partial document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Repository root to analyse.
    #[serde(default)]
    pub repo_path: String,
    /// Restrict parsing to these lowercase language tags; None means all.
    pub languages: Option<Vec<String>>,
    /// Initial Louvain resolution γ.
    #[serde(default = "default_resolution")]
    pub resolution: f64,
    /// Phase 6 cap on emitted processes.
    #[serde(default = "default_max_processes")]
    pub max_processes: usize,
    /// Phase 6 BFS depth bound.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Outgoing branches followed per node during the BFS trace.
    #[serde(default = "default_max_branching")]
    pub max_branching: usize,
    /// Minimum steps for a candidate process.
    #[serde(default = "default_min_steps")]
    pub min_steps: usize,
    /// Extra ignore globs on top of the fixed default set.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    /// Files above this many bytes keep their FileNode but are not parsed.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Communities above this size are recursively split.
    #[serde(default = "default_max_community_size")]
    pub max_community_size: usize,
}

fn default_resolution() -> f64 {
    1.0
}
fn default_max_processes() -> usize {
    75
}
fn default_max_depth() -> usize {
    10
}
fn default_max_branching() -> usize {
    4
}
fn default_min_steps() -> usize {
    2
}
fn default_max_file_size() -> u64 {
    1024 * 1024
}
fn default_max_community_size() -> usize {
    150
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            repo_path: String::new(),
            languages: None,
            resolution: default_resolution(),
            max_processes: default_max_processes(),
            max_depth: default_max_depth(),
            max_branching: default_max_branching(),
            min_steps: default_min_steps(),
            exclude_patterns: Vec::new(),
            max_file_size: default_max_file_size(),
            max_community_size: default_max_community_size(),
        }
    }
}

impl AnalysisConfig {
    /// Whether a language tag passes the `--languages` filter.
    pub fn language_enabled(&self, tag: &str) -> bool {
        match &self.languages {
            Some(filter) => filter.iter().any(|l| l.eq_ignore_ascii_case(tag)),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let config = AnalysisConfig::default();
        assert_eq!(config.resolution, 1.0);
        assert_eq!(config.max_processes, 75);
        assert_eq!(config.max_depth, 10);
        assert_eq!(config.max_branching, 4);
        assert_eq!(config.min_steps, 2);
        assert_eq!(config.max_file_size, 1024 * 1024);
        assert_eq!(config.max_community_size, 150);
    }

    #[test]
    fn language_filter_is_case_insensitive() {
        let config = AnalysisConfig {
            languages: Some(vec!["CS".to_string(), "ts".to_string()]),
            ..Default::default()
        };
        assert!(config.language_enabled("cs"));
        assert!(config.language_enabled("ts"));
        assert!(!config.language_enabled("py"));

        let open = AnalysisConfig::default();
        assert!(open.language_enabled("anything"));
    }

    #[test]
    fn partial_document_deserializes_with_defaults() {
        let config: AnalysisConfig = serde_json::from_str(r#"{"resolution": 2.5}"#).unwrap();
        assert_eq!(config.resolution, 2.5);
        assert_eq!(config.max_processes, 75);
    }
}
