//! Sequential six-phase orchestrator with timing collection and
//! cooperative cancellation.
//!
//! Phases run strictly in order; each owns the graph mutations of its kind
//! and later phases read earlier output as immutable. Cancellation is
//! checked between phases and between files within each phase; a cancelled
//! run discards all partial results and writes nothing.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::graph::{KnowledgeGraph, NamespaceIndex, SymbolTable};
use crate::phases;
use crate::report::{self, Artifact};

/// Phase names with their user-facing progress labels.
pub const PHASE_LABELS: &[(&str, &str)] = &[
    ("structure", "Mapping file tree"),
    ("parsing", "Parsing source files"),
    ("imports", "Resolving imports"),
    ("calls", "Building call graph"),
    ("communities", "Detecting communities"),
    ("processes", "Tracing execution flows"),
];

/// Cooperative cancellation flag, shared with e.g. a ctrl-c handler.
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Progress callback: (phase name, label).
pub type ProgressCallback = Box<dyn FnMut(&str, &str)>;

/// Run the full pipeline over `config.repo_path` and build the artifact.
pub fn run(
    config: &AnalysisConfig,
    cancel: &CancelToken,
    mut progress: Option<ProgressCallback>,
) -> Result<Artifact, AnalysisError> {
    let root = Path::new(&config.repo_path);
    let metadata = std::fs::metadata(root).map_err(|source| AnalysisError::RootIo {
        path: root.to_path_buf(),
        source,
    })?;
    if !metadata.is_dir() {
        return Err(AnalysisError::InvalidRoot(root.to_path_buf()));
    }

    let mut kg = KnowledgeGraph::new();
    let mut st = SymbolTable::new();
    let mut ns_index = NamespaceIndex::new();
    let mut timings: BTreeMap<String, f64> = BTreeMap::new();
    let total_start = Instant::now();

    let report_phase = |name: &str, progress: &mut Option<ProgressCallback>| {
        let label = PHASE_LABELS
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, l)| *l)
            .unwrap_or(name);
        if let Some(cb) = progress {
            cb(name, label);
        }
        debug!(phase = name, "starting phase");
        Instant::now()
    };
    let record = |name: &str, start: Instant, timings: &mut BTreeMap<String, f64>| {
        timings.insert(name.to_string(), start.elapsed().as_secs_f64());
    };

    let start = report_phase("structure", &mut progress);
    let project_files = phases::structure::run(config, cancel, &mut kg)?;
    record("structure", start, &mut timings);

    if cancel.is_cancelled() {
        return Err(AnalysisError::Cancelled);
    }
    let start = report_phase("parsing", &mut progress);
    phases::parsing::run(config, cancel, &mut kg, &mut st, &mut ns_index)?;
    record("parsing", start, &mut timings);

    if cancel.is_cancelled() {
        return Err(AnalysisError::Cancelled);
    }
    let start = report_phase("imports", &mut progress);
    let unresolved = phases::imports::run(config, cancel, &mut kg, &mut ns_index, &project_files)?;
    record("imports", start, &mut timings);

    if cancel.is_cancelled() {
        return Err(AnalysisError::Cancelled);
    }
    let start = report_phase("calls", &mut progress);
    phases::calls::run(config, cancel, &mut kg, &st)?;
    record("calls", start, &mut timings);

    if cancel.is_cancelled() {
        return Err(AnalysisError::Cancelled);
    }
    let start = report_phase("communities", &mut progress);
    phases::communities::run(config, cancel, &mut kg)?;
    record("communities", start, &mut timings);

    if cancel.is_cancelled() {
        return Err(AnalysisError::Cancelled);
    }
    let start = report_phase("processes", &mut progress);
    phases::processes::run(config, cancel, &mut kg)?;
    record("processes", start, &mut timings);

    let total_ms = total_start.elapsed().as_secs_f64() * 1000.0;
    Ok(report::build(config, &kg, &unresolved, &timings, total_ms))
}
