//! Phase 6: execution flow tracing.
//!
//! The top `2 × max_processes` symbols by entry score each seed a bounded
//! multi-branch BFS along CALLS edges: branches sorted by confidence, at
//! most `max_branching` followed per node, `max_depth` steps, cycles
//! avoided per path. Candidates below `min_steps` are dropped, contiguous
//! subpaths of longer candidates are deduplicated, and the survivors are
//! ranked by total confidence (product of edge confidences) and capped.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::graph::scoring::score_entry_points;
use crate::graph::{KnowledgeGraph, Process, ProcessKind};
use crate::pipeline::CancelToken;

/// Run the processes phase.
pub fn run(
    config: &AnalysisConfig,
    cancel: &CancelToken,
    kg: &mut KnowledgeGraph,
) -> Result<(), AnalysisError> {
    let entries = score_entry_points(kg);
    if entries.is_empty() {
        return Ok(());
    }

    let mut candidates: Vec<Vec<String>> = Vec::new();
    for (entry, _score) in entries.iter().take(config.max_processes * 2) {
        if cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }
        candidates.extend(trace(
            kg,
            entry,
            config.max_depth,
            config.max_branching,
            config.min_steps,
        ));
    }

    let candidates = dedup_subpaths(candidates);

    // Rank by total confidence; longer paths win ties, then the entry id
    let mut ranked: Vec<(Vec<String>, f64)> = candidates
        .into_iter()
        .map(|steps| {
            let confidence = total_confidence(kg, &steps);
            (steps, confidence)
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.0.len().cmp(&a.0.len()))
            .then_with(|| a.0.cmp(&b.0))
    });
    ranked.truncate(config.max_processes);

    let community_of = community_map(kg);
    for (i, (steps, confidence)) in ranked.into_iter().enumerate() {
        let kind = classify(&steps, &community_of);
        kg.add_process(Process {
            id: format!("process_{i}"),
            entry: steps[0].clone(),
            terminal: steps.last().cloned().unwrap_or_default(),
            steps,
            kind,
            total_confidence: (confidence * 10000.0).round() / 10000.0,
        });
    }

    Ok(())
}

/// Bounded multi-branch BFS from one entry point. A path is emitted each
/// time BFS exits a node: no callees, depth bound, or all branches already
/// on the path.
fn trace(
    kg: &KnowledgeGraph,
    entry: &str,
    max_depth: usize,
    max_branching: usize,
    min_steps: usize,
) -> Vec<Vec<String>> {
    // Bound total traces per entry so dense graphs stay tractable
    let max_traces = max_branching * 3;
    let mut traces = Vec::new();
    let mut queue: VecDeque<Vec<String>> = VecDeque::new();
    queue.push_back(vec![entry.to_string()]);

    while let Some(path) = queue.pop_front() {
        if traces.len() >= max_traces {
            break;
        }
        let Some(current) = path.last() else {
            continue;
        };

        let mut callees = kg.callees(current);
        if callees.is_empty() || path.len() >= max_depth {
            if path.len() >= min_steps {
                traces.push(path);
            }
            continue;
        }

        callees.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut extended = false;
        for callee in callees.iter().take(max_branching) {
            if !path.contains(&callee.id) {
                let mut next = path.clone();
                next.push(callee.id.clone());
                queue.push_back(next);
                extended = true;
            }
        }
        if !extended && path.len() >= min_steps {
            traces.push(path);
        }
    }

    traces
}

/// Drop any candidate whose steps form a strict contiguous subsequence of
/// a longer candidate's steps.
fn dedup_subpaths(mut candidates: Vec<Vec<String>>) -> Vec<Vec<String>> {
    candidates.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    candidates.dedup();

    let mut kept: Vec<Vec<String>> = Vec::new();
    for candidate in candidates {
        let contained = kept.iter().any(|longer| {
            longer.len() > candidate.len()
                && longer
                    .windows(candidate.len())
                    .any(|window| window == candidate.as_slice())
        });
        if !contained {
            kept.push(candidate);
        }
    }
    kept
}

/// Product of edge confidences along the path, taking the strongest edge
/// where several connect a pair.
fn total_confidence(kg: &KnowledgeGraph, steps: &[String]) -> f64 {
    let mut total = 1.0;
    for pair in steps.windows(2) {
        let best = kg
            .callees(&pair[0])
            .into_iter()
            .filter(|c| c.id == pair[1])
            .map(|c| c.confidence)
            .fold(f64::NAN, f64::max);
        total *= if best.is_nan() { 0.5 } else { best };
    }
    total
}

fn community_map(kg: &KnowledgeGraph) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for community in kg.communities() {
        for member in &community.members {
            map.insert(member.clone(), community.id.clone());
        }
    }
    map
}

/// `intra_community` iff all steps share one community. A step outside any
/// community counts as its own.
fn classify(steps: &[String], community_of: &HashMap<String, String>) -> ProcessKind {
    let seen: HashSet<&str> = steps
        .iter()
        .map(|step| {
            community_of
                .get(step)
                .map(String::as_str)
                .unwrap_or(step.as_str())
        })
        .collect();
    if seen.len() <= 1 {
        ProcessKind::IntraCommunity
    } else {
        ProcessKind::CrossCommunity
    }
}
