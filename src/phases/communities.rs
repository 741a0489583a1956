//! Phase 5: Louvain community detection over the call+inheritance graph.
//!
//! The undirected projection weights call edges by confidence and
//! inheritance edges at 1.0, summing parallel edges capped at 1.0. A
//! degenerate first pass (one community holding over half the nodes)
//! retries at γ × 1.5 up to three times; oversized communities are split
//! recursively; singletons are discarded. Ids are assigned largest-first.

use std::collections::{HashMap, HashSet};

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::graph::{Community, KnowledgeGraph};
use crate::pipeline::CancelToken;

/// Run the communities phase.
pub fn run(
    config: &AnalysisConfig,
    cancel: &CancelToken,
    kg: &mut KnowledgeGraph,
) -> Result<(), AnalysisError> {
    let mut graph = UndirectedGraph::new();
    for edge in kg.call_edges() {
        graph.add_edge(&edge.from, &edge.to, edge.confidence);
    }
    // Inheritance dominates weak fuzzy calls during clustering
    for (from, to) in kg.inherits_pairs() {
        graph.add_edge(&from, &to, 1.0);
    }
    graph.cap_weights(1.0);

    if graph.len() < 2 {
        return Ok(());
    }
    if cancel.is_cancelled() {
        return Err(AnalysisError::Cancelled);
    }

    // Initial run, re-tuned while degenerate
    let mut resolution = config.resolution;
    let mut communities = louvain(&graph, resolution);
    for _ in 0..3 {
        let largest = communities.iter().map(Vec::len).max().unwrap_or(0);
        if largest * 2 <= graph.len() {
            break;
        }
        resolution *= 1.5;
        communities = louvain(&graph, resolution);
    }

    // Recursive split of oversized communities
    let mut split: Vec<Vec<String>> = Vec::new();
    for community in communities {
        if community.len() > config.max_community_size {
            split.extend(split_oversized(&community, &graph, config.max_community_size));
        } else {
            split.push(community);
        }
    }

    // Singletons out; ids reflect rank order, largest first
    let mut survivors: Vec<Vec<String>> = split.into_iter().filter(|c| c.len() >= 2).collect();
    survivors.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    let labels = assign_labels(&survivors, kg);

    for (i, (members, label)) in survivors.into_iter().zip(labels).enumerate() {
        if cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }
        let cohesion = cohesion(&members, &graph);
        let primary_language = primary_language(&members, kg);
        kg.add_community(Community {
            id: format!("community_{i}"),
            label,
            members,
            cohesion: (cohesion * 1000.0).round() / 1000.0,
            primary_language,
        });
    }

    Ok(())
}

// --- Undirected weighted graph ---

struct UndirectedGraph {
    ids: Vec<String>,
    indices: HashMap<String, usize>,
    adjacency: Vec<Vec<(usize, f64)>>,
}

impl UndirectedGraph {
    fn new() -> Self {
        Self {
            ids: Vec::new(),
            indices: HashMap::new(),
            adjacency: Vec::new(),
        }
    }

    fn len(&self) -> usize {
        self.ids.len()
    }

    fn intern(&mut self, id: &str) -> usize {
        if let Some(&idx) = self.indices.get(id) {
            return idx;
        }
        let idx = self.ids.len();
        self.ids.push(id.to_string());
        self.indices.insert(id.to_string(), idx);
        self.adjacency.push(Vec::new());
        idx
    }

    fn add_edge(&mut self, a: &str, b: &str, weight: f64) {
        if a == b {
            return;
        }
        let ai = self.intern(a);
        let bi = self.intern(b);
        Self::bump(&mut self.adjacency[ai], bi, weight);
        Self::bump(&mut self.adjacency[bi], ai, weight);
    }

    fn bump(neighbours: &mut Vec<(usize, f64)>, to: usize, weight: f64) {
        match neighbours.iter_mut().find(|(n, _)| *n == to) {
            Some(entry) => entry.1 += weight,
            None => neighbours.push((to, weight)),
        }
    }

    /// Clamp accumulated pair weights.
    fn cap_weights(&mut self, cap: f64) {
        for neighbours in &mut self.adjacency {
            for entry in neighbours {
                entry.1 = entry.1.min(cap);
            }
        }
    }

    fn total_weight(&self) -> f64 {
        self.adjacency
            .iter()
            .flat_map(|n| n.iter().map(|(_, w)| w))
            .sum::<f64>()
            / 2.0
    }

    #[cfg(test)]
    fn weight_between(&self, a: usize, b: usize) -> f64 {
        self.adjacency[a]
            .iter()
            .find(|(n, _)| *n == b)
            .map(|(_, w)| *w)
            .unwrap_or(0.0)
    }
}

// --- Louvain ---

/// Modularity maximisation with multi-level aggregation: local moves until
/// no gain, then contract communities into super-nodes and repeat.
fn louvain(graph: &UndirectedGraph, resolution: f64) -> Vec<Vec<String>> {
    let n = graph.len();
    if n == 0 {
        return Vec::new();
    }
    let m = graph.total_weight();
    if m == 0.0 {
        return graph.ids.iter().map(|id| vec![id.clone()]).collect();
    }
    let m2 = m * 2.0;

    // groups[i] holds the original node indices inside super-node i
    let mut groups: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();
    let mut adjacency = graph.adjacency.clone();

    loop {
        let level_n = adjacency.len();
        if level_n < 2 {
            break;
        }
        let degree: Vec<f64> = adjacency
            .iter()
            .map(|neighbours| neighbours.iter().map(|(_, w)| w).sum())
            .collect();

        // Local moves
        let mut community: Vec<usize> = (0..level_n).collect();
        let mut sigma_total = degree.clone();
        let mut moved_any = false;
        let mut improved = true;
        let mut iterations = 0;
        while improved && iterations < 100 {
            improved = false;
            iterations += 1;
            for node in 0..level_n {
                let current = community[node];
                let k = degree[node];

                let mut weights_to: HashMap<usize, f64> = HashMap::new();
                for &(neighbour, w) in &adjacency[node] {
                    if neighbour != node {
                        *weights_to.entry(community[neighbour]).or_insert(0.0) += w;
                    }
                }
                let k_in_current = weights_to.get(&current).copied().unwrap_or(0.0);

                sigma_total[current] -= k;
                let mut best = current;
                let mut best_gain = 0.0;
                let loss = k_in_current - resolution * sigma_total[current] * k / m2;
                for (&candidate, &k_in) in &weights_to {
                    let gain = k_in - resolution * sigma_total[candidate] * k / m2;
                    let delta = gain - loss;
                    if delta > best_gain || (delta == best_gain && candidate < best) {
                        best_gain = delta;
                        best = candidate;
                    }
                }
                if best_gain <= 0.0 {
                    best = current;
                }
                community[node] = best;
                sigma_total[best] += k;
                if best != current {
                    improved = true;
                    moved_any = true;
                }
            }
        }

        if !moved_any {
            break;
        }

        // Compact labels and contract
        let mut relabel: HashMap<usize, usize> = HashMap::new();
        for &c in &community {
            let next = relabel.len();
            relabel.entry(c).or_insert(next);
        }
        let contracted_n = relabel.len();
        if contracted_n == level_n {
            break;
        }

        let mut new_groups: Vec<Vec<usize>> = vec![Vec::new(); contracted_n];
        for (node, &c) in community.iter().enumerate() {
            new_groups[relabel[&c]].extend_from_slice(&groups[node]);
        }
        groups = new_groups;

        let mut new_adjacency: Vec<Vec<(usize, f64)>> = vec![Vec::new(); contracted_n];
        for node in 0..level_n {
            let from = relabel[&community[node]];
            for &(neighbour, w) in &adjacency[node] {
                let to = relabel[&community[neighbour]];
                if from != to {
                    UndirectedGraph::bump(&mut new_adjacency[from], to, w);
                }
            }
        }
        adjacency = new_adjacency;
    }

    groups
        .into_iter()
        .map(|group| group.into_iter().map(|idx| graph.ids[idx].clone()).collect())
        .collect()
}

/// Split an oversized community by rerunning Louvain on its induced
/// subgraph at increasing resolution.
fn split_oversized(
    members: &[String],
    graph: &UndirectedGraph,
    max_size: usize,
) -> Vec<Vec<String>> {
    if members.len() <= max_size {
        return vec![members.to_vec()];
    }

    let member_set: HashSet<&str> = members.iter().map(String::as_str).collect();
    let mut subgraph = UndirectedGraph::new();
    for member in members {
        subgraph.intern(member);
    }
    for member in members {
        if let Some(&idx) = graph.indices.get(member.as_str()) {
            for &(neighbour_idx, w) in &graph.adjacency[idx] {
                let neighbour = &graph.ids[neighbour_idx];
                if member_set.contains(neighbour.as_str()) && neighbour > member {
                    subgraph.add_edge(member, neighbour, w);
                }
            }
        }
    }
    if subgraph.total_weight() == 0.0 {
        return vec![members.to_vec()];
    }

    let mut resolution = 2.0;
    for _ in 0..8 {
        let parts = louvain(&subgraph, resolution);
        let non_singleton = parts.iter().filter(|p| p.len() >= 2).count();
        if parts.len() > 1 && non_singleton >= 2 {
            return parts
                .into_iter()
                .flat_map(|p| split_oversized(&p, graph, max_size))
                .collect();
        }
        resolution *= 2.0;
    }
    vec![members.to_vec()]
}

// --- Labels ---

/// Longest common path prefix at segment granularity.
fn common_path_prefix(paths: &[String]) -> Vec<String> {
    let Some(first) = paths.first() else {
        return Vec::new();
    };
    let mut prefix: Vec<&str> = first.split('/').collect();
    prefix.pop(); // file name is not a directory segment
    for path in &paths[1..] {
        let segments: Vec<&str> = path.split('/').collect();
        let common = prefix
            .iter()
            .zip(&segments)
            .take_while(|(a, b)| a == b)
            .count();
        prefix.truncate(common);
        if prefix.is_empty() {
            break;
        }
    }
    prefix.into_iter().map(str::to_string).collect()
}

fn common_name_prefix(names: &[String]) -> String {
    let Some(first) = names.first() else {
        return String::new();
    };
    let mut len = first.len();
    for name in &names[1..] {
        len = len.min(name.len());
        for (i, (a, b)) in first.bytes().zip(name.bytes()).enumerate() {
            if a != b {
                len = len.min(i);
                break;
            }
        }
    }
    first[..len].to_string()
}

/// Per-community labels per the path-prefix strategy, disambiguated by the
/// next distinguishing path segment when two communities collide.
fn assign_labels(communities: &[Vec<String>], kg: &KnowledgeGraph) -> Vec<String> {
    let mut labels = Vec::with_capacity(communities.len());
    let member_files: Vec<Vec<String>> = communities
        .iter()
        .map(|members| {
            members
                .iter()
                .filter_map(|id| kg.symbol(id).map(|s| s.file.clone()))
                .collect()
        })
        .collect();

    for (i, members) in communities.iter().enumerate() {
        let prefix = common_path_prefix(&member_files[i]);
        let label = if !prefix.is_empty() {
            prefix.join("/")
        } else {
            let names: Vec<String> = members
                .iter()
                .filter_map(|id| kg.symbol(id).map(|s| s.name.clone()))
                .collect();
            let name_prefix = common_name_prefix(&names);
            let trimmed = name_prefix.trim_end_matches('_');
            if trimmed.len() >= 3 {
                trimmed.to_string()
            } else {
                format!("Community {i}")
            }
        };
        labels.push(label);
    }

    // Disambiguate collisions with the next distinguishing segment
    let mut used: HashSet<String> = HashSet::new();
    for i in 0..labels.len() {
        if !used.contains(&labels[i]) {
            used.insert(labels[i].clone());
            continue;
        }
        let depth = labels[i].split('/').count();
        let mut next_segments: Vec<&str> = member_files[i]
            .iter()
            .filter_map(|path| path.split('/').nth(depth))
            .collect();
        next_segments.sort();
        let mut candidate = match next_segments.first() {
            Some(segment) => format!("{}/{}", labels[i], segment),
            None => labels[i].clone(),
        };
        let mut ordinal = 2;
        while used.contains(&candidate) {
            candidate = format!("{} #{ordinal}", labels[i]);
            ordinal += 1;
        }
        used.insert(candidate.clone());
        labels[i] = candidate;
    }

    labels
}

// --- Metrics ---

/// Internal edge weight over the maximum possible edge count, clamped.
fn cohesion(members: &[String], graph: &UndirectedGraph) -> f64 {
    let n = members.len();
    if n < 2 {
        return 0.0;
    }
    let member_set: HashSet<&str> = members.iter().map(String::as_str).collect();
    let mut internal = 0.0;
    for member in members {
        if let Some(&idx) = graph.indices.get(member.as_str()) {
            for &(neighbour_idx, w) in &graph.adjacency[idx] {
                if member_set.contains(graph.ids[neighbour_idx].as_str()) {
                    internal += w;
                }
            }
        }
    }
    internal /= 2.0; // both directions counted
    let max_possible = (n * (n - 1) / 2) as f64;
    (internal / max_possible).clamp(0.0, 1.0)
}

/// Mode of member languages; exact ties break on the smaller tag.
fn primary_language(members: &[String], kg: &KnowledgeGraph) -> String {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for id in members {
        if let Some(language) = kg.symbol(id).and_then(|s| s.language.clone()) {
            *counts.entry(language).or_insert(0) += 1;
        }
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
        .map(|(language, _)| language)
        .unwrap_or_default()
}
