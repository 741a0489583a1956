//! Entry-point scoring for the process tracer.
//!
//! score = (out / (in + 1))
//!       × 2.0 when exported
//!       × 1.5 when the name matches an entry pattern
//!       × 1.8 when framework-marked (attributes, *Controller base,
//!         IHostedService)
//!       × 0.3 when declared under a utility path
//!       × (1 + min(depth, 5) × 0.1)
//!
//! Test files never produce entry points.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

use super::knowledge::KnowledgeGraph;
use crate::analysis::Symbol;

static ENTRY_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i).*Controller$").unwrap(),
        Regex::new(r"(?i).*Handler$").unwrap(),
        Regex::new(r"(?i).*Endpoint$").unwrap(),
        Regex::new(r"(?i).*Middleware$").unwrap(),
        Regex::new(r"(?i)^Main$").unwrap(),
        Regex::new(r"(?i)^Startup$").unwrap(),
        Regex::new(r"(?i)^Configure").unwrap(),
        Regex::new(r"(?i)^Map.*Endpoints$").unwrap(),
        Regex::new(r"(?i).*Route$").unwrap(),
        Regex::new(r"(?i).*Listener$").unwrap(),
        Regex::new(r"(?i)^handle").unwrap(),
        Regex::new(r"^on[A-Z]").unwrap(),
        Regex::new(r"(?i)^process").unwrap(),
    ]
});

static TEST_PATH_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)(?:^|/)tests?(?:/|$)").unwrap(),
        Regex::new(r"(?i)(?:^|/)specs?(?:/|$)").unwrap(),
        Regex::new(r"(?i)(?:^|/)__tests__(?:/|$)").unwrap(),
        Regex::new(r"(?i)(?:tests?|specs?|_test|_spec)\.").unwrap(),
        Regex::new(r"(?i)\.tests?/").unwrap(),
    ]
});

const UTILITY_SEGMENTS: &[&str] = &["utils", "helpers", "extensions", "common"];

/// Names that belong to frameworks and never start a process.
static FRAMEWORK_TYPE_EXCLUSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "Task",
        "ValueTask",
        "ILogger",
        "IConfiguration",
        "IServiceCollection",
        "IServiceProvider",
        "CancellationToken",
        "HttpClient",
    ]
    .into_iter()
    .collect()
});

pub fn is_test_path(path: &str) -> bool {
    TEST_PATH_PATTERNS.iter().any(|p| p.is_match(path))
}

fn is_utility_path(path: &str) -> bool {
    path.to_lowercase()
        .split('/')
        .any(|segment| UTILITY_SEGMENTS.contains(&segment))
}

fn matches_entry_pattern(name: &str) -> bool {
    ENTRY_PATTERNS.iter().any(|p| p.is_match(name))
}

/// 1.8 for framework-marked symbols: recorded attributes (ASP.NET
/// `[HttpGet]`-style or Spring `*Mapping`), a `*Controller` base on the
/// parent type, or an `IHostedService` implementation.
fn framework_multiplier(kg: &KnowledgeGraph, symbol: &Symbol) -> f64 {
    let attr_marked = |s: &Symbol| {
        s.attributes
            .iter()
            .any(|a| a.starts_with("Http") || a == "Route" || a.ends_with("Mapping"))
    };
    if attr_marked(symbol) {
        return 1.8;
    }
    if let Some(parent) = symbol.parent.as_deref().and_then(|p| kg.symbol(p)) {
        if attr_marked(parent)
            || parent
                .bases
                .iter()
                .any(|b| b.ends_with("Controller") || b.ends_with("ControllerBase") || b == "IHostedService")
        {
            return 1.8;
        }
    }
    1.0
}

/// Longest outgoing call chain, memoised, capped at 5.
fn chain_depth(
    kg: &KnowledgeGraph,
    id: &str,
    memo: &mut HashMap<String, usize>,
    on_stack: &mut HashSet<String>,
) -> usize {
    if let Some(&depth) = memo.get(id) {
        return depth;
    }
    if on_stack.contains(id) || on_stack.len() >= 5 {
        return 0;
    }
    on_stack.insert(id.to_string());
    let depth = kg
        .callees(id)
        .iter()
        .map(|callee| 1 + chain_depth(kg, &callee.id, memo, on_stack))
        .max()
        .unwrap_or(0)
        .min(5);
    on_stack.remove(id);
    memo.insert(id.to_string(), depth);
    depth
}

/// Score every callable symbol as a potential entry point.
///
/// Returns (symbol id, score) pairs sorted highest first; ties break on id
/// so identical inputs always rank identically.
pub fn score_entry_points(kg: &KnowledgeGraph) -> Vec<(String, f64)> {
    let mut memo = HashMap::new();
    let mut scores: Vec<(String, f64)> = Vec::new();

    for symbol in kg.symbols() {
        if !symbol.kind.is_callable() {
            continue;
        }
        if FRAMEWORK_TYPE_EXCLUSIONS.contains(symbol.name.as_str()) {
            continue;
        }
        if is_test_path(&symbol.file) {
            continue;
        }

        let out_degree = kg.callees(&symbol.id).len() as f64;
        let in_degree = kg.callers(&symbol.id).len() as f64;
        let base = out_degree / (in_degree + 1.0);
        if base == 0.0 {
            continue;
        }

        let export_mult = if symbol.exported { 2.0 } else { 1.0 };
        let name_mult = if matches_entry_pattern(&symbol.name) {
            1.5
        } else {
            1.0
        };
        let framework_mult = framework_multiplier(kg, symbol);
        let utility_mult = if is_utility_path(&symbol.file) { 0.3 } else { 1.0 };

        let depth = chain_depth(kg, &symbol.id, &mut memo, &mut HashSet::new());
        let depth_bonus = 1.0 + depth.min(5) as f64 * 0.1;

        let score = base * export_mult * name_mult * framework_mult * utility_mult * depth_bonus;
        scores.push((symbol.id.clone(), score));
    }

    scores.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    scores
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{SymbolKind, Visibility};
    use crate::graph::knowledge::{CallEdge, Tier};

    fn method(id: &str, name: &str, file: &str, exported: bool) -> Symbol {
        Symbol {
            id: id.to_string(),
            name: name.to_string(),
            kind: SymbolKind::Method,
            file: file.to_string(),
            line: 1,
            end_line: 10,
            visibility: Visibility::Public,
            exported,
            parent: None,
            language: Some("cs".to_string()),
            parameter_types: Vec::new(),
            bases: Vec::new(),
            attributes: Vec::new(),
        }
    }

    fn call(kg: &mut KnowledgeGraph, from: &str, to: &str) {
        kg.add_call(CallEdge {
            from: from.to_string(),
            to: to.to_string(),
            confidence: 0.9,
            tier: Tier::A,
            reason: "import-resolved".to_string(),
            line: 1,
        })
        .unwrap();
    }

    #[test]
    fn handler_names_outrank_plain_workers() {
        let mut kg = KnowledgeGraph::new();
        kg.add_symbol(method("sym_0001", "HandleCreate", "api/h.cs", true));
        kg.add_symbol(method("sym_0002", "DoWork", "svc/w.cs", true));
        kg.add_symbol(method("sym_0003", "Target", "svc/t.cs", true));
        call(&mut kg, "sym_0001", "sym_0003");
        call(&mut kg, "sym_0002", "sym_0003");

        let scores = score_entry_points(&kg);
        assert_eq!(scores[0].0, "sym_0001");
    }

    #[test]
    fn test_files_never_score() {
        let mut kg = KnowledgeGraph::new();
        kg.add_symbol(method("sym_0001", "RunAll", "tests/test_main.cs", true));
        kg.add_symbol(method("sym_0002", "Run", "src/main.cs", true));
        call(&mut kg, "sym_0001", "sym_0002");
        let scores = score_entry_points(&kg);
        assert!(scores.iter().all(|(id, _)| id != "sym_0001"));
    }

    #[test]
    fn exported_beats_private() {
        let mut kg = KnowledgeGraph::new();
        kg.add_symbol(method("sym_0001", "RunA", "src/a.cs", true));
        kg.add_symbol(method("sym_0002", "RunB", "src/b.cs", false));
        kg.add_symbol(method("sym_0003", "Target", "src/t.cs", true));
        call(&mut kg, "sym_0001", "sym_0003");
        call(&mut kg, "sym_0002", "sym_0003");
        let scores = score_entry_points(&kg);
        let pub_score = scores.iter().find(|(id, _)| id == "sym_0001").unwrap().1;
        let priv_score = scores.iter().find(|(id, _)| id == "sym_0002").unwrap().1;
        assert!(pub_score > priv_score);
    }

    #[test]
    fn utility_paths_are_penalized() {
        let mut kg = KnowledgeGraph::new();
        kg.add_symbol(method("sym_0001", "FormatDate", "utils/fmt.cs", true));
        kg.add_symbol(method("sym_0002", "Submit", "services/s.cs", true));
        kg.add_symbol(method("sym_0003", "Target", "src/t.cs", true));
        call(&mut kg, "sym_0001", "sym_0003");
        call(&mut kg, "sym_0002", "sym_0003");
        let scores = score_entry_points(&kg);
        let util = scores.iter().find(|(id, _)| id == "sym_0001").unwrap().1;
        let service = scores.iter().find(|(id, _)| id == "sym_0002").unwrap().1;
        assert!(service > util);
    }

    #[test]
    fn deeper_chains_score_higher() {
        let mut kg = KnowledgeGraph::new();
        kg.add_symbol(method("sym_0001", "Deep", "src/a.cs", true));
        kg.add_symbol(method("sym_0002", "Mid", "src/b.cs", true));
        kg.add_symbol(method("sym_0003", "Leaf", "src/c.cs", true));
        kg.add_symbol(method("sym_0004", "Shallow", "src/d.cs", true));
        kg.add_symbol(method("sym_0005", "Leaf2", "src/e.cs", true));
        call(&mut kg, "sym_0001", "sym_0002");
        call(&mut kg, "sym_0002", "sym_0003");
        call(&mut kg, "sym_0004", "sym_0005");
        let scores = score_entry_points(&kg);
        let deep = scores.iter().find(|(id, _)| id == "sym_0001").unwrap().1;
        let shallow = scores.iter().find(|(id, _)| id == "sym_0004").unwrap().1;
        assert!(deep > shallow);
    }

    #[test]
    fn framework_attribute_multiplies() {
        let mut kg = KnowledgeGraph::new();
        let mut marked = method("sym_0001", "Get", "api/a.cs", true);
        marked.attributes.push("HttpGet".to_string());
        kg.add_symbol(marked);
        kg.add_symbol(method("sym_0002", "Get2", "api/b.cs", true));
        kg.add_symbol(method("sym_0003", "Target", "src/t.cs", true));
        call(&mut kg, "sym_0001", "sym_0003");
        call(&mut kg, "sym_0002", "sym_0003");
        let scores = score_entry_points(&kg);
        let marked_score = scores.iter().find(|(id, _)| id == "sym_0001").unwrap().1;
        let plain_score = scores.iter().find(|(id, _)| id == "sym_0002").unwrap().1;
        assert!((marked_score / plain_score - 1.8).abs() < 1e-9);
    }

    #[test]
    fn call_cycles_do_not_hang_depth_probe() {
        let mut kg = KnowledgeGraph::new();
        kg.add_symbol(method("sym_0001", "Ping", "src/a.cs", true));
        kg.add_symbol(method("sym_0002", "Pong", "src/b.cs", true));
        call(&mut kg, "sym_0001", "sym_0002");
        call(&mut kg, "sym_0002", "sym_0001");
        let scores = score_entry_points(&kg);
        assert_eq!(scores.len(), 2);
    }

    #[test]
    fn zero_out_degree_is_skipped() {
        let mut kg = KnowledgeGraph::new();
        kg.add_symbol(method("sym_0001", "Lonely", "src/a.cs", true));
        assert!(score_entry_points(&kg).is_empty());
    }
}
