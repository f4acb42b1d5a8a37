//! Service dependency graph and cycle detection.
//!
//! Detection is an iterative depth-first traversal with three colours, so
//! pathological dependency chains never grow the native stack.

use crate::types::Service;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Adjacency list: service name -> names of its declared dependencies.
pub type AdjacencyList = BTreeMap<String, Vec<String>>;

/// Outcome of a cycle check.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub has_cycle: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CycleReport {
    fn acyclic() -> Self {
        Self::default()
    }

    fn found(cycle: Vec<String>) -> Self {
        let message = format!("Circular dependency detected: {}", format_cycle(&cycle));
        Self {
            has_cycle: true,
            cycle: Some(cycle),
            message: Some(message),
        }
    }
}

/// Render a cycle path as `A -> B -> A`.
pub fn format_cycle(cycle: &[String]) -> String {
    cycle.join(" -> ")
}

/// Build the dependency graph from the declared dependencies of every service.
pub fn dependency_graph(services: &[Service]) -> AdjacencyList {
    services
        .iter()
        .map(|service| {
            let deps = service
                .dependencies
                .iter()
                .map(|dep| dep.name.clone())
                .collect();
            (service.name.clone(), deps)
        })
        .collect()
}

/// Services that list `target` as a direct dependency, excluding `target` itself.
pub fn direct_dependents(target: &str, graph: &AdjacencyList) -> Vec<String> {
    graph
        .iter()
        .filter(|(name, deps)| name.as_str() != target && deps.iter().any(|d| d == target))
        .map(|(name, _)| name.clone())
        .collect()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    InProgress,
    Done,
}

/// Detect a cycle reachable from `start` by following outgoing edges.
///
/// `start` does not have to lie on the cycle itself: a node whose transitive
/// dependencies contain a cycle also reports `has_cycle`. Check
/// `cycle.contains(start)` to ask whether `start` is itself part of it.
///
/// Nodes that have no entry in `graph` are treated as having no dependencies.
/// The returned cycle starts and ends on the node closed by the back edge,
/// e.g. `["A", "B", "C", "A"]`; a self-loop yields `["A", "A"]`.
pub fn detect_cycle(start: &str, graph: &AdjacencyList) -> CycleReport {
    let mut colors: HashMap<&str, Color> = HashMap::new();
    // Current DFS path, with the index of the next neighbour to visit.
    let mut stack: Vec<(&str, usize)> = vec![(start, 0)];
    colors.insert(start, Color::InProgress);

    while let Some(frame) = stack.last_mut() {
        let (node, next) = *frame;
        let neighbours = graph.get(node).map(Vec::as_slice).unwrap_or(&[]);

        let Some(neighbour) = neighbours.get(next) else {
            colors.insert(node, Color::Done);
            stack.pop();
            continue;
        };
        frame.1 += 1;
        let neighbour = neighbour.as_str();

        match colors.get(neighbour) {
            Some(Color::InProgress) => {
                let first = stack
                    .iter()
                    .position(|(n, _)| *n == neighbour)
                    .unwrap_or(0);
                let mut cycle: Vec<String> =
                    stack[first..].iter().map(|(n, _)| n.to_string()).collect();
                cycle.push(neighbour.to_string());
                return CycleReport::found(cycle);
            }
            Some(Color::Done) => {}
            None => {
                colors.insert(neighbour, Color::InProgress);
                stack.push((neighbour, 0));
            }
        }
    }

    CycleReport::acyclic()
}

/// Check whether adding the edge `from -> to` would introduce a cycle.
///
/// Runs against a copy of `graph`; the caller's map is never touched.
pub fn would_create_cycle(from: &str, to: &str, graph: &AdjacencyList) -> CycleReport {
    let mut hypothetical = graph.clone();
    let deps = hypothetical.entry(from.to_string()).or_default();
    if !deps.iter().any(|d| d == to) {
        deps.push(to.to_string());
    }
    detect_cycle(from, &hypothetical)
}
