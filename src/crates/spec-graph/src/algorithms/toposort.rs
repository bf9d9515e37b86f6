//! Topological ordering strategies over an arbitrary edge subset of a snapshot.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::model::{EdgeKind, GraphSnapshot};

/// Which algorithm to use when ordering a graph. All three agree on acyclic
/// input; they differ in tie-breaking and in what they expose about structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopoSortStrategy {
    /// Kahn's algorithm: repeatedly remove zero-in-degree nodes, ties broken
    /// by id for determinism.
    Kahn,
    /// Post-order DFS, reversed.
    Dfs,
    /// Like `Kahn`, but groups nodes into layers that could all execute in
    /// parallel (every node in layer N depends only on nodes in layers < N).
    Layered,
}

fn adjacency(snapshot: &GraphSnapshot, edge_kinds: &[EdgeKind]) -> HashMap<String, Vec<String>> {
    let mut adj: HashMap<String, Vec<String>> = snapshot
        .nodes
        .iter()
        .map(|n| (n.id.clone(), Vec::new()))
        .collect();
    for edge in &snapshot.edges {
        if !edge_kinds.is_empty() && !edge_kinds.contains(&edge.kind) {
            continue;
        }
        adj.entry(edge.source_id.clone())
            .or_default()
            .push(edge.target_id.clone());
    }
    adj
}

/// Orders `snapshot`'s nodes so that every edge in `edge_kinds` (source
/// depends on target, matching [`crate::model::Edge`]'s direction) places the
/// target before the source. Pass an empty slice to consider every edge kind.
/// Returns `None` if the restricted graph has a cycle.
pub fn topological_sort(
    snapshot: &GraphSnapshot,
    edge_kinds: &[EdgeKind],
    strategy: TopoSortStrategy,
) -> Option<Vec<String>> {
    let adj = adjacency(snapshot, edge_kinds);
    match strategy {
        TopoSortStrategy::Kahn => kahn(&adj),
        TopoSortStrategy::Dfs => dfs_order(&adj),
        TopoSortStrategy::Layered => layered(&adj).map(|layers| layers.into_iter().flatten().collect()),
    }
}

/// Same as [`topological_sort`] with [`TopoSortStrategy::Layered`], but keeps
/// the layer boundaries so callers can dispatch each layer concurrently.
pub fn layered_order(snapshot: &GraphSnapshot, edge_kinds: &[EdgeKind]) -> Option<Vec<Vec<String>>> {
    layered(&adjacency(snapshot, edge_kinds))
}

fn kahn(adj: &HashMap<String, Vec<String>>) -> Option<Vec<String>> {
    let mut in_degree: HashMap<String, usize> = adj.keys().map(|id| (id.clone(), 0)).collect();
    for targets in adj.values() {
        for t in targets {
            *in_degree.entry(t.clone()).or_insert(0) += 1;
        }
    }

    let mut ready: Vec<String> = in_degree
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(id, _)| id.clone())
        .collect();
    ready.sort();
    let mut queue: VecDeque<String> = ready.into();

    let mut order = Vec::with_capacity(adj.len());
    while let Some(id) = queue.pop_front() {
        order.push(id.clone());
        if let Some(targets) = adj.get(&id) {
            let mut newly_ready = Vec::new();
            for t in targets {
                let deg = in_degree.get_mut(t).unwrap();
                *deg -= 1;
                if *deg == 0 {
                    newly_ready.push(t.clone());
                }
            }
            newly_ready.sort();
            for t in newly_ready {
                queue.push_back(t);
            }
        }
    }

    // target depends on nothing listed means dependency direction is reversed for
    // the caller's "depends on" edges: targets must precede sources, so reverse.
    order.reverse();
    if order.len() == adj.len() {
        Some(order)
    } else {
        None
    }
}

fn dfs_order(adj: &HashMap<String, Vec<String>>) -> Option<Vec<String>> {
    let mut visited = HashSet::new();
    let mut in_progress = HashSet::new();
    let mut out = Vec::with_capacity(adj.len());

    let mut ids: Vec<&String> = adj.keys().collect();
    ids.sort();

    for id in ids {
        if !visit(id, adj, &mut visited, &mut in_progress, &mut out) {
            return None;
        }
    }
    Some(out)
}

fn visit(
    id: &str,
    adj: &HashMap<String, Vec<String>>,
    visited: &mut HashSet<String>,
    in_progress: &mut HashSet<String>,
    out: &mut Vec<String>,
) -> bool {
    if visited.contains(id) {
        return true;
    }
    if !in_progress.insert(id.to_string()) {
        return false;
    }
    if let Some(targets) = adj.get(id) {
        let mut targets = targets.clone();
        targets.sort();
        for t in targets {
            if !visit(&t, adj, visited, in_progress, out) {
                return false;
            }
        }
    }
    in_progress.remove(id);
    visited.insert(id.to_string());
    out.push(id.to_string());
    true
}

fn layered(adj: &HashMap<String, Vec<String>>) -> Option<Vec<Vec<String>>> {
    let mut in_degree: HashMap<String, usize> = adj.keys().map(|id| (id.clone(), 0)).collect();
    for targets in adj.values() {
        for t in targets {
            *in_degree.entry(t.clone()).or_insert(0) += 1;
        }
    }

    let mut remaining = in_degree.len();
    let mut layers = Vec::new();
    let mut current: Vec<String> = in_degree
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(id, _)| id.clone())
        .collect();
    current.sort();

    while !current.is_empty() {
        remaining -= current.len();
        let mut next_degree = in_degree.clone();
        let mut next: Vec<String> = Vec::new();
        for id in &current {
            if let Some(targets) = adj.get(id) {
                for t in targets {
                    let deg = next_degree.get_mut(t).unwrap();
                    *deg -= 1;
                    if *deg == 0 {
                        next.push(t.clone());
                    }
                }
            }
        }
        layers.push(std::mem::take(&mut current));
        next.sort();
        next.dedup();
        in_degree = next_degree;
        current = next;
    }

    // Each layer currently lists "downstream" targets; edges point dependency ->
    // dependent is the opposite convention, so layers are already built from
    // zero-in-degree (leaves of the dependency direction) outward, matching
    // the `Kahn` strategy's reversal.
    layers.reverse();
    for layer in &mut layers {
        layer.reverse();
    }

    if remaining == 0 {
        Some(layers)
    } else {
        None
    }
}
