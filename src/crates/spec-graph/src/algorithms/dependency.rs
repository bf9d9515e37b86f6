//! Dependency closure analysis: depth calculation, cycle detection, resolution
//! ordering, change-impact analysis, and aggregate graph statistics.
//!
//! Mirrors the dependency resolver used upstream, restricted to the edge
//! kinds [`crate::model::EdgeKind::is_dependency_edge`] reports as part of
//! the dependency closure.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::model::{GraphSnapshot, Node};

/// A detected cycle in the dependency closure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircularDependency {
    /// Node ids forming the cycle, in traversal order, first id repeated at the end.
    pub cycle: Vec<String>,
    /// `"direct"` (length <= 3), `"short_chain"` (length <= 5), or `"long_chain"`.
    pub cycle_type: String,
    /// `"high"` (length == 2), `"medium"` (length <= 4), or `"low"`.
    pub severity: String,
    pub description: String,
}

impl CircularDependency {
    fn classify(cycle: Vec<String>) -> Self {
        let length = cycle.len().saturating_sub(1).max(1);
        let cycle_type = if length <= 3 {
            "direct"
        } else if length <= 5 {
            "short_chain"
        } else {
            "long_chain"
        };
        let severity = if length == 2 {
            "high"
        } else if length <= 4 {
            "medium"
        } else {
            "low"
        };
        let description = format!(
            "{} cycle of length {} involving {}",
            cycle_type,
            length,
            cycle.join(" -> ")
        );
        Self {
            cycle,
            cycle_type: cycle_type.to_string(),
            severity: severity.to_string(),
            description,
        }
    }

    pub fn cycle_length(&self) -> usize {
        self.cycle.len().saturating_sub(1).max(1)
    }
}

/// Aggregate statistics over the dependency closure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub avg_fan_in: f64,
    pub avg_fan_out: f64,
    pub max_depth: usize,
    pub highly_connected_count: usize,
}

/// Result of analyzing the blast radius of a change to `changed_node_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactReport {
    pub changed_node_id: String,
    pub affected_node_ids: Vec<String>,
    pub impact_ratio: f64,
    /// `"high"` (ratio >= 0.5), `"medium"` (ratio >= 0.2), or `"low"`.
    pub severity: String,
    pub recommendations: Vec<String>,
}

/// Builds the forward/reverse dependency adjacency for a snapshot and exposes
/// depth, cycle, ordering, and impact queries over it.
pub struct DependencyResolver {
    nodes: HashMap<String, Node>,
    forward: HashMap<String, Vec<String>>,
    reverse: HashMap<String, Vec<String>>,
}

impl DependencyResolver {
    /// Builds the resolver from a snapshot, keeping only edges whose kind is
    /// part of the dependency closure.
    pub fn from_snapshot(snapshot: &GraphSnapshot) -> Self {
        let mut nodes = HashMap::with_capacity(snapshot.nodes.len());
        let mut forward: HashMap<String, Vec<String>> = HashMap::new();
        let mut reverse: HashMap<String, Vec<String>> = HashMap::new();

        for node in &snapshot.nodes {
            nodes.insert(node.id.clone(), node.clone());
            forward.entry(node.id.clone()).or_default();
            reverse.entry(node.id.clone()).or_default();
        }

        for edge in &snapshot.edges {
            if !edge.kind.is_dependency_edge() {
                continue;
            }
            forward
                .entry(edge.source_id.clone())
                .or_default()
                .push(edge.target_id.clone());
            reverse
                .entry(edge.target_id.clone())
                .or_default()
                .push(edge.source_id.clone());
        }

        Self {
            nodes,
            forward,
            reverse,
        }
    }

    fn dependencies_of(&self, id: &str) -> &[String] {
        self.forward.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    fn dependents_of(&self, id: &str) -> &[String] {
        self.reverse.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Depth of each node: longest dependency chain reachable from it, memoized.
    pub fn calculate_dependency_depths(&self) -> HashMap<String, usize> {
        let mut depths = HashMap::new();
        let mut visiting = HashSet::new();
        for id in self.nodes.keys() {
            self.depth_of(id, &mut depths, &mut visiting);
        }
        depths
    }

    fn depth_of(
        &self,
        id: &str,
        depths: &mut HashMap<String, usize>,
        visiting: &mut HashSet<String>,
    ) -> usize {
        if let Some(d) = depths.get(id) {
            return *d;
        }
        if !visiting.insert(id.to_string()) {
            // Part of a cycle; treat as depth 0 here, cycle detection reports it separately.
            return 0;
        }
        let mut max_child_depth = 0;
        for dep in self.dependencies_of(id).to_vec() {
            let d = self.depth_of(&dep, depths, visiting);
            max_child_depth = max_child_depth.max(d + 1);
        }
        visiting.remove(id);
        depths.insert(id.to_string(), max_child_depth);
        max_child_depth
    }

    /// Detects every circular dependency in the closure via DFS with an explicit
    /// recursion stack and path, so each cycle reports the concrete node chain.
    pub fn detect_circular_dependencies(&self) -> Vec<CircularDependency> {
        let mut found = Vec::new();
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        let mut ids: Vec<&String> = self.nodes.keys().collect();
        ids.sort();
        for id in ids {
            if !visited.contains(id) {
                self.dfs_detect_cycle(id, &mut visited, &mut rec_stack, &mut path, &mut found);
            }
        }
        found
    }

    fn dfs_detect_cycle(
        &self,
        id: &str,
        visited: &mut HashSet<String>,
        rec_stack: &mut HashSet<String>,
        path: &mut Vec<String>,
        found: &mut Vec<CircularDependency>,
    ) {
        visited.insert(id.to_string());
        rec_stack.insert(id.to_string());
        path.push(id.to_string());

        for dep in self.dependencies_of(id).to_vec() {
            if rec_stack.contains(&dep) {
                let start = path.iter().position(|n| n == &dep).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..].to_vec();
                cycle.push(dep.clone());
                found.push(CircularDependency::classify(cycle));
            } else if !visited.contains(&dep) {
                self.dfs_detect_cycle(&dep, visited, rec_stack, path, found);
            }
        }

        path.pop();
        rec_stack.remove(id);
    }

    /// Topologically orders the full closure via Kahn's algorithm. Returns
    /// `None` if a cycle makes a total order impossible.
    pub fn resolve_dependencies(&self) -> Option<Vec<String>> {
        self.topological_sort_subset(self.nodes.keys().cloned().collect())
    }

    /// Topologically orders just `subset`, respecting edges between members
    /// of the subset and ignoring dependencies that fall outside it.
    pub fn topological_sort_subset(&self, subset: HashSet<String>) -> Option<Vec<String>> {
        let mut in_degree: HashMap<String, usize> = subset.iter().map(|id| (id.clone(), 0)).collect();

        for id in &subset {
            for dep in self.dependencies_of(id) {
                if subset.contains(dep) {
                    *in_degree.get_mut(id).unwrap() += 1;
                }
            }
        }

        let mut ready: Vec<String> = in_degree
            .iter()
            .filter(|(_, deg)| **deg == 0)
            .map(|(id, _)| id.clone())
            .collect();
        ready.sort();
        let mut queue: VecDeque<String> = ready.into();

        let mut ordered = Vec::with_capacity(subset.len());
        while let Some(id) = queue.pop_front() {
            ordered.push(id.clone());
            let mut newly_ready = Vec::new();
            for candidate in &subset {
                if !subset.contains(candidate) || ordered.contains(candidate) {
                    continue;
                }
                if self
                    .dependencies_of(candidate)
                    .iter()
                    .any(|dep| dep == &id)
                {
                    let deg = in_degree.get_mut(candidate).unwrap();
                    *deg -= 1;
                    if *deg == 0 {
                        newly_ready.push(candidate.clone());
                    }
                }
            }
            newly_ready.sort();
            for id in newly_ready {
                queue.push_back(id);
            }
        }

        if ordered.len() == subset.len() {
            Some(ordered)
        } else {
            None
        }
    }

    /// Change-impact analysis: every node reachable by following dependents
    /// (reverse adjacency) from `changed_node_id`.
    pub fn analyze_change_impact(&self, changed_node_id: &str) -> ImpactReport {
        let mut affected = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(changed_node_id.to_string());
        seen.insert(changed_node_id.to_string());

        while let Some(id) = queue.pop_front() {
            for dependent in self.dependents_of(&id).to_vec() {
                if seen.insert(dependent.clone()) {
                    affected.push(dependent.clone());
                    queue.push_back(dependent);
                }
            }
        }
        affected.sort();

        let total = self.nodes.len().max(1);
        let impact_ratio = affected.len() as f64 / total as f64;
        let severity = if impact_ratio >= 0.5 {
            "high"
        } else if impact_ratio >= 0.2 {
            "medium"
        } else {
            "low"
        };

        let recommendations = self.generate_impact_recommendations(&affected, severity);

        ImpactReport {
            changed_node_id: changed_node_id.to_string(),
            affected_node_ids: affected,
            impact_ratio,
            severity: severity.to_string(),
            recommendations,
        }
    }

    fn generate_impact_recommendations(&self, affected: &[String], severity: &str) -> Vec<String> {
        let mut recs = Vec::new();
        match severity {
            "high" => {
                recs.push(
                    "Large blast radius: stage the change behind approval and notify all affected owners before merging."
                        .to_string(),
                );
            }
            "medium" => {
                recs.push(
                    "Moderate blast radius: re-run tests for affected modules before auto-applying."
                        .to_string(),
                );
            }
            _ => {
                recs.push("Limited blast radius: safe to auto-apply if validation passes.".to_string());
            }
        }
        if affected.len() > 10 {
            recs.push(format!(
                "{} downstream nodes affected; consider splitting the change into smaller proposals.",
                affected.len()
            ));
        }
        recs
    }

    /// Average fan-in/out, max depth, and count of nodes with more than 5
    /// combined dependents, over the full closure.
    pub fn get_dependency_stats(&self) -> DependencyStats {
        let node_count = self.nodes.len();
        if node_count == 0 {
            return DependencyStats::default();
        }

        let edge_count: usize = self.forward.values().map(Vec::len).sum();
        let avg_fan_out = edge_count as f64 / node_count as f64;
        let avg_fan_in = self
            .reverse
            .values()
            .map(Vec::len)
            .sum::<usize>() as f64
            / node_count as f64;

        let depths = self.calculate_dependency_depths();
        let max_depth = depths.values().copied().max().unwrap_or(0);

        let highly_connected_count = self
            .nodes
            .keys()
            .filter(|id| self.dependents_of(id).len() > 5)
            .count();

        DependencyStats {
            node_count,
            edge_count,
            avg_fan_in,
            avg_fan_out,
            max_depth,
            highly_connected_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Edge, EdgeKind, NodeKind};

    fn snapshot_with_chain(ids: &[&str]) -> GraphSnapshot {
        let nodes = ids
            .iter()
            .map(|id| Node::new(*id, NodeKind::Module, *id))
            .collect();
        let edges = ids
            .windows(2)
            .enumerate()
            .map(|(i, pair)| Edge::new(format!("e{i}"), pair[0], pair[1], EdgeKind::DependsOn))
            .collect();
        GraphSnapshot { nodes, edges }
    }

    #[test]
    fn depths_increase_along_a_chain() {
        let snapshot = snapshot_with_chain(&["a", "b", "c"]);
        let resolver = DependencyResolver::from_snapshot(&snapshot);
        let depths = resolver.calculate_dependency_depths();
        assert_eq!(depths["c"], 0);
        assert_eq!(depths["b"], 1);
        assert_eq!(depths["a"], 2);
    }

    #[test]
    fn detects_direct_two_cycle_as_high_severity() {
        let mut snapshot = snapshot_with_chain(&["a", "b"]);
        snapshot
            .edges
            .push(Edge::new("back", "b", "a", EdgeKind::DependsOn));
        let resolver = DependencyResolver::from_snapshot(&snapshot);
        let cycles = resolver.detect_circular_dependencies();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].severity, "high");
        assert_eq!(cycles[0].cycle_type, "direct");
    }

    #[test]
    fn resolve_dependencies_orders_dependencies_first() {
        let snapshot = snapshot_with_chain(&["a", "b", "c"]);
        let resolver = DependencyResolver::from_snapshot(&snapshot);
        let order = resolver.resolve_dependencies().expect("acyclic");
        let pos = |id: &str| order.iter().position(|x| x == id).unwrap();
        assert!(pos("c") < pos("b"));
        assert!(pos("b") < pos("a"));
    }

    #[test]
    fn resolve_dependencies_returns_none_on_cycle() {
        let mut snapshot = snapshot_with_chain(&["a", "b"]);
        snapshot
            .edges
            .push(Edge::new("back", "b", "a", EdgeKind::DependsOn));
        let resolver = DependencyResolver::from_snapshot(&snapshot);
        assert!(resolver.resolve_dependencies().is_none());
    }

    #[test]
    fn impact_analysis_follows_dependents_transitively() {
        let snapshot = snapshot_with_chain(&["a", "b", "c"]);
        let resolver = DependencyResolver::from_snapshot(&snapshot);
        let report = resolver.analyze_change_impact("c");
        assert_eq!(report.affected_node_ids, vec!["a".to_string(), "b".to_string()]);
        assert!(report.impact_ratio > 0.5);
        assert_eq!(report.severity, "high");
    }

    #[test]
    fn dependency_stats_counts_highly_connected_nodes() {
        let ids: Vec<String> = (0..7).map(|i| format!("dep{i}")).collect();
        let mut nodes = vec![Node::new("hub", NodeKind::Module, "hub")];
        let mut edges = Vec::new();
        for (i, id) in ids.iter().enumerate() {
            nodes.push(Node::new(id.clone(), NodeKind::Module, id.clone()));
            edges.push(Edge::new(format!("e{i}"), id.clone(), "hub", EdgeKind::DependsOn));
        }
        let snapshot = GraphSnapshot { nodes, edges };
        let resolver = DependencyResolver::from_snapshot(&snapshot);
        let stats = resolver.get_dependency_stats();
        assert_eq!(stats.highly_connected_count, 1);
        assert_eq!(stats.node_count, 8);
    }
}
