//! Graph repository: CRUD, transactional batches, and snapshotting.
//!
//! The in-memory implementation backs reads with a lock-free concurrent map
//! so readers never block on writer churn, the way the connection registry
//! in the live channel hub is built.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::error::{GraphError, Result};
use crate::model::{Edge, EdgeKind, GraphSnapshot, Node, NodeKind, NodePatch, QueryFilters};

/// A single step of a [`GraphRepository::apply_transaction`] batch.
#[derive(Debug, Clone)]
pub enum GraphMutation {
    UpsertNode(Node),
    PatchNode { id: String, patch: NodePatch },
    DeleteNode { id: String, cascade: bool },
    UpsertEdge(Edge),
    DeleteEdge(String),
}

/// Storage and query surface over the spec graph. Implementations must apply
/// [`GraphRepository::apply_transaction`] atomically: either every mutation
/// in the batch lands, or none do.
#[async_trait]
pub trait GraphRepository: Send + Sync {
    async fn get_node(&self, id: &str) -> Result<Node>;
    async fn get_edge(&self, id: &str) -> Result<Edge>;
    async fn query_nodes(&self, kind: Option<NodeKind>, filters: &QueryFilters) -> Result<Vec<Node>>;
    async fn edges_of(&self, node_id: &str) -> Result<Vec<Edge>>;

    /// All edges matching `kind` (when given) and `filters`, independent of
    /// any particular node. Mirrors `query_nodes` for the edge side of the
    /// graph — used by callers that need "every `depends_on` edge" rather
    /// than "the edges touching this node".
    async fn query_edges(&self, kind: Option<EdgeKind>, filters: &QueryFilters) -> Result<Vec<Edge>>;
    async fn snapshot(&self) -> Result<GraphSnapshot>;

    /// Applies every mutation in `batch` as a single atomic unit.
    async fn apply_transaction(&self, batch: Vec<GraphMutation>) -> Result<()>;

    async fn upsert_node(&self, node: Node) -> Result<()> {
        self.apply_transaction(vec![GraphMutation::UpsertNode(node)]).await
    }

    async fn patch_node(&self, id: &str, patch: NodePatch) -> Result<()> {
        self.apply_transaction(vec![GraphMutation::PatchNode {
            id: id.to_string(),
            patch,
        }])
        .await
    }

    /// Deletes a node. If `cascade` is false and dependent edges remain, the
    /// transaction fails with [`GraphError::Validation`].
    async fn delete_node(&self, id: &str, cascade: bool) -> Result<()> {
        self.apply_transaction(vec![GraphMutation::DeleteNode {
            id: id.to_string(),
            cascade,
        }])
        .await
    }

    async fn upsert_edge(&self, edge: Edge) -> Result<()> {
        self.apply_transaction(vec![GraphMutation::UpsertEdge(edge)]).await
    }

    async fn delete_edge(&self, id: &str) -> Result<()> {
        self.apply_transaction(vec![GraphMutation::DeleteEdge(id.to_string())])
            .await
    }
}

/// In-memory [`GraphRepository`], suitable for tests and single-process
/// deployments. Writes serialize through a single mutex so a transaction's
/// validation and application stay atomic; reads go through `DashMap` and
/// never contend with each other.
pub struct InMemoryGraphRepository {
    nodes: Arc<DashMap<String, Node>>,
    edges: Arc<DashMap<String, Edge>>,
    write_lock: Mutex<()>,
}

impl InMemoryGraphRepository {
    pub fn new() -> Self {
        Self {
            nodes: Arc::new(DashMap::new()),
            edges: Arc::new(DashMap::new()),
            write_lock: Mutex::new(()),
        }
    }

    fn edges_touching(&self, node_id: &str) -> Vec<String> {
        self.edges
            .iter()
            .filter(|e| e.source_id == node_id || e.target_id == node_id)
            .map(|e| e.id.clone())
            .collect()
    }

    fn apply_one(&self, mutation: GraphMutation) -> Result<()> {
        match mutation {
            GraphMutation::UpsertNode(node) => {
                self.nodes.insert(node.id.clone(), node);
            }
            GraphMutation::PatchNode { id, patch } => {
                let mut entry = self
                    .nodes
                    .get_mut(&id)
                    .ok_or_else(|| GraphError::NodeNotFound(id.clone()))?;
                if let Some(name) = patch.name {
                    entry.name = name;
                }
                if let Some(description) = patch.description {
                    entry.description = Some(description);
                }
                if let Some(content) = patch.content {
                    entry.content = Some(content);
                }
                if let Some(spec_source) = patch.spec_source {
                    entry.spec_source = Some(spec_source);
                }
                if let Some(metadata) = patch.metadata {
                    entry.metadata = metadata;
                }
                if let Some(status) = patch.status {
                    entry.status = status;
                }
                entry.updated_at = chrono::Utc::now();
            }
            GraphMutation::DeleteNode { id, cascade } => {
                if !self.nodes.contains_key(&id) {
                    return Err(GraphError::NodeNotFound(id));
                }
                let touching = self.edges_touching(&id);
                if !cascade && !touching.is_empty() {
                    return Err(GraphError::Validation(format!(
                        "node {id} has {} dependent edge(s); delete with cascade or remove them first",
                        touching.len()
                    )));
                }
                for edge_id in touching {
                    self.edges.remove(&edge_id);
                }
                self.nodes.remove(&id);
            }
            GraphMutation::UpsertEdge(edge) => {
                if !self.nodes.contains_key(&edge.source_id) {
                    return Err(GraphError::DanglingReference {
                        edge_id: edge.id,
                        node_id: edge.source_id,
                    });
                }
                if !self.nodes.contains_key(&edge.target_id) {
                    return Err(GraphError::DanglingReference {
                        edge_id: edge.id,
                        node_id: edge.target_id,
                    });
                }
                self.edges.insert(edge.id.clone(), edge);
            }
            GraphMutation::DeleteEdge(id) => {
                self.edges
                    .remove(&id)
                    .ok_or_else(|| GraphError::EdgeNotFound(id))?;
            }
        }
        Ok(())
    }
}

impl Default for InMemoryGraphRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GraphRepository for InMemoryGraphRepository {
    async fn get_node(&self, id: &str) -> Result<Node> {
        self.nodes
            .get(id)
            .map(|n| n.clone())
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))
    }

    async fn get_edge(&self, id: &str) -> Result<Edge> {
        self.edges
            .get(id)
            .map(|e| e.clone())
            .ok_or_else(|| GraphError::EdgeNotFound(id.to_string()))
    }

    async fn query_nodes(&self, kind: Option<NodeKind>, filters: &QueryFilters) -> Result<Vec<Node>> {
        let mut out: Vec<Node> = self
            .nodes
            .iter()
            .filter(|n| kind.map(|k| n.kind == k).unwrap_or(true))
            .filter(|n| filters.status.map(|s| n.status == s).unwrap_or(true))
            .filter(|n| {
                filters
                    .metadata_equals
                    .iter()
                    .all(|(k, v)| n.metadata.get(k) == Some(v))
            })
            .map(|n| n.clone())
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    async fn edges_of(&self, node_id: &str) -> Result<Vec<Edge>> {
        let mut out: Vec<Edge> = self
            .edges
            .iter()
            .filter(|e| e.source_id == node_id || e.target_id == node_id)
            .map(|e| e.clone())
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    async fn query_edges(&self, kind: Option<EdgeKind>, filters: &QueryFilters) -> Result<Vec<Edge>> {
        let _ = filters;
        let mut out: Vec<Edge> = self
            .edges
            .iter()
            .filter(|e| kind.map(|k| e.kind == k).unwrap_or(true))
            .map(|e| e.clone())
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    async fn snapshot(&self) -> Result<GraphSnapshot> {
        let mut nodes: Vec<Node> = self.nodes.iter().map(|n| n.clone()).collect();
        let mut edges: Vec<Edge> = self.edges.iter().map(|e| e.clone()).collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        edges.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(GraphSnapshot { nodes, edges })
    }

    async fn apply_transaction(&self, batch: Vec<GraphMutation>) -> Result<()> {
        let _guard = self.write_lock.lock();

        // Snapshot affected keys so a failure partway through can be rolled back
        // by restoring the pre-transaction entries rather than leaving a partial
        // write visible to readers.
        let mut node_backup: HashSet<String> = HashSet::new();
        let mut edge_backup: HashSet<String> = HashSet::new();
        for mutation in &batch {
            match mutation {
                GraphMutation::UpsertNode(n) => {
                    node_backup.insert(n.id.clone());
                }
                GraphMutation::PatchNode { id, .. } | GraphMutation::DeleteNode { id, .. } => {
                    node_backup.insert(id.clone());
                }
                GraphMutation::UpsertEdge(e) => {
                    edge_backup.insert(e.id.clone());
                }
                GraphMutation::DeleteEdge(id) => {
                    edge_backup.insert(id.clone());
                }
            }
        }
        let node_snapshot: Vec<(String, Option<Node>)> = node_backup
            .iter()
            .map(|id| (id.clone(), self.nodes.get(id).map(|n| n.clone())))
            .collect();
        let edge_snapshot: Vec<(String, Option<Edge>)> = edge_backup
            .iter()
            .map(|id| (id.clone(), self.edges.get(id).map(|e| e.clone())))
            .collect();

        for mutation in batch {
            if let Err(err) = self.apply_one(mutation) {
                for (id, node) in node_snapshot {
                    match node {
                        Some(n) => {
                            self.nodes.insert(id, n);
                        }
                        None => {
                            self.nodes.remove(&id);
                        }
                    }
                }
                for (id, edge) in edge_snapshot {
                    match edge {
                        Some(e) => {
                            self.edges.insert(id, e);
                        }
                        None => {
                            self.edges.remove(&id);
                        }
                    }
                }
                return Err(err);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EdgeKind, NodeKind};

    #[tokio::test]
    async fn upsert_then_get_round_trips() {
        let repo = InMemoryGraphRepository::new();
        let node = Node::new("n1", NodeKind::Module, "auth");
        repo.upsert_node(node.clone()).await.unwrap();
        let fetched = repo.get_node("n1").await.unwrap();
        assert_eq!(fetched.name, "auth");
    }

    #[tokio::test]
    async fn edge_with_dangling_target_is_rejected() {
        let repo = InMemoryGraphRepository::new();
        repo.upsert_node(Node::new("n1", NodeKind::Module, "a")).await.unwrap();
        let edge = Edge::new("e1", "n1", "missing", EdgeKind::DependsOn);
        let err = repo.upsert_edge(edge).await.unwrap_err();
        assert!(matches!(err, GraphError::DanglingReference { .. }));
    }

    #[tokio::test]
    async fn delete_without_cascade_fails_when_edges_remain() {
        let repo = InMemoryGraphRepository::new();
        repo.upsert_node(Node::new("a", NodeKind::Module, "a")).await.unwrap();
        repo.upsert_node(Node::new("b", NodeKind::Module, "b")).await.unwrap();
        repo.upsert_edge(Edge::new("e1", "a", "b", EdgeKind::DependsOn))
            .await
            .unwrap();

        let err = repo.delete_node("b", false).await.unwrap_err();
        assert!(matches!(err, GraphError::Validation(_)));

        repo.delete_node("b", true).await.unwrap();
        assert!(repo.get_node("b").await.is_err());
        assert!(repo.get_edge("e1").await.is_err());
    }

    #[tokio::test]
    async fn failed_transaction_rolls_back_every_mutation() {
        let repo = InMemoryGraphRepository::new();
        repo.upsert_node(Node::new("a", NodeKind::Module, "a")).await.unwrap();

        let batch = vec![
            GraphMutation::PatchNode {
                id: "a".to_string(),
                patch: NodePatch {
                    name: Some("renamed".to_string()),
                    ..Default::default()
                },
            },
            GraphMutation::DeleteNode {
                id: "does-not-exist".to_string(),
                cascade: true,
            },
        ];
        let err = repo.apply_transaction(batch).await.unwrap_err();
        assert!(matches!(err, GraphError::NodeNotFound(_)));

        let node = repo.get_node("a").await.unwrap();
        assert_eq!(node.name, "a");
    }

    #[tokio::test]
    async fn query_edges_filters_by_kind_and_is_gone_after_cascade_delete() {
        let repo = InMemoryGraphRepository::new();
        repo.upsert_node(Node::new("a", NodeKind::Module, "a")).await.unwrap();
        repo.upsert_node(Node::new("b", NodeKind::Module, "b")).await.unwrap();
        repo.upsert_edge(Edge::new("e1", "a", "b", EdgeKind::DependsOn))
            .await
            .unwrap();
        repo.upsert_edge(Edge::new("e2", "a", "b", EdgeKind::TestedBy))
            .await
            .unwrap();

        let depends_on = repo.query_edges(Some(EdgeKind::DependsOn), &QueryFilters::new()).await.unwrap();
        assert_eq!(depends_on.len(), 1);
        assert_eq!(depends_on[0].id, "e1");

        let all = repo.query_edges(None, &QueryFilters::new()).await.unwrap();
        assert_eq!(all.len(), 2);

        repo.delete_node("a", true).await.unwrap();
        let remaining = repo.query_edges(Some(EdgeKind::DependsOn), &QueryFilters::new()).await.unwrap();
        assert!(remaining.is_empty());
    }

    #[tokio::test]
    async fn snapshot_reflects_current_state() {
        let repo = InMemoryGraphRepository::new();
        repo.upsert_node(Node::new("a", NodeKind::Module, "a")).await.unwrap();
        repo.upsert_node(Node::new("b", NodeKind::Module, "b")).await.unwrap();
        repo.upsert_edge(Edge::new("e1", "a", "b", EdgeKind::DependsOn))
            .await
            .unwrap();

        let snapshot = repo.snapshot().await.unwrap();
        assert_eq!(snapshot.nodes.len(), 2);
        assert_eq!(snapshot.edges.len(), 1);
    }
}
