//! Core data model: nodes, edges, and the closed type vocabularies they draw from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The kind of artifact a [`Node`] represents in the spec graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Spec,
    Module,
    Controller,
    Model,
    RouteApi,
    Task,
    Test,
    Agent,
    Goal,
    Constraint,
    Documentation,
}

/// Lifecycle status of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    #[default]
    Active,
    Draft,
    Deprecated,
    Pending,
}

/// The kind of relationship an [`Edge`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    DependsOn,
    Implements,
    Refines,
    TestedBy,
    OwnedBy,
    Produces,
    Consumes,
    Monitors,
    ConflictsWith,
}

impl EdgeKind {
    /// Whether this edge kind is part of the dependency closure considered by
    /// [`crate::algorithms::dependency::DependencyResolver`].
    pub fn is_dependency_edge(&self) -> bool {
        matches!(
            self,
            EdgeKind::DependsOn | EdgeKind::Implements | EdgeKind::Refines | EdgeKind::TestedBy
        )
    }

    /// Relative traversal weight. `conflicts_with` is heaviest so shortest-path
    /// search avoids routing through a conflict unless nothing else works.
    pub fn traversal_weight(&self) -> u32 {
        match self {
            EdgeKind::ConflictsWith => 10,
            EdgeKind::DependsOn | EdgeKind::Implements => 1,
            EdgeKind::Refines | EdgeKind::TestedBy => 2,
            EdgeKind::OwnedBy | EdgeKind::Produces | EdgeKind::Consumes | EdgeKind::Monitors => 3,
        }
    }
}

/// A node in the spec graph: a typed artifact with free-text content and
/// string metadata, plus an optional embedding maintained by the semantic
/// index (never set directly by callers).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    pub name: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub spec_source: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub status: NodeStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Maintained exclusively by the semantic index; never set by callers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Node {
    /// Construct a new, active node with the given id/kind/name.
    pub fn new(id: impl Into<String>, kind: NodeKind, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            kind,
            name: name.into(),
            description: None,
            content: None,
            spec_source: None,
            metadata: HashMap::new(),
            status: NodeStatus::Active,
            created_at: now,
            updated_at: now,
            embedding: None,
        }
    }

    /// Text the semantic index derives candidates from: name, description, content.
    pub fn indexable_text(&self) -> String {
        let mut parts = vec![self.name.as_str()];
        if let Some(d) = self.description.as_deref() {
            parts.push(d);
        }
        if let Some(c) = self.content.as_deref() {
            parts.push(c);
        }
        parts.join(" ")
    }
}

/// Partial update to a node: unspecified fields are preserved.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub spec_source: Option<String>,
    pub metadata: Option<HashMap<String, String>>,
    pub status: Option<NodeStatus>,
}

/// An edge connecting two existing nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    pub kind: EdgeKind,
    pub description: Option<String>,
    #[serde(default)]
    pub confidence: f32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Edge {
    pub fn new(
        id: impl Into<String>,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        kind: EdgeKind,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            source_id: source_id.into(),
            target_id: target_id.into(),
            kind,
            description: None,
            confidence: 0.0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A consistent point-in-time view of a subset of the graph, used to hand a
/// stable snapshot to agents without holding repository locks across an
/// `.await`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// Filters accepted by `query_nodes`/`query_edges`. Equality-only, applied
/// against `metadata`; callers combine with a `kind` filter passed separately.
#[derive(Debug, Clone, Default)]
pub struct QueryFilters {
    pub metadata_equals: HashMap<String, String>,
    pub status: Option<NodeStatus>,
}

impl QueryFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata_equals.insert(key.into(), value.into());
        self
    }

    pub fn with_status(mut self, status: NodeStatus) -> Self {
        self.status = Some(status);
        self
    }

    fn matches_node(&self, node: &Node) -> bool {
        if let Some(status) = self.status {
            if node.status != status {
                return false;
            }
        }
        self.metadata_equals
            .iter()
            .all(|(k, v)| node.metadata.get(k) == Some(v))
    }
}
