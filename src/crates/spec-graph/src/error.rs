//! Error types for the spec graph.
//!
//! All errors implement `std::error::Error` via `thiserror` and map onto the
//! closed taxonomy the mutation engine surfaces to callers: validation and
//! dependency failures are reported, not panicked.

use thiserror::Error;

/// Errors produced by the graph repository and its algorithms.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A node id was not found in the repository.
    #[error("node not found: {0}")]
    NodeNotFound(String),

    /// An edge id was not found in the repository.
    #[error("edge not found: {0}")]
    EdgeNotFound(String),

    /// An edge referenced a node that does not exist.
    #[error("edge {edge_id} references unknown node {node_id}")]
    DanglingReference { edge_id: String, node_id: String },

    /// Input failed to satisfy the declared contract.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A circular dependency was detected where one is not permitted.
    #[error("circular dependency detected: {} cycle(s)", .0.len())]
    CircularDependency(Vec<crate::algorithms::dependency::CircularDependency>),

    /// A traversal exceeded `max_graph_traversal_depth`.
    #[error("traversal depth limit ({0}) exceeded")]
    DepthLimitExceeded(usize),

    /// The semantic index backend failed and no fallback was available.
    #[error("semantic index error: {0}")]
    SemanticIndex(String),
}

/// Result type used throughout the spec graph crate.
pub type Result<T> = std::result::Result<T, GraphError>;
