//! Typed node/edge spec graph.
//!
//! This crate owns the graph's data model, its storage contract
//! ([`repository::GraphRepository`]), the dependency/traversal algorithms run
//! over it ([`algorithms`]), and a pluggable similarity search surface
//! ([`semantic`]). It has no opinion about agents, approval, or dispatch —
//! those live in `agent-runtime` and `orchestrator`, which depend on this
//! crate rather than the reverse.

pub mod algorithms;
pub mod error;
pub mod model;
pub mod repository;
pub mod semantic;

pub use error::{GraphError, Result};
pub use model::{Edge, EdgeKind, GraphSnapshot, Node, NodeKind, NodePatch, NodeStatus, QueryFilters};
pub use repository::{GraphMutation, GraphRepository, InMemoryGraphRepository};
pub use semantic::{LexicalIndex, SemanticIndex, SemanticMatch};
