//! Graph algorithms: cycle detection, topological ordering, traversal, and
//! change-impact analysis over the dependency closure of a [`GraphSnapshot`].
//!
//! [`GraphSnapshot`]: crate::model::GraphSnapshot

pub mod dependency;
pub mod toposort;
pub mod traversal;

pub use dependency::{CircularDependency, DependencyResolver, DependencyStats, ImpactReport};
pub use toposort::{topological_sort, TopoSortStrategy};
pub use traversal::{all_paths, reachable_from, shortest_path, strongly_connected_components};
