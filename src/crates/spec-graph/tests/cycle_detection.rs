use spec_graph::algorithms::DependencyResolver;
use spec_graph::{Edge, EdgeKind, GraphRepository, InMemoryGraphRepository, Node, NodeKind};

#[tokio::test]
async fn proposing_an_edge_that_closes_a_cycle_is_detected_before_commit() {
    let repo = InMemoryGraphRepository::new();
    for id in ["spec-a", "module-b", "module-c"] {
        repo.upsert_node(Node::new(id, NodeKind::Module, id)).await.unwrap();
    }
    repo.upsert_edge(Edge::new("e1", "spec-a", "module-b", EdgeKind::DependsOn))
        .await
        .unwrap();
    repo.upsert_edge(Edge::new("e2", "module-b", "module-c", EdgeKind::DependsOn))
        .await
        .unwrap();

    // Candidate edge would close a cycle: c -> a -> b -> c.
    let mut snapshot = repo.snapshot().await.unwrap();
    snapshot
        .edges
        .push(Edge::new("candidate", "module-c", "spec-a", EdgeKind::DependsOn));

    let resolver = DependencyResolver::from_snapshot(&snapshot);
    let cycles = resolver.detect_circular_dependencies();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].cycle_type, "direct");
    assert_eq!(cycles[0].cycle_length(), 3);

    // The actual repository is untouched: no cyclic edge was ever applied.
    let committed = repo.snapshot().await.unwrap();
    assert_eq!(committed.edges.len(), 2);
}

#[tokio::test]
async fn acyclic_graph_reports_no_cycles_and_sorts_cleanly() {
    let repo = InMemoryGraphRepository::new();
    for id in ["a", "b", "c"] {
        repo.upsert_node(Node::new(id, NodeKind::Module, id)).await.unwrap();
    }
    repo.upsert_edge(Edge::new("e1", "a", "b", EdgeKind::DependsOn))
        .await
        .unwrap();
    repo.upsert_edge(Edge::new("e2", "b", "c", EdgeKind::DependsOn))
        .await
        .unwrap();

    let snapshot = repo.snapshot().await.unwrap();
    let resolver = DependencyResolver::from_snapshot(&snapshot);
    assert!(resolver.detect_circular_dependencies().is_empty());
    let order = resolver.resolve_dependencies().unwrap();
    let pos = |id: &str| order.iter().position(|x| x == id).unwrap();
    assert!(pos("c") < pos("b") && pos("b") < pos("a"));
}
